use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graphview::config::{init_logging, GraphConfig};
use graphview::content::{
    ContentRepository, Corpus, InMemoryContentRepository, ItemId, Permalinks,
    SqliteContentRepository,
};
use graphview::db::Db;
use graphview::{BuildOptions, Config, GraphBuilder};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "export")]
#[command(about = "Build a GraphView graph and print it as JSON")]
struct Args {
    /// Read content from a JSON corpus file instead of the configured database
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Site base URL (defaults to graphview.site_url from config.toml)
    #[arg(long)]
    site_url: Option<String>,

    /// Pretty-print the JSON output
    #[arg(short, long)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Graph of every item of the configured kinds
    Full {
        /// Override graph.kinds (comma separated)
        #[arg(long, value_delimiter = ',')]
        kinds: Vec<String>,
    },
    /// Neighbourhood of one item
    Local {
        /// Focal item id
        id: ItemId,

        /// Maximum connected entries (0 uses graph.default_max_edges)
        #[arg(long, default_value_t = 0)]
        max_edges: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // A corpus file makes the config optional; the database path needs it.
    let config = match &args.corpus {
        Some(_) => Config::read().ok(),
        None => Some(Config::read()?),
    };
    match &config {
        Some(config) => config.init_logging(),
        None => init_logging("info"),
    }
    let graph_config = config
        .as_ref()
        .map(|c| c.graph.clone())
        .unwrap_or_default();

    let site_url = args
        .site_url
        .clone()
        .or_else(|| config.as_ref().map(|c| c.graphview.site_url.clone()))
        .context("No site URL: pass --site-url or provide config.toml")?;
    let permalinks = Permalinks::new(&site_url)?;

    let repo: Box<dyn ContentRepository> = if let Some(path) = &args.corpus {
        let corpus = Corpus::load(path)?;
        log::info!("Loaded {} items from {}", corpus.items.len(), path.display());
        Box::new(InMemoryContentRepository::new(corpus, permalinks))
    } else {
        let config = config
            .as_ref()
            .context("config.toml is required without --corpus")?;
        let db = Db::new(config.db_path());
        db.migrate().await?;
        Box::new(SqliteContentRepository::new(db, permalinks))
    };

    let json = export(repo.as_ref(), &graph_config, &args.command, args.pretty).await?;
    println!("{}", json);

    Ok(())
}

async fn export(
    repo: &dyn ContentRepository,
    graph_config: &GraphConfig,
    command: &Command,
    pretty: bool,
) -> Result<String> {
    let builder = GraphBuilder::new(repo, BuildOptions::from(graph_config));

    let value = match command {
        Command::Full { kinds } => {
            let kinds = if kinds.is_empty() { &graph_config.kinds } else { kinds };
            serde_json::to_value(builder.build_full(kinds).await?)?
        }
        Command::Local { id, max_edges } => {
            let max_edges = match *max_edges {
                0 => graph_config.default_max_edges,
                n => n.min(graph_config.max_edges_limit),
            };
            serde_json::to_value(builder.build_local(*id, max_edges).await?)?
        }
    };

    let json = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(json)
}
