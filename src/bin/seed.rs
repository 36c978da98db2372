use anyhow::Result;
use clap::Parser;
use graphview::content::{Corpus, Permalinks, SqliteContentRepository};
use graphview::db::Db;
use graphview::Config;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "seed")]
#[command(about = "Load a JSON content corpus into the GraphView database")]
struct Args {
    /// Corpus file with items, taxonomies, terms and assignments
    corpus: PathBuf,

    /// Database path (defaults to graphview.db_path from config.toml)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let start = Instant::now();

    let config = Config::read()?;
    config.init_logging();
    let db_path = args.db.unwrap_or_else(|| config.db_path().to_path_buf());
    log::info!("Database path: {}", db_path.display());

    let db = Db::new(&db_path);
    db.migrate().await?;

    let corpus = Corpus::load(&args.corpus)?;
    log::info!(
        "Loaded corpus {}: {} items, {} taxonomies, {} terms",
        args.corpus.display(),
        corpus.items.len(),
        corpus.taxonomies.len(),
        corpus.terms.len()
    );

    let permalinks = Permalinks::new(&config.graphview.site_url)?;
    let repo = SqliteContentRepository::new(db, permalinks);
    let stats = repo.import_corpus(corpus).await?;

    log::info!(
        "Seed complete in {:.2}s: items={}, taxonomies={}, terms={}, assignments={}",
        start.elapsed().as_secs_f64(),
        stats.items,
        stats.taxonomies,
        stats.terms,
        stats.assignments
    );

    Ok(())
}
