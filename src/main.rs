use anyhow::Result;
use graphview::content::{Permalinks, SqliteContentRepository};
use graphview::db::{migrate, Db};
use graphview::error::GraphviewError;
use graphview::http::GraphServer;
use graphview::Config;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.init_logging();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => run_http_server(&config).await?,
        _ => run_schema_verification(&config).await?,
    }

    Ok(())
}

/// Open the content store, applying pending migrations
async fn open_store(config: &Config) -> Result<Db> {
    let db = Db::new(config.db_path());
    db.migrate().await?;
    log::info!("Database initialized: {}", config.db_path().display());
    Ok(db)
}

/// Run the graph HTTP server
async fn run_http_server(config: &Config) -> Result<()> {
    log::info!("Starting GraphView server v{}", env!("CARGO_PKG_VERSION"));

    let db = open_store(config).await?;

    let permalinks = Permalinks::new(&config.graphview.site_url)?;
    let repo = Arc::new(SqliteContentRepository::new(db, permalinks));

    let server = GraphServer::new(repo, config)?;
    server.run().await?;

    Ok(())
}

/// Run database schema verification
async fn run_schema_verification(config: &Config) -> Result<()> {
    log::info!("Starting GraphView v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration loaded successfully");
    log::info!("Site URL: {}", config.graphview.site_url);
    log::info!("Graph kinds: {}", config.graph.kinds.join(", "));

    let db = open_store(config).await?;
    verify_database_schema(&db).await?;

    Ok(())
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = [
            "item_terms",
            "items",
            "schema_migrations",
            "taxonomies",
            "taxonomy_kinds",
            "terms",
        ];
        let mut all_tables_exist = true;
        for table in &expected_tables {
            if tables.iter().any(|t| t == table) {
                log::debug!("✓ Table exists: {}", table);
            } else {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            }
        }
        if !all_tables_exist {
            return Err(GraphviewError::Config("Not all required tables exist".to_string()));
        }

        let applied = migrate::get_applied_migrations(conn)?;
        if applied.len() < migrate::MIGRATIONS.len() {
            return Err(GraphviewError::Config(format!(
                "Expected {} migrations, found {}",
                migrate::MIGRATIONS.len(),
                applied.len()
            )));
        }
        log::debug!("✓ {} migrations applied", applied.len());

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(GraphviewError::Config(format!(
                "Journal mode is not WAL: {}",
                journal_mode
            )));
        }

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(GraphviewError::Config("Foreign keys not enabled".to_string()));
        }

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(GraphviewError::Config(format!(
                "Database integrity check failed: {}",
                integrity
            )));
        }
        log::info!("✓ Database integrity: OK");

        let items: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        let terms: i64 = conn.query_row("SELECT COUNT(*) FROM terms", [], |row| row.get(0))?;
        log::info!("Content store holds {} items and {} terms", items, terms);
        if items == 0 {
            log::warn!("No content items yet. Load a corpus with the seed binary.");
        }

        Ok(())
    })
    .await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
