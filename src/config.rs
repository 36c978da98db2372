use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::graph::PairStrategyKind;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub graphview: GraphviewConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Store and site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GraphviewConfig {
    pub db_path: PathBuf,
    /// Base URL items are published under; permalinks and href resolution use it.
    pub site_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Graph-building defaults handed to the builder by the service
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Content kinds included in the full graph
    #[serde(default = "default_kinds")]
    pub kinds: Vec<String>,
    #[serde(default = "default_max_edges")]
    pub default_max_edges: usize,
    #[serde(default = "default_max_edges_limit")]
    pub max_edges_limit: usize,
    #[serde(default = "default_fetch_limit")]
    pub related_limit: usize,
    #[serde(default = "default_fetch_limit")]
    pub incoming_limit: usize,
    #[serde(default = "default_excerpt_words")]
    pub excerpt_words: usize,
    #[serde(default)]
    pub pair_strategy: PairStrategyKind,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            kinds: default_kinds(),
            default_max_edges: default_max_edges(),
            max_edges_limit: default_max_edges_limit(),
            related_limit: default_fetch_limit(),
            incoming_limit: default_fetch_limit(),
            excerpt_words: default_excerpt_words(),
            pair_strategy: PairStrategyKind::default(),
        }
    }
}

fn default_kinds() -> Vec<String> {
    vec!["post".to_string(), "page".to_string()]
}

fn default_max_edges() -> usize {
    20
}

fn default_max_edges_limit() -> usize {
    200
}

fn default_fetch_limit() -> usize {
    10
}

fn default_excerpt_words() -> usize {
    20
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_http_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub authless: bool,
    #[serde(default = "default_full_builds")]
    pub max_concurrent_full_builds: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            api_key_env: default_http_api_key_env(),
            allowed_origins: Vec::new(),
            authless: false,
            max_concurrent_full_builds: default_full_builds(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_api_key_env() -> String {
    "GRAPHVIEW_API_KEY".to_string()
}

fn default_full_builds() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in GRAPHVIEW_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let config = Self::read()?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the configuration file without validating it.
    ///
    /// Offline tools use this so they run without the server's API key.
    pub fn read() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("GRAPHVIEW_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml(&config_str)
    }

    /// Parse configuration from a TOML string without validating it
    pub fn from_toml(config_str: &str) -> Result<Self> {
        toml::from_str(config_str).context("Failed to parse config.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let site = url::Url::parse(&self.graphview.site_url)
            .with_context(|| format!("site_url is not a valid URL: {}", self.graphview.site_url))?;
        if site.cannot_be_a_base() || site.host_str().is_none() {
            anyhow::bail!("site_url must be an absolute http(s) URL: {}", self.graphview.site_url);
        }

        if self.graph.kinds.is_empty() {
            anyhow::bail!("graph.kinds must list at least one content kind");
        }

        if self.graph.default_max_edges == 0 {
            anyhow::bail!("graph.default_max_edges must be greater than 0");
        }

        if self.graph.default_max_edges > self.graph.max_edges_limit {
            anyhow::bail!("graph.default_max_edges must not exceed graph.max_edges_limit");
        }

        if self.graph.excerpt_words == 0 {
            anyhow::bail!("graph.excerpt_words must be greater than 0");
        }

        if self.http_server.max_concurrent_full_builds == 0 {
            anyhow::bail!("http_server.max_concurrent_full_builds must be greater than 0");
        }

        if !self.http_server.authless {
            std::env::var(&self.http_server.api_key_env).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file, or enable http_server.authless.",
                    self.http_server.api_key_env
                )
            })?;
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.graphview.db_path
    }

    /// Initialise env_logger at `graphview.log_level`; `RUST_LOG` takes precedence.
    pub fn init_logging(&self) {
        init_logging(&self.graphview.log_level);
    }
}

/// Initialise env_logger with `default_level` unless `RUST_LOG` is set.
pub fn init_logging(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", default_level))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const FULL_CONFIG: &str = r#"
[graphview]
db_path = "./test.db"
site_url = "https://example.com"
log_level = "debug"

[graph]
kinds = ["post", "page", "recipe"]
default_max_edges = 15
max_edges_limit = 50
excerpt_words = 30
pair_strategy = "inverted_index"

[http_server]
port = 9090
api_key_env = "GRAPHVIEW_TEST_KEY"
authless = true
"#;

    fn with_config_env(config_path: &Path, api_key: Option<&str>, f: impl FnOnce()) {
        let original_config = std::env::var("GRAPHVIEW_CONFIG").ok();
        let original_key = std::env::var("GRAPHVIEW_API_KEY").ok();
        std::env::set_var("GRAPHVIEW_CONFIG", config_path.to_str().unwrap());
        match api_key {
            Some(k) => std::env::set_var("GRAPHVIEW_API_KEY", k),
            None => std::env::remove_var("GRAPHVIEW_API_KEY"),
        }
        f();
        std::env::remove_var("GRAPHVIEW_CONFIG");
        std::env::remove_var("GRAPHVIEW_API_KEY");
        if let Some(val) = original_config {
            std::env::set_var("GRAPHVIEW_CONFIG", val);
        }
        if let Some(val) = original_key {
            std::env::set_var("GRAPHVIEW_API_KEY", val);
        }
    }

    #[test]
    fn test_config_parses_all_sections() {
        let config = Config::from_toml(FULL_CONFIG).unwrap();
        assert_eq!(config.graphview.log_level, "debug");
        assert_eq!(config.graph.kinds, vec!["post", "page", "recipe"]);
        assert_eq!(config.graph.default_max_edges, 15);
        assert_eq!(config.graph.related_limit, 10);
        assert_eq!(config.graph.pair_strategy, PairStrategyKind::InvertedIndex);
        assert_eq!(config.http_server.port, 9090);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_toml(
            "[graphview]\ndb_path = \"x.db\"\nsite_url = \"https://example.com\"\n",
        )
        .unwrap();
        assert_eq!(config.graph.kinds, vec!["post", "page"]);
        assert_eq!(config.graph.default_max_edges, 20);
        assert_eq!(config.graph.incoming_limit, 10);
        assert_eq!(config.graph.excerpt_words, 20);
        assert_eq!(config.graph.pair_strategy, PairStrategyKind::Pairwise);
        assert_eq!(config.http_server.max_concurrent_full_builds, 1);
        assert!(!config.http_server.authless);
        assert_eq!(config.graphview.log_level, "info");
    }

    #[test]
    fn test_config_rejects_relative_site_url() {
        let mut config = Config::from_toml(FULL_CONFIG).unwrap();
        config.graphview.site_url = "/not/absolute".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_default_above_limit() {
        let mut config = Config::from_toml(FULL_CONFIG).unwrap();
        config.graph.default_max_edges = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_edges_limit"));
    }

    #[test]
    fn test_config_rejects_empty_kinds() {
        let mut config = Config::from_toml(FULL_CONFIG).unwrap();
        config.graph.kinds.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_requires_api_key_unless_authless() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            "[graphview]\ndb_path = \"x.db\"\nsite_url = \"https://example.com\"\n",
        )
        .unwrap();

        with_config_env(&config_path, None, || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("GRAPHVIEW_API_KEY"));
        });

        with_config_env(&config_path, Some("secret"), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("GRAPHVIEW_CONFIG").ok();
        std::env::set_var("GRAPHVIEW_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("GRAPHVIEW_CONFIG");
        if let Some(v) = original {
            std::env::set_var("GRAPHVIEW_CONFIG", v);
        }
    }
}
