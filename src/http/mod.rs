//! HTTP service exposing the full and local graph builds.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::content::{ContentRepository, ItemId};
use crate::error::{GraphviewError, Result};
use crate::graph::{BuildOptions, GraphBuilder};

/// Route of the full-graph build.
pub const FULL_GRAPH_PATH: &str = "/graphview/v1/full-graph";

/// Route prefix of the local-graph build; the item id follows.
pub const LOCAL_GRAPH_PATH: &str = "/graphview/v1/local-graph";

/// HTTP graph server
pub struct GraphServer {
    state: Arc<AppState>,
    port: u16,
}

/// Application state shared across handlers
struct AppState {
    repo: Arc<dyn ContentRepository>,
    options: BuildOptions,
    kinds: Vec<String>,
    default_max_edges: usize,
    max_edges_limit: usize,
    /// Empty in authless mode.
    api_key: String,
    allowed_origins: Vec<String>,
    full_builds: Semaphore,
}

impl GraphServer {
    /// Create a server, reading the API key from the configured env var
    /// unless authless mode is enabled.
    pub fn new(repo: Arc<dyn ContentRepository>, config: &Config) -> Result<Self> {
        let api_key = if config.http_server.authless {
            String::new()
        } else {
            std::env::var(&config.http_server.api_key_env).map_err(|_| {
                GraphviewError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable, or enable authless mode.",
                    config.http_server.api_key_env
                ))
            })?
        };
        Ok(Self::with_api_key(repo, config, api_key))
    }

    /// Create a server with an explicit API key (ignored when authless).
    pub fn with_api_key(
        repo: Arc<dyn ContentRepository>,
        config: &Config,
        api_key: impl Into<String>,
    ) -> Self {
        let api_key = if config.http_server.authless {
            String::new()
        } else {
            api_key.into()
        };

        let state = AppState {
            repo,
            options: BuildOptions::from(&config.graph),
            kinds: config.graph.kinds.clone(),
            default_max_edges: config.graph.default_max_edges,
            max_edges_limit: config.graph.max_edges_limit,
            api_key,
            allowed_origins: config.http_server.allowed_origins.clone(),
            full_builds: Semaphore::new(config.http_server.max_concurrent_full_builds.max(1)),
        };

        Self {
            state: Arc::new(state),
            port: config.http_server.port,
        }
    }

    /// Run the HTTP server until it fails
    pub async fn run(&self) -> Result<()> {
        let app = self.router();

        let addr = format!("127.0.0.1:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            GraphviewError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}. Set http_server.port in config.toml to use another port.", addr, e),
            ))
        })?;

        log::info!("Starting graph server on http://{}", addr);
        log::info!("Full graph: http://{}{}", addr, FULL_GRAPH_PATH);
        log::info!("Local graph: http://{}{}/<id>", addr, LOCAL_GRAPH_PATH);

        axum::serve(listener, app).await.map_err(|e| {
            GraphviewError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }

    /// Create the axum router
    pub fn router(&self) -> Router {
        let allowed_origins = &self.state.allowed_origins;

        // Unrestricted when no origins are configured (local development).
        let cors = if allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<HeaderValue> = allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route(FULL_GRAPH_PATH, get(handle_full_graph))
            .route(&format!("{}/:item_id", LOCAL_GRAPH_PATH), get(handle_local_graph))
            .route("/health", get(handle_health))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(Arc::clone(&self.state))
    }
}

/// Error response: `{ "code": kind, "message": text, "data": { "status": n } }`
struct ApiError(GraphviewError);

impl From<GraphviewError> for ApiError {
    fn from(err: GraphviewError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status >= 500 {
            log::error!("Graph request failed: {}", self.0);
        } else {
            log::debug!("Graph request rejected: {}", self.0);
        }
        error_response(status, self.0.kind(), &self.0.to_string())
    }
}

fn error_response(status: u16, code: &str, message: &str) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(serde_json::json!({
            "code": code,
            "message": message,
            "data": { "status": status.as_u16() }
        })),
    )
        .into_response()
}

/// Handle the full-graph endpoint
async fn handle_full_graph(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> std::result::Result<Response, ApiError> {
    if !state.api_key.is_empty() {
        if let Err(response) = validate_auth(&headers, &state.api_key) {
            return Ok(response);
        }
    }

    let _permit = state
        .full_builds
        .acquire()
        .await
        .map_err(|e| GraphviewError::ContentStore(format!("Full build queue closed: {}", e)))?;

    let graph = GraphBuilder::new(state.repo.as_ref(), state.options.clone())
        .build_full(&state.kinds)
        .await?;

    Ok(Json(graph).into_response())
}

#[derive(Debug, Deserialize)]
struct LocalGraphParams {
    max_edges: Option<String>,
}

/// Handle the local-graph endpoint
async fn handle_local_graph(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    Query(params): Query<LocalGraphParams>,
) -> std::result::Result<Response, ApiError> {
    let item_id: ItemId = item_id
        .parse()
        .map_err(|_| GraphviewError::InvalidInput(format!("item id must be numeric: {}", item_id)))?;

    let max_edges = resolve_max_edges(
        params.max_edges.as_deref(),
        state.default_max_edges,
        state.max_edges_limit,
    )?;

    let graph = GraphBuilder::new(state.repo.as_ref(), state.options.clone())
        .build_local(item_id, max_edges)
        .await?;

    Ok(Json(graph).into_response())
}

/// Missing, blank or zero falls back to the default; larger values are clamped.
fn resolve_max_edges(raw: Option<&str>, default: usize, limit: usize) -> Result<usize> {
    let requested = match raw.map(str::trim) {
        None | Some("") => 0,
        Some(value) => value.parse::<usize>().map_err(|_| {
            GraphviewError::InvalidInput(format!("max_edges must be a non-negative integer: {}", value))
        })?,
    };
    let max_edges = if requested == 0 { default } else { requested };
    Ok(max_edges.min(limit))
}

/// Handle health check endpoint
async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "graphview",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

/// Validate Authorization header
fn validate_auth(headers: &HeaderMap, expected_key: &str) -> std::result::Result<(), Response> {
    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            error_response(401, "unauthorized", "Use 'Authorization: Bearer <api-key>' header")
        })?;

    let Some(provided_key) = auth_header.strip_prefix("Bearer ") else {
        return Err(error_response(
            401,
            "unauthorized",
            "Invalid Authorization header format, use 'Authorization: Bearer <api-key>'",
        ));
    };

    if provided_key != expected_key {
        return Err(error_response(401, "unauthorized", "Invalid API key"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Corpus, InMemoryContentRepository, Permalinks};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    const CONFIG: &str = r#"
[graphview]
db_path = "./unused.db"
site_url = "https://example.com"

[graph]
default_max_edges = 2
max_edges_limit = 3
"#;

    const CORPUS: &str = r#"{"items": [
        {"id": 1, "title": "Hub", "kind": "page", "slug": "hub",
         "body": "<a href=\"/a/\">a</a><a href=\"/b/\">b</a><a href=\"/c/\">c</a><a href=\"/d/\">d</a>"},
        {"id": 2, "title": "A", "kind": "post", "slug": "a"},
        {"id": 3, "title": "B", "kind": "post", "slug": "b"},
        {"id": 4, "title": "C", "kind": "post", "slug": "c"},
        {"id": 5, "title": "D", "kind": "post", "slug": "d"}
    ]}"#;

    fn app(authless: bool) -> Router {
        let mut config = Config::from_toml(CONFIG).unwrap();
        config.http_server.authless = authless;
        let repo = InMemoryContentRepository::new(
            Corpus::from_json(CORPUS).unwrap(),
            Permalinks::new(&config.graphview.site_url).unwrap(),
        );
        GraphServer::with_api_key(Arc::new(repo), &config, "secret").router()
    }

    async fn get(app: Router, uri: &str, auth: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().uri(uri);
        if let Some(auth) = auth {
            req = req.header("authorization", auth);
        }
        let resp = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_resolve_max_edges() {
        assert_eq!(resolve_max_edges(None, 20, 200).unwrap(), 20);
        assert_eq!(resolve_max_edges(Some("0"), 20, 200).unwrap(), 20);
        assert_eq!(resolve_max_edges(Some(""), 20, 200).unwrap(), 20);
        assert_eq!(resolve_max_edges(Some("5"), 20, 200).unwrap(), 5);
        assert_eq!(resolve_max_edges(Some("500"), 20, 200).unwrap(), 200);
        assert!(matches!(
            resolve_max_edges(Some("ten"), 20, 200),
            Err(GraphviewError::InvalidInput(_))
        ));
        assert!(resolve_max_edges(Some("-1"), 20, 200).is_err());
    }

    #[tokio::test]
    async fn test_full_graph_requires_bearer_key() {
        let (status, body) = get(app(false), FULL_GRAPH_PATH, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");
        assert_eq!(body["data"]["status"], 401);

        let (status, _) = get(app(false), FULL_GRAPH_PATH, Some("Bearer wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = get(app(false), FULL_GRAPH_PATH, Some("secret")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = get(app(false), FULL_GRAPH_PATH, Some("Bearer secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes"].as_array().unwrap().len(), 5);
        assert_eq!(body["edges"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_full_graph_authless() {
        let (status, body) = get(app(true), FULL_GRAPH_PATH, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes"][0]["data"]["type"], "page");
    }

    #[tokio::test]
    async fn test_local_graph_default_and_clamp() {
        let (status, body) = get(app(false), "/graphview/v1/local-graph/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["edges"].as_array().unwrap().len(), 2);
        assert_eq!(body["nodes"][0]["data"]["isCurrent"], true);

        let (_, body) = get(app(false), "/graphview/v1/local-graph/1?max_edges=0", None).await;
        assert_eq!(body["edges"].as_array().unwrap().len(), 2);

        let (_, body) = get(app(false), "/graphview/v1/local-graph/1?max_edges=100", None).await;
        assert_eq!(body["edges"].as_array().unwrap().len(), 3);

        let (_, body) = get(app(false), "/graphview/v1/local-graph/1?max_edges=1", None).await;
        assert_eq!(body["edges"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_local_graph_errors() {
        let (status, body) = get(app(false), "/graphview/v1/local-graph/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
        assert_eq!(body["data"]["status"], 404);

        let (status, body) = get(app(false), "/graphview/v1/local-graph/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");

        let (status, _) = get(app(false), "/graphview/v1/local-graph/1?max_edges=lots", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get(app(false), "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "graphview");
    }
}
