//! Radius Server - local HTTP control API.
//!
//! The page talks to the selector through this API: it announces the site
//! it opens, reports errors, and polls for the transport to install and for
//! redirects.
//!
//! ## Endpoints
//!
//! - `POST /api/site/enter` - Start a session for a URL
//! - `POST /api/site/leave` - End the session, restoring the original configuration
//! - `POST /api/site/abandon` - End the session without restoring
//! - `POST /api/errors` - Report a page error
//! - `POST /api/switch` - Try the next configuration now
//! - `GET /api/status` - Selector snapshot
//! - `GET /api/transport` - Transport to install
//! - `GET /api/navigation` - Pending redirect
//! - `GET|PUT /api/settings` - User settings
//! - `GET|DELETE /api/overrides` - Saved per-domain candidates
//! - `GET /api/sites/lookup?url=` - Static site lookup
//! - `GET /api/candidates` - Fallback order
//!
//! ## Example
//!
//! ```no_run
//! use radius_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default()).await.unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod bridge;
pub mod error;
mod handlers;
pub mod models;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use socket2::{Domain, Socket, Type};
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use radius_core::selector::SelectorConfig;
use radius_core::transport::TransportEndpoints;
use radius_storage::Database;

pub use bridge::{InstalledTransport, PendingNavigation, SharedTransport};
pub use error::{ApiError, Result};
pub use state::AppState;

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default server host (localhost only).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1).
    pub host: String,
    /// Port to bind to (default: 8080).
    pub port: u16,
    /// Database path (None = in-memory).
    pub db_path: Option<String>,
    /// Default wisp server (None = derived from host and port).
    pub wisp_server: Option<String>,
    /// Bare server (None = derived from host and port).
    pub bare_server: Option<String>,
    /// Selector tunables.
    pub selector: SelectorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: None,
            wisp_server: None,
            bare_server: None,
            selector: SelectorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a config with a specific database path.
    pub fn with_db_path(path: impl Into<String>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the default wisp server.
    pub fn with_wisp_server(mut self, url: impl Into<String>) -> Self {
        self.wisp_server = Some(url.into());
        self
    }

    /// Sets the bare server.
    pub fn with_bare_server(mut self, url: impl Into<String>) -> Self {
        self.bare_server = Some(url.into());
        self
    }

    /// Sets the selector tunables.
    pub fn with_selector(mut self, selector: SelectorConfig) -> Self {
        self.selector = selector;
        self
    }

    /// Endpoints used when the stored settings do not override them.
    pub fn default_endpoints(&self) -> TransportEndpoints {
        let mut endpoints =
            TransportEndpoints::for_origin("http", &format!("{}:{}", self.host, self.port));
        if let Some(ref wisp) = self.wisp_server {
            endpoints.wisp_server = wisp.clone();
        }
        if let Some(ref bare) = self.bare_server {
            endpoints.bare_server = bare.clone();
        }
        endpoints
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] radius_storage::StorageError),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// Builds the API router over the given state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/site/enter", post(handlers::enter_site))
        .route("/api/site/leave", post(handlers::leave_site))
        .route("/api/site/abandon", post(handlers::abandon_site))
        .route("/api/errors", post(handlers::report_error))
        .route("/api/switch", post(handlers::manual_switch))
        .route("/api/status", get(handlers::get_status))
        .route("/api/transport", get(handlers::get_transport))
        .route("/api/navigation", get(handlers::take_navigation))
        .route(
            "/api/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route(
            "/api/overrides",
            get(handlers::get_overrides).delete(handlers::clear_overrides),
        )
        .route("/api/sites/lookup", get(handlers::lookup_site))
        .route("/api/candidates", get(handlers::get_candidates))
        .layer(cors)
        .with_state(state)
}

/// The HTTP API server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
    state: AppState,
    selector_task: JoinHandle<()>,
}

impl Server {
    /// Creates a new server with the given configuration.
    pub async fn new(config: ServerConfig) -> std::result::Result<Self, ServerError> {
        let db = if let Some(ref path) = config.db_path {
            Database::with_path(path)?
        } else {
            Database::in_memory()?
        };

        Self::with_database(config, db).await
    }

    /// Creates a server with an existing database.
    ///
    /// Starts the selector and installs the user's saved configuration.
    pub async fn with_database(
        config: ServerConfig,
        db: Database,
    ) -> std::result::Result<Self, ServerError> {
        let (state, selector_task) = AppState::from_storage(
            Arc::new(db),
            config.selector.clone(),
            config.default_endpoints(),
        );

        let initial = state.settings.configuration();
        if !state.selector.apply_user_configuration(initial).await {
            return Err(ServerError::Runtime(
                "selector failed to install the initial configuration".to_string(),
            ));
        }

        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self {
            router: router(state.clone()),
            addr,
            state,
            selector_task,
        })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the shared state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Runs the server until shutdown.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        info!("Starting Radius control API on {}", self.addr);

        let domain = if self.addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::STREAM, None)
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .bind(&self.addr.into())
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .listen(128)
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let result = axum::serve(listener, self.router)
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()));

        self.selector_task.abort();
        result
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use radius_core::configuration::CANDIDATES;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn create_test_app() -> (Router, AppState) {
        let state = AppState::in_memory();
        (router(state.clone()), state)
    }

    async fn enabled_app() -> (Router, AppState) {
        let (app, state) = create_test_app();
        state.settings.set_dynamic_loading(true);
        state.selector.set_enabled(true).await;
        (app, state)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_enter_known_site() {
        let (app, _) = enabled_app().await;

        let (status, json) = send(
            &app,
            "POST",
            "/api/site/enter",
            Some(json!({"url": "https://discord.com/app"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["engine"], "sj");
        assert_eq!(json["source"], "site_table");
        assert_eq!(json["domain"], "discord.com");
        assert_eq!(json["configuration"]["transport"], "epoxy");
    }

    #[tokio::test]
    async fn test_enter_while_disabled() {
        let (app, _) = create_test_app();

        let (status, json) = send(
            &app,
            "POST",
            "/api/site/enter",
            Some(json!({"url": "https://discord.com/"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["source"], "disabled");
        assert_eq!(json["engine"], "uv");
    }

    #[tokio::test]
    async fn test_enter_rejects_empty_url() {
        let (app, _) = create_test_app();
        let (status, json) =
            send(&app, "POST", "/api/site/enter", Some(json!({"url": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_report_error_classification() {
        let (app, _) = enabled_app().await;

        let (_, json) = send(
            &app,
            "POST",
            "/api/errors",
            Some(json!({"message": "TypeError: Failed to fetch", "source": "rejection"})),
        )
        .await;
        assert_eq!(json["critical"], true);
        assert_eq!(json["matched"], r"failed\s+to\s+fetch");
        assert_eq!(json["buffered"], false);

        let (_, json) = send(
            &app,
            "POST",
            "/api/errors",
            Some(json!({"message": "GET /favicon.ico 404 Not Found"})),
        )
        .await;
        assert_eq!(json["critical"], false);
        assert_eq!(json["classification"]["kind"], "ignored");
    }

    #[tokio::test]
    async fn test_manual_switch_flow() {
        let (app, state) = enabled_app().await;
        send(
            &app,
            "POST",
            "/api/site/enter",
            Some(json!({"url": "https://example.com/"})),
        )
        .await;

        let (status, json) = send(&app, "POST", "/api/switch", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outcome"], "switched");
        assert_eq!(json["index"], 1);
        assert_eq!(json["configuration"]["transport"], "libcurl");
        assert!(json.get("redirect").is_none());

        let (_, json) = send(&app, "GET", "/api/transport", None).await;
        assert_eq!(json["module"], "/libcurl/index.mjs");
        assert_eq!(json["argument"]["wisp"], "ws://localhost:8080/wisp/");

        let (_, json) = send(&app, "GET", "/api/overrides", None).await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["overrides"]["example.com"]["index"], 1);

        let (_, json) = send(&app, "POST", "/api/site/leave", None).await;
        assert_eq!(json["restored"], true);
        assert_eq!(
            state.transport.current().unwrap().descriptor.configuration,
            CANDIDATES[0]
        );
    }

    #[tokio::test]
    async fn test_switch_exhaustion_redirects() {
        let (app, _) = enabled_app().await;
        send(
            &app,
            "POST",
            "/api/site/enter",
            Some(json!({"url": "https://example.com/"})),
        )
        .await;

        for _ in 1..CANDIDATES.len() {
            send(&app, "POST", "/api/switch", None).await;
        }
        let (_, json) = send(&app, "POST", "/api/switch", None).await;
        assert_eq!(json["outcome"], "exhausted");
        assert_eq!(json["redirect"], "/404");

        // Already delivered with the switch response.
        let (_, json) = send(&app, "GET", "/api/navigation", None).await;
        assert!(json["redirect"].is_null());

        let (_, json) = send(&app, "GET", "/api/status", None).await;
        assert!(json["current_site"].is_null());
        assert_eq!(json["state"], "idle");
    }

    #[tokio::test]
    async fn test_switch_without_site_is_inactive() {
        let (app, _) = enabled_app().await;
        let (_, json) = send(&app, "POST", "/api/switch", None).await;
        assert_eq!(json["outcome"], "inactive");
    }

    #[tokio::test]
    async fn test_abandon_keeps_transport() {
        let (app, state) = enabled_app().await;
        send(
            &app,
            "POST",
            "/api/site/enter",
            Some(json!({"url": "https://discord.com/"})),
        )
        .await;

        let (_, json) = send(&app, "POST", "/api/site/abandon", None).await;
        assert_eq!(json["success"], true);
        assert_eq!(
            state.transport.current().unwrap().descriptor.configuration.proxy_engine,
            radius_core::ProxyEngine::Scramjet
        );

        let (_, json) = send(&app, "POST", "/api/site/leave", None).await;
        assert_eq!(json["restored"], false);
    }

    #[tokio::test]
    async fn test_transport_missing_before_install() {
        let (app, _) = create_test_app();
        let (status, json) = send(&app, "GET", "/api/transport", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "not_found");
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let (app, state) = create_test_app();

        let (_, json) = send(&app, "GET", "/api/settings", None).await;
        assert_eq!(json["dynamicLoading"], false);
        assert_eq!(json["configuration"]["proxy"], "uv");

        let (status, json) = send(
            &app,
            "PUT",
            "/api/settings",
            Some(json!({
                "configuration": {"proxy": "sj", "transport": "libcurl", "routingMode": "wisp"},
                "adBlock": true,
                "dynamicLoading": true
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["applied"], true);
        assert_eq!(json["adBlock"], true);
        assert_eq!(json["endpoints"]["ad_block"], true);

        let installed = state.transport.current().unwrap();
        assert_eq!(installed.descriptor.configuration, CANDIDATES[4]);
        assert_eq!(
            installed.descriptor.argument,
            radius_core::TransportArgument::Wisp {
                wisp: "ws://localhost:8080/adblock/".to_string()
            }
        );

        let status = state.selector.status().await.unwrap();
        assert!(status.enabled);
        assert_eq!(status.active, CANDIDATES[4]);
    }

    #[tokio::test]
    async fn test_settings_rejects_unknown_engine() {
        let (app, _) = create_test_app();
        let (status, _) = send(
            &app,
            "PUT",
            "/api/settings",
            Some(json!({"configuration": {"proxy": "rh", "transport": "epoxy", "routingMode": "wisp"}})),
        )
        .await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_clear_overrides() {
        let (app, _) = enabled_app().await;
        send(
            &app,
            "POST",
            "/api/site/enter",
            Some(json!({"url": "https://example.com/"})),
        )
        .await;
        send(&app, "POST", "/api/switch", None).await;

        let (_, json) = send(&app, "DELETE", "/api/overrides", None).await;
        assert_eq!(json["cleared"], 1);

        let (_, json) = send(&app, "GET", "/api/overrides", None).await;
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn test_site_lookup() {
        let (app, _) = create_test_app();

        let (_, json) = send(
            &app,
            "GET",
            "/api/sites/lookup?url=https%3A%2F%2Fwww.youtube.com%2Fwatch",
            None,
        )
        .await;
        assert_eq!(json["known"], true);
        assert_eq!(json["domain"], "youtube.com");
        assert_eq!(json["site"]["name"], "youtube");

        let (_, json) = send(&app, "GET", "/api/sites/lookup?url=nonsense", None).await;
        assert_eq!(json["known"], false);
        assert!(json["domain"].is_null());
        assert!(json.get("site").is_none());
    }

    #[tokio::test]
    async fn test_candidates_order() {
        let (app, _) = create_test_app();
        let (_, json) = send(&app, "GET", "/api/candidates", None).await;
        let list = json["candidates"].as_array().unwrap();
        assert_eq!(list.len(), 6);
        assert_eq!(list[0]["configuration"]["proxy"], "uv");
        assert_eq!(list[3]["configuration"]["proxy"], "sj");
        assert_eq!(list[5]["configuration"]["routingMode"], "bare");
    }

    #[tokio::test]
    async fn test_server_installs_saved_configuration() {
        let db = Database::in_memory().unwrap();
        db.set_value("radius||settings||proxy", "sj").unwrap();

        let server = Server::with_database(ServerConfig::default(), db)
            .await
            .unwrap();
        let installed = server.state().transport.current().unwrap();
        assert_eq!(installed.descriptor.configuration, CANDIDATES[3]);
        assert_eq!(installed.revision, 1);
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_default_endpoints() {
        let config = ServerConfig::default()
            .with_port(9000)
            .with_bare_server("https://relay.test/bare/");
        let e = config.default_endpoints();
        assert_eq!(e.wisp_server, "ws://127.0.0.1:9000/wisp/");
        assert_eq!(e.bare_server, "https://relay.test/bare/");
    }
}
