//! WebBridge - a Telegram-to-web media bridge
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                       │
//! │  - WebSocket session transport and player page              │
//! │  - Capability streaming URLs and media relay                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                           │
//! │  - Authorization state machine                              │
//! │  - Bridge orchestrator (updates in, pushes out)             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌───────────────────────────┐ ┌───────────────────────────────┐
//! │     Data Layer (sqlx)     │ │   Telegram Layer (Bot API)    │
//! └───────────────────────────┘ └───────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP and WebSocket handlers
//! - `service`: authorization and bridge orchestration
//! - `telegram`: Bot API client and inbound update model
//! - `data`: user persistence (SQLite via sqlx)
//! - `media`: capability tokens and push payloads
//! - `push`: live web-session fan-out registry
//! - `config`: configuration management
//! - `error`: error types

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod media;
pub mod metrics;
pub mod push;
pub mod service;
pub mod telegram;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned per request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// User persistence
    pub db: Arc<data::Database>,

    /// Live web-session fan-out registry
    pub registry: Arc<push::SessionRegistry>,

    /// Message-id to media resolution for capability URL verification
    pub resolver: Arc<service::StoredMediaResolver>,

    /// Outbound chat contract (replies, file URLs)
    pub chat: Arc<dyn telegram::ChatClient>,

    /// HTTP client for media passthrough
    pub http: reqwest::Client,
}

impl AppState {
    /// Initialize application state
    ///
    /// Connects to the SQLite database (running migrations) and builds
    /// the in-process registries.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrated.
    pub async fn new(
        config: config::AppConfig,
        chat: Arc<dyn telegram::ChatClient>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!(path = %config.database.path.display(), "Database connected");

        Ok(Self {
            config: Arc::new(config),
            resolver: Arc::new(service::StoredMediaResolver::new(db.clone())),
            db,
            registry: Arc::new(push::SessionRegistry::new()),
            chat,
            http: reqwest::Client::new(),
        })
    }
}

/// Build the Axum application router
pub fn build_router(state: AppState) -> axum::Router {
    use axum::routing::get;
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", get(health_check))
        .route("/ws/:chat_id", get(api::websocket_handler))
        .route("/proxy", get(api::proxy_handler))
        .route("/:chat_id", get(api::player_page))
        .route("/:message_id/:token", get(api::stream_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
