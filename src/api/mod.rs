//! API layer
//!
//! HTTP handlers for:
//! - WebSocket session transport (`/ws/{chat_id}`)
//! - Web player entry page (`/{chat_id}`)
//! - Capability streaming URLs (`/{message_id}/{token}`)
//! - Same-origin media relay (`/proxy`)
//! - Metrics (Prometheus)

pub mod metrics;
mod player;
mod proxy;
mod stream;
mod ws;

pub use metrics::metrics_router;
pub use player::player_page;
pub use proxy::proxy_handler;
pub use stream::stream_handler;
pub use ws::websocket_handler;
