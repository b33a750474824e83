//! Service layer
//!
//! Contains the bridge control plane separated from transport code:
//! the per-user authorization state machine and the orchestrator that
//! drives inbound updates through it.

mod authorization;
mod bridge;

pub use authorization::{Access, AuthService};
pub use bridge::{Bridge, MediaResolver, ResolvedMedia, StoredMediaResolver};
