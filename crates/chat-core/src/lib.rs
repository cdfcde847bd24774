//! Chat session core.
//!
//! Owns the session list, the active conversation and the send pipeline
//! (optimistic append → transport → reconciliation). Talks to the outside
//! world only through the traits in [`ports`].

pub mod attachments;
pub mod event_bus;
pub mod history;
pub mod ingest;
pub mod ports;
pub mod reconcile;
pub mod store;


pub use tokio_util::sync::CancellationToken;
pub use event_bus::EventBus;
pub use reconcile::SendOutcome;
pub use store::{Draft, Identity, SessionPhase, SessionStore, StoreSnapshot};
