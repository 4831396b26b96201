//! # tally-client
//!
//! The chat synchronization engine.
//!
//! A [`ChatEngine`] keeps per-contact conversations synchronized between a
//! REST-hydrated snapshot and a live WebSocket: it hydrates the
//! conversation map at session start, appends outbound messages
//! optimistically and discards their transport echoes, counts unread
//! messages for every conversation except the active one, and refreshes
//! the task/debt/balance caches when inbound traffic is annotated.
//!
//! The engine holds its state explicitly (no globals) and is driven by a
//! UI layer through its public methods; it reports back over an event
//! channel.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod events;
pub mod logging;

pub use api::{ApiClient, ApiError};
pub use config::EngineConfig;
pub use dispatch::RefreshPlan;
pub use engine::{ChatEngine, Session};
pub use events::EngineEvent;
pub use logging::init_tracing;
