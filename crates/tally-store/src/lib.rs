//! # tally-store
//!
//! In-memory conversation state for the chat engine.
//!
//! The [`ConversationStore`] is the single owner and writer of all
//! per-contact conversation state: message lists, last-message pointers,
//! unread counters and the cached task/debt projections. Everything else
//! (transport, REST fetches, UI) goes through its API.

pub mod active;
pub mod conversations;
pub mod models;
pub mod reconcile;

pub use active::ActiveConversation;
pub use conversations::{history_to_messages, ConversationStore};
pub use models::*;
pub use reconcile::{classify, Classification};
