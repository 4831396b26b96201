use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use tally_shared::types::{ConnectionState, UserId};
use tally_store::Message;

/// Events emitted by the engine for a UI layer.
///
/// Delivery is best-effort: a lagging consumer never blocks inbound
/// processing, it just loses events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EngineEvent {
    /// A new counterpart message was applied to a conversation.
    NewMessage {
        conversation_id: UserId,
        message: Message,
    },
    /// The transport connection state changed.
    ConnectionChanged { state: ConnectionState },
    /// The conversation map was replaced from a participant fetch.
    ConversationsHydrated { count: usize },
    /// A history fetch finished and replaced a conversation's messages.
    HistoryLoaded { conversation_id: UserId },
    /// The per-conversation task caches were refreshed.
    TasksRefreshed,
    /// The per-conversation debt caches were refreshed.
    DebtsRefreshed,
    /// The aggregate balance was refreshed.
    BalanceRefreshed,
}

pub(crate) fn emit(tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) {
    if let Err(e) = tx.try_send(event) {
        debug!(error = %e, "Event channel full or closed, dropping event");
    }
}
