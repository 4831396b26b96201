//! The chat engine.
//!
//! [`ChatEngine`] is the explicit owner of all client-side chat state: the
//! conversation store, the active-conversation tracker, the transport
//! handle and the cached balance. It is constructed from injected
//! configuration and exposes the operations a UI layer drives.
//!
//! Every public operation is a silent no-op while no session is set: the
//! engine is simply "not ready", which is not an error. Fetch and
//! transport failures are caught and logged here; callers never see them.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use tally_net::connection::{ConnectionHandle, SocketEvent};
use tally_net::ws_endpoint;
use tally_shared::constants::CHANNEL_CAPACITY;
use tally_shared::protocol::{InboundMessage, SendFrame, ServerFrame};
use tally_shared::types::{ConnectionState, DeliveryStatus, UserId};
use tally_store::reconcile::{classify, Classification};
use tally_store::{
    history_to_messages, ActiveConversation, Conversation, ConversationStore, DebtBalance,
    Message, User,
};

use crate::api::ApiClient;
use crate::config::EngineConfig;
use crate::dispatch::RefreshPlan;
use crate::events::{emit, EngineEvent};

/// Externally established identity: the bearer token plus the user it
/// belongs to. Authentication itself happens outside the engine.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Mutable engine state. The mutex around it is only held for synchronous
/// mutation, never across an await.
#[derive(Debug, Default)]
struct EngineState {
    store: ConversationStore,
    active: ActiveConversation,
    session: Option<Session>,
    balance: Option<DebtBalance>,
    connection_state: ConnectionState,
}

pub struct ChatEngine {
    api: ApiClient,
    config: EngineConfig,
    state: Mutex<EngineState>,
    connection: tokio::sync::Mutex<Option<ConnectionHandle>>,
    events_tx: mpsc::Sender<EngineEvent>,
}

impl ChatEngine {
    /// Build an engine from configuration.
    ///
    /// Returns the engine and the receiver for UI-facing events.
    pub fn new(config: EngineConfig) -> (Arc<Self>, mpsc::Receiver<EngineEvent>) {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let engine = Arc::new(Self {
            api: ApiClient::new(config.api_base.clone()),
            config,
            state: Mutex::new(EngineState::default()),
            connection: tokio::sync::Mutex::new(None),
            events_tx,
        });
        (engine, events_rx)
    }

    /// Hand the engine its session. Operations no-op until this is called.
    pub fn set_session(&self, session: Session) {
        let mut state = self.lock_state();
        info!(user = %session.user.id, "Session set");
        state.session = Some(session);
    }

    /// Drop the session and active conversation (logout).
    pub fn clear_session(&self) {
        let mut state = self.lock_state();
        state.session = None;
        state.active.deactivate();
    }

    // -----------------------------------------------------------------------
    // Startup
    // -----------------------------------------------------------------------

    /// Bring the engine up for the current session: hydrate conversations,
    /// refresh the side-channel caches, then connect the transport.
    ///
    /// Restoring a persisted active conversation is the caller's job (call
    /// [`Self::set_active`] afterwards).
    pub async fn initialize(self: &Arc<Self>) {
        if self.session().is_none() {
            debug!("No session, skipping initialization");
            return;
        }

        self.fetch_conversations().await;
        self.refresh_tasks().await;
        self.refresh_debts().await;
        self.connect().await;
    }

    /// Hydrate the conversation map from the participant list.
    pub async fn fetch_conversations(&self) {
        let Some(session) = self.session() else { return };

        match self.api.list_users(&session.token).await {
            Ok(users) => {
                let count = self
                    .lock_state()
                    .store
                    .hydrate(session.user.id, users);
                emit(&self.events_tx, EngineEvent::ConversationsHydrated { count });
            }
            Err(e) => error!(error = %e, "Failed to fetch conversations"),
        }
    }

    // -----------------------------------------------------------------------
    // Messaging
    // -----------------------------------------------------------------------

    /// Send a message to a counterpart.
    ///
    /// The optimistic copy is appended before the transmit request is
    /// issued, so the sender always sees their own message immediately.
    /// With the transport not connected the wire frame is dropped, never
    /// the append.
    pub async fn send_message(&self, conversation_id: UserId, content: &str) {
        let Some(session) = self.session() else { return };

        let appended = self.lock_state().store.append_outbound(
            session.user.id,
            conversation_id,
            content,
        );
        if appended.is_none() {
            warn!(conversation = %conversation_id, "Send to unknown conversation ignored");
            return;
        }

        let handle = self.connection.lock().await.clone();
        match handle {
            Some(handle) => {
                handle
                    .send(SendFrame {
                        receiver_id: conversation_id,
                        content: content.to_string(),
                    })
                    .await;
            }
            None => debug!("No transport connection, message kept local"),
        }
    }

    /// Fetch a conversation's history and replace its message list.
    ///
    /// A response that arrives after the user requested a newer fetch for
    /// the same conversation is discarded.
    pub async fn load_messages(&self, conversation_id: UserId) {
        let Some(session) = self.session() else { return };

        let Some(generation) = self.lock_state().store.begin_history_load(conversation_id)
        else {
            debug!(conversation = %conversation_id, "History load for unknown conversation ignored");
            return;
        };

        let fetched = match self
            .api
            .message_history(&session.token, conversation_id)
            .await
        {
            Ok(wire) => Some(history_to_messages(wire)),
            Err(e) => {
                error!(conversation = %conversation_id, error = %e, "Failed to fetch messages");
                None
            }
        };

        let applied =
            self.lock_state()
                .store
                .finish_history_load(conversation_id, generation, fetched);
        if applied {
            emit(&self.events_tx, EngineEvent::HistoryLoaded { conversation_id });
        }
    }

    /// Make a conversation the active one.
    ///
    /// Zeroes its unread count and triggers a history fetch. Unknown ids
    /// no-op so a stale persisted id cannot leave a dangling active
    /// reference.
    pub async fn set_active(&self, conversation_id: UserId) {
        {
            let mut state = self.lock_state();
            if !state.store.contains(conversation_id) {
                debug!(conversation = %conversation_id, "Activation of unknown conversation ignored");
                return;
            }
            state.active.activate(conversation_id);
            state.store.clear_unread(conversation_id);
        }

        self.load_messages(conversation_id).await;
    }

    // -----------------------------------------------------------------------
    // Transport lifecycle
    // -----------------------------------------------------------------------

    /// (Re)establish the WebSocket connection.
    ///
    /// Idempotent: an existing connection is closed first, so there is at
    /// most one live connection per engine. There is no automatic
    /// reconnect; callers re-invoke this on re-authentication.
    pub async fn connect(self: &Arc<Self>) {
        let Some(session) = self.session() else { return };

        {
            let mut connection = self.connection.lock().await;
            if let Some(old) = connection.take() {
                info!("Closing existing connection before reconnecting");
                old.close().await;
            }
        }

        self.set_connection_state(ConnectionState::Connecting);

        let url = ws_endpoint(
            &self.config.api_base,
            self.config.ws_base.as_deref(),
            &session.token,
        );
        match tally_net::connect(&url).await {
            Ok((handle, events)) => {
                *self.connection.lock().await = Some(handle);
                let engine = Arc::clone(self);
                tokio::spawn(async move { engine.drive(events).await });
            }
            Err(e) => {
                error!(error = %e, "WebSocket connect failed");
                self.set_connection_state(ConnectionState::Disconnected);
            }
        }
    }

    /// Tear the connection down. No retry is scheduled.
    pub async fn close(&self) {
        if let Some(handle) = self.connection.lock().await.take() {
            handle.close().await;
        }
    }

    /// Drain socket events for one connection. Runs until the socket task
    /// terminates; inbound frames are processed strictly in arrival order.
    async fn drive(self: Arc<Self>, mut events: mpsc::Receiver<SocketEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                SocketEvent::Connected => {
                    self.set_connection_state(ConnectionState::Connected);
                }
                SocketEvent::Disconnected => {
                    self.set_connection_state(ConnectionState::Disconnected);
                }
                SocketEvent::Frame(ServerFrame::Message(message)) => {
                    self.handle_message(message);
                }
                SocketEvent::Frame(ServerFrame::Notification(notification)) => {
                    debug!(
                        task_id = ?notification.task_id,
                        debt_id = ?notification.debt_id,
                        "Notification received"
                    );
                    self.spawn_refreshes(RefreshPlan::for_notification(&notification));
                }
            }
        }
    }

    /// Apply one transport-delivered message.
    fn handle_message(self: &Arc<Self>, wire: InboundMessage) {
        // Side effects fire for echoes too: the analysis that creates
        // tasks and debts runs on the local user's own messages.
        let plan = RefreshPlan::for_annotation(wire.ai_analysis.as_ref());

        {
            let mut state = self.lock_state();
            let Some(session) = state.session.clone() else {
                return;
            };

            match classify(session.user.id, &wire) {
                Classification::Echo => {
                    debug!(id = wire.id, "Discarding echo of own message");
                }
                Classification::New { conversation_id } => {
                    let message = Message::from_wire(wire, DeliveryStatus::Read);
                    let active = state.active.current();
                    if state
                        .store
                        .apply_inbound(conversation_id, message.clone(), active)
                    {
                        emit(
                            &self.events_tx,
                            EngineEvent::NewMessage {
                                conversation_id,
                                message,
                            },
                        );
                    }
                }
            }
        }

        self.spawn_refreshes(plan);
    }

    // -----------------------------------------------------------------------
    // Side-channel refreshes
    // -----------------------------------------------------------------------

    /// Fire the planned refreshes without blocking message handling.
    /// Each refresh logs its own failures.
    fn spawn_refreshes(self: &Arc<Self>, plan: RefreshPlan) {
        if plan.is_empty() {
            return;
        }
        if plan.tasks {
            let engine = Arc::clone(self);
            tokio::spawn(async move { engine.refresh_tasks().await });
        }
        if plan.debts {
            let engine = Arc::clone(self);
            tokio::spawn(async move { engine.refresh_debts().await });
        }
        if plan.balance {
            let engine = Arc::clone(self);
            tokio::spawn(async move { engine.refresh_balance().await });
        }
    }

    /// Re-fetch tasks and re-partition them into the conversation caches.
    pub async fn refresh_tasks(&self) {
        let Some(session) = self.session() else { return };

        match self.api.list_tasks(&session.token).await {
            Ok(tasks) => {
                self.lock_state().store.set_tasks(tasks);
                emit(&self.events_tx, EngineEvent::TasksRefreshed);
            }
            Err(e) => error!(error = %e, "Failed to refresh tasks"),
        }
    }

    /// Re-fetch active debts and re-project them into the conversation
    /// caches.
    pub async fn refresh_debts(&self) {
        let Some(session) = self.session() else { return };

        match self.api.debt_history(&session.token).await {
            Ok(debts) => {
                self.lock_state().store.set_debts(session.user.id, debts);
                emit(&self.events_tx, EngineEvent::DebtsRefreshed);
            }
            Err(e) => error!(error = %e, "Failed to refresh debts"),
        }
    }

    /// Re-fetch the aggregate balance.
    pub async fn refresh_balance(&self) {
        let Some(session) = self.session() else { return };

        match self.api.balance(&session.token).await {
            Ok(balance) => {
                self.lock_state().balance = Some(balance);
                emit(&self.events_tx, EngineEvent::BalanceRefreshed);
            }
            Err(e) => error!(error = %e, "Failed to refresh balance"),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Snapshot of one conversation.
    pub fn conversation(&self, conversation_id: UserId) -> Option<Conversation> {
        self.lock_state().store.conversation(conversation_id).cloned()
    }

    /// Snapshot of all conversations.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.lock_state().store.conversations()
    }

    /// The currently active conversation, looked up on demand.
    pub fn active_conversation(&self) -> Option<Conversation> {
        let state = self.lock_state();
        state
            .active
            .current()
            .and_then(|id| state.store.conversation(id).cloned())
    }

    pub fn active_conversation_id(&self) -> Option<UserId> {
        self.lock_state().active.current()
    }

    pub fn unread(&self, conversation_id: UserId) -> u32 {
        self.lock_state().store.unread(conversation_id)
    }

    pub fn balance(&self) -> Option<DebtBalance> {
        self.lock_state().balance.clone()
    }

    /// Last observed transport state.
    pub fn connection_state(&self) -> ConnectionState {
        self.lock_state().connection_state
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn session(&self) -> Option<Session> {
        self.lock_state().session.clone()
    }

    fn set_connection_state(&self, new: ConnectionState) {
        {
            let mut state = self.lock_state();
            if state.connection_state == new {
                return;
            }
            state.connection_state = new;
        }
        info!(state = ?new, "Connection state changed");
        emit(&self.events_tx, EngineEvent::ConnectionChanged { state: new });
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().expect("engine state lock poisoned")
    }
}
