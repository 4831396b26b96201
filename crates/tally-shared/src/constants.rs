/// Route prefix of the chat WebSocket; the session token is appended as a
/// path segment.
pub const WS_PATH_PREFIX: &str = "/ws";

/// Default REST API base URL for local development.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Page size for conversation history fetches (most recent first).
pub const HISTORY_FETCH_LIMIT: u32 = 50;

/// Page size for active-debt fetches.
pub const DEBT_FETCH_LIMIT: u32 = 100;

/// Status filter applied to debt history fetches.
pub const DEBT_STATUS_FILTER: &str = "active";

/// Capacity of the transport command/event channels and the engine event
/// channel.
pub const CHANNEL_CAPACITY: usize = 256;
