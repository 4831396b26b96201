//! Engine configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the engine can run against a
//! local development server with zero configuration.

use tally_shared::constants::DEFAULT_API_BASE;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the REST API.
    /// Env: `TALLY_API_BASE`
    /// Default: `http://127.0.0.1:8000`
    pub api_base: String,

    /// Explicit WebSocket base URL (e.g. `wss://chat.example.com`).
    /// When unset, the base is derived from `api_base` with the scheme
    /// mapped to its WebSocket counterpart.
    /// Env: `TALLY_WS_BASE`
    /// Default: unset.
    pub ws_base: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ws_base: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base) = std::env::var("TALLY_API_BASE") {
            if !base.is_empty() {
                config.api_base = base;
            }
        }

        if let Ok(base) = std::env::var("TALLY_WS_BASE") {
            if !base.is_empty() {
                config.ws_base = Some(base);
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
