//! WebSocket endpoint derivation.
//!
//! An explicitly configured WebSocket base always wins. Without one, the
//! base is derived from the REST API base with the scheme mapped to its
//! WebSocket counterpart (`https` → `wss`, `http` → `ws`), so a
//! TLS-terminated deployment keeps a secure transport.

use tally_shared::constants::WS_PATH_PREFIX;

/// Build the full WebSocket URL for a session token.
pub fn ws_endpoint(api_base: &str, ws_base: Option<&str>, token: &str) -> String {
    let base = match ws_base {
        Some(explicit) => explicit.trim_end_matches('/').to_string(),
        None => derive_ws_base(api_base),
    };
    format!("{base}{WS_PATH_PREFIX}/{token}")
}

fn derive_ws_base(api_base: &str) -> String {
    let api = api_base.trim_end_matches('/');
    if let Some(rest) = api.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        // Bare host:port, e.g. a dev server given without a scheme.
        format!("ws://{api}")
    }
}
