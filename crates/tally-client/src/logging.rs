//! Tracing initialisation.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber (respects the `RUST_LOG` env
/// var). Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tally_client=debug")),
        )
        .try_init();
}
