//! Telemetry initialization.
//!
//! Controlled by `SHIPLINE_LOG`:
//! - unset → no-op (tracing disabled, zero overhead)
//! - `"json"` → JSON spans/events to stderr
//! - any other value → human-readable events to stderr
//!
//! Event filtering uses the standard `RUST_LOG` syntax in all modes,
//! defaulting to `info`.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber based on `SHIPLINE_LOG`.
///
/// Safe to call once at process start; later calls are no-ops (the global
/// subscriber can only be set once and failures are ignored).
pub fn init() {
    let Some(mode) = std::env::var("SHIPLINE_LOG").ok().filter(|v| !v.is_empty()) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if mode == "json" {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
