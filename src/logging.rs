//! Log setup shared by the binaries
//!
//! Inventory programs must keep stdout clean for JSON, so every log line goes
//! to stderr. `RUST_LOG` overrides the default filter.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "jeti_inventory=debug,reqwest=debug"
    } else {
        "warn"
    }
}

/// Installs the global subscriber; later calls are ignored
pub fn init(debug: bool) {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug).into()))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
