//! Tracing subscriber setup for host applications.
//!
//! The library itself only emits `tracing` events. A host (desktop shell,
//! test harness, wasm bridge) calls [`init`] once at startup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogConfig, LogFormat};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "storefront_client=info";

/// Install the global tracing subscriber.
///
/// Uses `RUST_LOG` when set, otherwise [`DEFAULT_FILTER`]. Returns `false`
/// if a global subscriber was already installed (the existing one is kept).
pub fn init(config: &LogConfig) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match config.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    installed.is_ok()
}
