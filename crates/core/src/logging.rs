//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when neither `RUST_LOG` nor the config provides one.
pub const DEFAULT_LOG_FILTER: &str = "info,presenter=debug";

/// Initialize the logging system with tracing.
///
/// Filter precedence: `RUST_LOG`, then `filter`, then [`DEFAULT_LOG_FILTER`].
/// Output goes through the `fmt` layer with targets and thread ids.
///
/// Calling this more than once is harmless; later calls are ignored.
///
/// # Example
/// ```
/// presenter_core::init_logging(None);
/// tracing::info!("Presenter initialized");
/// ```
pub fn init_logging(filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
