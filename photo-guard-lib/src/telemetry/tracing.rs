use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::config::LoggingConfig;
use crate::error::{GuardError, Result};

/// Initialize the global tracing subscriber from the logging configuration
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(logging.show_target);

    let subscriber = Registry::default().with(env_filter).with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber).map_err(|e| {
        GuardError::Initialization(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    Ok(())
}
