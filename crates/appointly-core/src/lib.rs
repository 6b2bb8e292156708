pub mod config;
pub mod error;

pub use config::{Config, FirebaseConfig, SchedulerConfig, ValidationResult};
pub use error::{AppError, AuthError, ConfigError, NetworkError, ReqwestErrorExt};

use anyhow::Result;

/// Initialize logging for the application.
///
/// Honours `RUST_LOG`; falls back to `info`. Safe to call more than once.
pub fn init() -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
    if let Err(e) = installed {
        tracing::debug!("Keeping the existing tracing subscriber: {}", e);
    }

    tracing::info!("Appointly core initialized");
    Ok(())
}
