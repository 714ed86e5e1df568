//! Logging and security event infrastructure
//!
//! Application code uses the standard `tracing` macros; this module only
//! installs the subscriber and names the security events the pipeline emits.
//!
//! ```ignore
//! use flashcard_gate::observability::{init, ObservabilityConfig};
//!
//! init(ObservabilityConfig::from_env())?;
//! ```

mod config;
mod events;
mod providers;

pub use config::{LogFormat, ObservabilityConfig, ObservabilityConfigBuilder};
pub use events::{security_event, SecurityEvent, Severity};

/// Install the global tracing subscriber.
///
/// Call once at startup, before any logging occurs. A second call fails with
/// [`ObservabilityError::Provider`].
pub fn init(config: ObservabilityConfig) -> Result<(), ObservabilityError> {
    providers::init_tracing(&config)?;

    tracing::info!(
        log_format = ?config.log_format,
        log_filter = %config.log_filter,
        "Observability initialized"
    );

    Ok(())
}

/// Observability initialization errors
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    /// Invalid configuration
    #[error("observability config error: {0}")]
    Config(String),
    /// Subscriber installation failed
    #[error("provider error: {0}")]
    Provider(String),
}
