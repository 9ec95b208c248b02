use thiserror::Error;

use crate::config::ConfigError;
use crate::logging::LoggingError;

/// Unified result type for the kiosk switcher.
pub type Result<T> = std::result::Result<T, KioskError>;

/// Errors that can stop the process. Everything raised after startup is
/// handled where it occurs and never reaches this type.
#[derive(Debug, Error)]
pub enum KioskError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error("control plane could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("terminal backend error: {0}")]
    Terminal(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
