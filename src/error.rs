use thiserror::Error;

use crate::raster::RasterError;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("{0}")]
    Failure(String),

    #[error("Raster access error: {0}")]
    Raster(#[from] RasterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Coarse classification callers act on.
///
/// `ResourceUnavailable` means "no data here" and is recoverable per tile.
/// `Configuration` has to be fixed by the caller. `Failure` is terminal for
/// the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    ResourceUnavailable,
    Failure,
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::Configuration(_)
            | DriverError::Serialization(_)
            | DriverError::Config(_) => ErrorKind::Configuration,
            DriverError::ResourceUnavailable(_)
            | DriverError::Raster(_)
            | DriverError::Io(_) => ErrorKind::ResourceUnavailable,
            DriverError::Failure(_) | DriverError::Encoding(_) => ErrorKind::Failure,
        }
    }

    /// True when the error only means this tile has no data.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::ResourceUnavailable
    }

    pub(crate) fn unavailable(msg: impl Into<String>) -> Self {
        DriverError::ResourceUnavailable(msg.into())
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
