use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Line not found: {0}")]
    NotFoundLine(u32),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Usage: {0}")]
    Usage(String),
    #[error("GPIO error: {0}")]
    Gpio(String),
    #[error("sysfs {}: {source}", path.display())]
    Sysfs {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("poll() failed: {0}")]
    Poll(#[source] io::Error),
}

impl AppError {
    pub(crate) fn sysfs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        AppError::Sysfs {
            path: path.into(),
            source,
        }
    }
}
