// src/error.rs

use thiserror::Error;

/// Failures at the I/O edges. The line pipeline itself never fails; every
/// ambiguity there is reported as an issue on the line.
#[derive(Debug, Error)]
pub enum Error {
    #[error("correction store: {0}")]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bad timestamp: {0}")]
    Timestamp(String),

    #[error("format {0:?} is still ambiguous, give a unit (e.g. \"2/5LB\" or \"24CT\")")]
    AmbiguousCorrection(String),

    #[error("line {0} has neither an item code nor a description to learn against")]
    MissingItem(usize),

    #[error("unknown unit type {0:?} in stored correction")]
    UnknownUnitType(String),
}

pub type Result<T> = std::result::Result<T, Error>;
