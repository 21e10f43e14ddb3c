//! Error types for DhavakNav

use thiserror::Error;

/// DhavakNav error type
///
/// Solver failures are not errors: they are reported per tick through
/// [`SolveStatus`](crate::optimizer::SolveStatus) and never abort the loop.
#[derive(Error, Debug)]
pub enum DhavakError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field} = {value} ({reason})")]
    InvalidConfiguration {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Channel error: {0}")]
    Channel(String),
}

impl DhavakError {
    pub(crate) fn invalid(field: &'static str, value: impl ToString, reason: &'static str) -> Self {
        DhavakError::InvalidConfiguration {
            field,
            value: value.to_string(),
            reason,
        }
    }
}

impl From<toml::de::Error> for DhavakError {
    fn from(e: toml::de::Error) -> Self {
        DhavakError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DhavakError>;
