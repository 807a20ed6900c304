//! Error types for the incoming transaction tracker
//!
//! Every failure in the tracker degrades to "no progress this cycle". These
//! errors are what a cycle reports before it is logged and dropped by the
//! coordinator; none of them is fatal to the host process.

use thiserror::Error;

/// Errors produced while fetching, normalizing or persisting incoming transactions
#[derive(Debug, Error)]
pub enum IncomingTxError {
    /// Transport level failure talking to the explorer (includes timeouts)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The explorer answered, but not with something usable
    #[error("Explorer error: {0}")]
    Explorer(String),

    /// A raw explorer record carried a field that could not be normalized
    #[error("Invalid {field} in explorer record: '{value}'")]
    Normalization { field: &'static str, value: String },

    /// Persistence backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation requires a feature that is not compiled in
    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),
}

impl IncomingTxError {
    /// Build a normalization error for `field`
    pub fn normalization(field: &'static str, value: impl Into<String>) -> Self {
        Self::Normalization {
            field,
            value: value.into(),
        }
    }

    /// True for failures that leave stored state untouched and are worth retrying
    /// on the next trigger
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Explorer(_))
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for IncomingTxError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IncomingTxError::Http(format!("request timed out: {e}"))
        } else if e.is_decode() {
            IncomingTxError::Explorer(format!("failed to decode response: {e}"))
        } else {
            IncomingTxError::Http(e.to_string())
        }
    }
}

#[cfg(feature = "storage")]
impl From<tokio_rusqlite::Error> for IncomingTxError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        IncomingTxError::Storage(e.to_string())
    }
}

/// Result alias used throughout the crate
pub type IncomingTxResult<T> = Result<T, IncomingTxError>;
