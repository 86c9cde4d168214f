//! Protocol error types.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The hostname is not a fully qualified domain name.
    #[error("hostname is not a fully qualified domain name: {hostname:?} ({reason})")]
    InvalidHostname {
        /// The rejected input.
        hostname: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The record type mnemonic is not one this crate can resolve.
    #[error("unknown or unsupported record type: {0}")]
    UnknownRecordType(String),

    /// A DNS JSON body could not be decoded.
    #[error("malformed DNS JSON body: {0}")]
    Json(String),
}

impl Error {
    /// Creates an invalid hostname error.
    pub fn invalid_hostname(hostname: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidHostname {
            hostname: hostname.into(),
            reason,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
