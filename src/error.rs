//! Error types for the wallet scorer

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wallet scorer
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid weight table '{version}': {reason}")]
    InvalidWeights { version: String, reason: String },

    #[error("Invalid wallet id pattern: {0}")]
    InvalidPattern(String),

    // Batch errors
    #[error("Malformed record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: RecordError },

    #[error("Wallet not found in batch: {0}")]
    WalletNotFound(String),

    // Output errors
    #[error("Output file already exists: {0}")]
    OutputExists(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error was caused by the input batch rather than the environment
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedRecord { .. } | Error::WalletNotFound(_) | Error::Deserialization(_)
        )
    }
}

/// Reason a single transaction record was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("unreadable record: {0}")]
    Unreadable(String),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("empty wallet id")]
    EmptyWallet,

    #[error("wallet id '{0}' does not match the configured pattern")]
    WalletPattern(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("negative usd value {0}")]
    NegativeValue(f64),

    #[error("non-finite usd value")]
    NonFiniteValue,

    #[error("invalid numeric field '{field}': {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("{action} total for wallet would exceed the finite range")]
    TotalOverflow { action: &'static str },
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            Error::Deserialization(e.to_string())
        } else {
            Error::Serialization(e.to_string())
        }
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
