//! Error types for Whirlroute

use thiserror::Error;

/// Core errors that can occur in Whirlroute
#[derive(Debug, Error)]
pub enum Error {
    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Invalid percentage {numerator}/{denominator}")]
    InvalidPercentage { numerator: u64, denominator: u64 },
}

/// Pool-state reader and enumerator errors
#[derive(Debug, Clone, Error)]
pub enum ReaderError {
    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("RPC returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Failed to decode account {address}: {message}")]
    Decode { address: String, message: String },

    #[error("Batch incomplete: requested {requested} accounts, received {returned}")]
    IncompleteBatch { requested: usize, returned: usize },
}

impl ReaderError {
    /// Whether a caller-side retry may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } | Self::IncompleteBatch { .. } => true,
            Self::Rpc { code, .. } => *code == 429 || (-32099..=-32000).contains(code),
            Self::Decode { .. } => false,
        }
    }
}

/// Result type alias for Whirlroute operations
pub type Result<T> = std::result::Result<T, Error>;
