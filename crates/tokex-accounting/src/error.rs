//! Error types for the accounting boundary.

use thiserror::Error;

/// Errors raised by accounting, tagging and finalization.
#[derive(Debug, Error)]
pub enum AccountingError {
    /// A side of the proposal does not name a fixed set of tokens.
    #[error("proposal is not qualified")]
    NotQualified,

    /// A transferred token is already owned by a party other than its giver.
    #[error("token {token_id} is not owned by its giver")]
    TokenConflict { token_id: String },

    /// The exchange record could not be canonically encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backing store failed.
    #[error("store fault: {0}")]
    Store(String),
}

/// Result type for accounting operations.
pub type Result<T> = std::result::Result<T, AccountingError>;
