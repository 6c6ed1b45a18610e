//! Error types for exchange negotiation.

use thiserror::Error;

/// Errors a negotiating party can be answered with.
///
/// Every variant carries a stable non-negative application code, which is
/// what crosses the wire; the reserved negative codes belong to the
/// transport.
#[derive(Debug, Error)]
pub enum BrokeringError {
    /// The request was legal but could not be carried out.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// No proposal with the given id is known to the caller's session.
    #[error("proposal not found")]
    ProposalNotFound,

    /// The proposal's baseline has not yet passed.
    #[error("proposal not yet acceptable")]
    ProposalNotYetAcceptable,

    /// The proposal cannot be satisfied by any choice of tokens, or its
    /// acceptance window is empty.
    #[error("proposal not satisfiable")]
    ProposalNotSatisfiable,

    /// A named receiver is not a known party.
    #[error("proposal receiver not found")]
    ProposalReceiverNotFound,

    /// A receiver's standing filter refuses proposals from the caller.
    #[error("request blocked by receiver filter")]
    RequestBlocked,

    /// A request parameter is out of bounds.
    #[error("request invalid: {0}")]
    RequestInvalid(String),

    /// The request is not legal in the session's current state, or for the
    /// calling party.
    #[error("request not legal: {0}")]
    RequestNotLegal(String),

    /// The request names an operation the broker does not support.
    #[error("request not supported")]
    RequestNotSupported,

    /// The window for the request has passed.
    #[error("request timeout")]
    RequestTimeout,
}

impl BrokeringError {
    /// The application error code of this error.
    pub fn code(&self) -> i64 {
        match self {
            Self::RequestFailed(_) => 0,
            Self::ProposalNotFound => 1,
            Self::ProposalNotYetAcceptable => 2,
            Self::ProposalNotSatisfiable => 3,
            Self::ProposalReceiverNotFound => 4,
            Self::RequestBlocked => 5,
            Self::RequestInvalid(_) => 6,
            Self::RequestNotLegal(_) => 7,
            Self::RequestNotSupported => 8,
            Self::RequestTimeout => 9,
        }
    }
}

/// Result type for negotiation operations.
pub type Result<T> = std::result::Result<T, BrokeringError>;
