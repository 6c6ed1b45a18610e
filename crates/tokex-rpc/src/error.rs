//! Error types for the call transport.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved protocol error codes. Application codes are zero or positive.
pub mod codes {
    /// The incoming frame was not valid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// The message was well-formed JSON but not a valid call or reply.
    pub const INVALID_REQUEST: i64 = -32600;
    /// No handler is registered for the named method.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// The parameters do not fit the method.
    pub const INVALID_PARAMS: i64 = -32602;
    /// The handler faulted without an application code.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// The error member of a reply, as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The generic reply for a handler fault that carries no application
    /// code. Detail stays in the local log.
    pub fn internal() -> Self {
        Self::new(codes::INTERNAL_ERROR, "internal error")
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("no such method: {method}"))
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, detail)
    }
}

/// Errors that can occur on a raw channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel is closed; no more frames can pass.
    #[error("channel closed")]
    Closed,

    /// `close` was called on an already closed channel.
    #[error("channel already closed")]
    AlreadyClosed,

    /// The underlying medium failed.
    #[error("channel fault: {0}")]
    Fault(String),
}

/// Errors observed by a caller awaiting a reply.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The remote side answered with an error reply.
    #[error("remote error {}: {}", .0.code, .0.message)]
    Remote(ErrorObject),

    /// No reply arrived within the call timeout.
    #[error("call timed out")]
    Timeout,

    /// The channel closed or faulted before the reply arrived.
    #[error("channel closed before reply")]
    ChannelClosed,

    /// The outgoing message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Sending the frame failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl RpcError {
    /// The application code carried by a remote error, if any.
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::Remote(error) => Some(error.code),
            _ => None,
        }
    }
}

/// Errors raised by router configuration.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A handler is already registered under this method name.
    #[error("duplicate method: {0}")]
    DuplicateMethod(String),

    /// A channel source is already registered under this id.
    #[error("duplicate source: {0}")]
    DuplicateSource(String),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, RpcError>;
