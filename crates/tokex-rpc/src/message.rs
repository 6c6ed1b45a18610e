//! Wire message model.
//!
//! Messages are JSON-RPC 2.0 objects. A request carries `method` and
//! `params`, and owes a reply iff it carries an `id`; a reply carries the
//! `id` it answers plus exactly one of `result` and `error`. Correlation ids
//! are integers kept at or below 2^53 - 1 so they survive a round trip
//! through a JSON double.

use crate::error::ErrorObject;
use serde_json::{json, Value};

/// Largest correlation id ever minted or accepted.
pub const MAX_SAFE_ID: u64 = (1 << 53) - 1;

/// The protocol tag every message must carry.
pub const PROTOCOL: &str = "2.0";

/// A received message, sorted into its protocol role.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A request owing a reply.
    Call {
        id: u64,
        method: String,
        params: Value,
    },
    /// A request owing nothing.
    Notification { method: String, params: Value },
    /// An answer to an earlier outgoing call.
    Reply {
        id: u64,
        outcome: Result<Value, ErrorObject>,
    },
}

/// Why a well-formed JSON value is not a valid message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageFault {
    BadProtocolTag,
    BadId,
    BadMethod,
    BadErrorObject,
    ResultAndError,
    NeitherRequestNorReply,
}

impl MessageFault {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::BadProtocolTag => "missing or wrong protocol tag",
            Self::BadId => "id is not an integer within the safe range",
            Self::BadMethod => "method is not a string",
            Self::BadErrorObject => "malformed error object",
            Self::ResultAndError => "reply carries both result and error",
            Self::NeitherRequestNorReply => "message is neither a request nor a reply",
        }
    }
}

/// Sort a parsed JSON value into its protocol role.
pub fn classify(value: Value) -> Result<Incoming, MessageFault> {
    let Value::Object(mut map) = value else {
        return Err(MessageFault::NeitherRequestNorReply);
    };
    if map.get("jsonrpc").and_then(Value::as_str) != Some(PROTOCOL) {
        return Err(MessageFault::BadProtocolTag);
    }

    let id = match map.get("id") {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_u64() {
            Some(id) if id <= MAX_SAFE_ID => Some(id),
            _ => return Err(MessageFault::BadId),
        },
    };

    if map.contains_key("method") {
        let method = match map.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(MessageFault::BadMethod),
        };
        let params = map.remove("params").unwrap_or(Value::Null);
        return Ok(match id {
            Some(id) => Incoming::Call { id, method, params },
            None => Incoming::Notification { method, params },
        });
    }

    let result = map.remove("result");
    let error = map.remove("error");
    match (result, error) {
        (Some(_), Some(_)) => Err(MessageFault::ResultAndError),
        (Some(result), None) => {
            let id = id.ok_or(MessageFault::BadId)?;
            Ok(Incoming::Reply {
                id,
                outcome: Ok(result),
            })
        }
        (None, Some(error)) => {
            let error: ErrorObject =
                serde_json::from_value(error).map_err(|_| MessageFault::BadErrorObject)?;
            let id = id.ok_or(MessageFault::BadId)?;
            Ok(Incoming::Reply {
                id,
                outcome: Err(error),
            })
        }
        (None, None) => Err(MessageFault::NeitherRequestNorReply),
    }
}

pub fn request(id: u64, method: &str, params: &Value) -> Value {
    json!({"jsonrpc": PROTOCOL, "id": id, "method": method, "params": params})
}

pub fn notification(method: &str, params: &Value) -> Value {
    json!({"jsonrpc": PROTOCOL, "method": method, "params": params})
}

pub fn reply_ok(id: u64, result: Value) -> Value {
    json!({"jsonrpc": PROTOCOL, "id": id, "result": result})
}

/// An error reply; `id` is `None` when the offending request's id could not
/// be recovered, in which case the reply carries a null id.
pub fn reply_err(id: Option<u64>, error: &ErrorObject) -> Value {
    json!({"jsonrpc": PROTOCOL, "id": id, "error": error})
}
