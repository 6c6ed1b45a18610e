//! # Tokex RPC
//!
//! The call transport of the Tokex broker: raw message channels, JSON-RPC
//! 2.0 call semantics with correlation ids and per-call timeouts, and a
//! router that serves named methods over any number of channels.
//!
//! The layering, bottom up:
//!
//! - [`channel`] moves opaque frames over an ordered reliable duplex.
//! - [`message`] gives frames their JSON-RPC shape and role.
//! - [`transport`] adds calls, replies, timeouts and the single-use
//!   [`Responder`] capability.
//! - [`router`] maps method names to handlers and channels to parties.

pub mod channel;
pub mod error;
pub mod message;
pub mod router;
pub mod transport;

pub use channel::{memory_duplex, ChannelEvent, MemoryChannel, RawChannel};
pub use error::{codes, ChannelError, ErrorObject, Result, RouterError, RpcError};
pub use message::{Incoming, MAX_SAFE_ID};
pub use router::{CallContext, ChannelSource, FnHandler, Handler, Router};
pub use transport::{CallChannel, Dispatch, RejectAll, Responder, TransportConfig};
