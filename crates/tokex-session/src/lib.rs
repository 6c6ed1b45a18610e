//! # Tokex Session
//!
//! The exchange negotiation protocol: every (proposal, receiver) pair gets
//! its own session walking OFFERO through CONCENTIO to RECIPIO, or into one
//! of the REJECTED/ABORTED terminals. The [`Negotiation`] engine owns the
//! session table, enforces who may do what when, and reports events through
//! a [`PushSink`].

pub mod error;
pub mod protocol;
pub mod state;

pub use error::{BrokeringError, Result};
pub use protocol::{Negotiation, PushSink, SessionConfig};
pub use state::{Session, SessionState};
