//! # Tokex Testkit
//!
//! Testing utilities for the Tokex broker:
//!
//! - **Fixtures**: parties with real ed25519 keys, token expression and
//!   proposal builders.
//! - **Harness**: a wired broker over in-memory channels, with consumers
//!   that record the pushes they receive.
//! - **Generators**: proptest strategies for token expressions.

pub mod fixtures;
pub mod generators;
pub mod harness;

pub use fixtures::{and, ior, not, party, proposal, t, tk, xor};
pub use harness::{BrokerHarness, Consumer};
