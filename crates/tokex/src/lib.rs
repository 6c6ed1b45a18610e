//! # Tokex
//!
//! A broker that lets independent parties negotiate and finalize exchanges
//! of ownership over abstract tokens. Consumers talk JSON-RPC 2.0 over any
//! ordered reliable channel; the broker mediates the three-step OFFERO,
//! CONCENTIO, RECIPIO negotiation, checks that proposals are satisfiable,
//! and records the resulting exchanges.
//!
//! ## Method surface
//!
//! | Namespace | Purpose |
//! |---|---|
//! | `Brokering.*` | propose, accept, reject, confirm, abort |
//! | `BrokerAccounting.*` | query exchanges, ownerships, tokens |
//! | `BrokerTagging.*` | query and store tags |
//! | `BrokerSession.*` | per-party key, callback and proposal filter |
//! | `BrokeringPush.*` | broker-to-consumer event notifications |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokex::{Broker, BrokerConfig};
//! use tokex_core::{Party, PartyKey};
//! use tokex_rpc::memory_duplex;
//!
//! # #[tokio::main] async fn main() -> anyhow::Result<()> {
//! let (broker, _ledger) = Broker::in_memory(BrokerConfig::default())?;
//! let (server_end, client_end) = memory_duplex(64);
//! let party = Party::new(PartyKey::from_bytes(vec![1; 32]), "alice");
//! broker.attach(server_end, party);
//! # let _ = client_end;
//! # Ok(()) }
//! ```

pub mod broker;
pub mod config;

pub use broker::Broker;
pub use config::BrokerConfig;
