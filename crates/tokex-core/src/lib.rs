//! # Tokex Core
//!
//! Pure data model and algorithms of the Tokex broker: tokens, logical token
//! expressions with qualification and satisfiability checking, parties,
//! exchange proposals and their acceptability rules, finalized exchanges,
//! tags, and paginated queries.
//!
//! No I/O and no async; everything here is deterministic given its inputs
//! and the caller-supplied clock values.

pub mod exchange;
pub mod expr;
pub mod filter;
pub mod party;
pub mod proposal;
pub mod query;
pub mod sat;
pub mod tag;
pub mod token;
pub mod types;

pub use exchange::{Exchange, Ownership};
pub use expr::TokenExpr;
pub use filter::ProposalFilter;
pub use party::{Party, PartySet};
pub use proposal::{Proposal, Visibility, DEFAULT_FUDGE_MS};
pub use query::{ExchangeQuery, OwnershipQuery, Page, ResultSet, TagQuery, TokenQuery};
pub use sat::is_satisfiable;
pub use tag::Tag;
pub use token::Token;
pub use types::{now_millis, ExchangeId, PartyKey, ProposalId};
