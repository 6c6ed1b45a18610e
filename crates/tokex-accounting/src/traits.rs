//! The external-collaborator boundary.
//!
//! The broker consults these traits for everything it remembers across
//! negotiations. The in-memory implementations in [`crate::memory`] serve
//! tests and in-process embedding; anything durable lives behind the same
//! seams.

use crate::error::Result;
use async_trait::async_trait;
use tokex_core::{
    Exchange, ExchangeQuery, Ownership, OwnershipQuery, Party, Proposal, ResultSet, Tag,
    TagQuery, Token, TokenQuery,
};

/// Read access to the broker's records of exchanges, ownerships and tokens.
///
/// All lookups are paginated and total: an out-of-range offset yields an
/// empty page, never an error.
#[async_trait]
pub trait Accounting: Send + Sync {
    async fn exchanges(&self, query: ExchangeQuery) -> Result<ResultSet<Exchange>>;

    async fn ownerships(&self, query: OwnershipQuery) -> Result<ResultSet<Ownership>>;

    async fn tokens(&self, query: TokenQuery) -> Result<ResultSet<Token>>;
}

/// Read and write access to tags.
#[async_trait]
pub trait Tagging: Send + Sync {
    async fn tags(&self, query: TagQuery) -> Result<ResultSet<Tag>>;

    /// Store a tag, minting an id if the tag carries none. Returns the id
    /// under which the tag is stored.
    async fn put_tag(&self, tag: Tag) -> Result<String>;
}

/// Turns a confirmed proposal into exactly one immutable exchange.
#[async_trait]
pub trait Finalizer: Send + Sync {
    /// Finalize the exchange described by `proposal` between `proposer` and
    /// `acceptor` at time `now`.
    ///
    /// Each transferred token must either be previously unknown or owned by
    /// the party giving it up. On any violation nothing is recorded and the
    /// error propagates to the confirming caller.
    async fn finalize(
        &self,
        proposal: Proposal,
        proposer: Party,
        acceptor: Party,
        now: i64,
    ) -> Result<Exchange>;
}
