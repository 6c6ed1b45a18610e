//! Finalized exchanges and token ownership records.

use crate::party::Party;
use crate::proposal::Proposal;
use crate::types::ExchangeId;
use serde::{Deserialize, Serialize};

/// A completed token exchange.
///
/// Immutable once recorded. The proposer gave up the tokens in
/// `proposal.give` and received those in `proposal.want`; the acceptor did
/// the reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    /// Unique identity of the exchange, derived from its contents.
    pub id: ExchangeId,

    /// When the exchange was finalized, unix ms.
    pub completed_at: i64,

    /// The accepted and confirmed proposal.
    pub proposal: Proposal,

    /// The party that sent and confirmed the proposal.
    pub proposer: Party,

    /// The party that received and accepted the proposal.
    pub acceptor: Party,
}

impl Exchange {
    /// Build the exchange record, deriving `id` from the canonical JSON
    /// encoding of the remaining fields.
    pub fn seal(
        completed_at: i64,
        proposal: Proposal,
        proposer: Party,
        acceptor: Party,
    ) -> serde_json::Result<Self> {
        #[derive(Serialize)]
        struct Canonical<'a> {
            completed_at: i64,
            proposal: &'a Proposal,
            proposer: &'a Party,
            acceptor: &'a Party,
        }
        let canonical = serde_json::to_vec(&Canonical {
            completed_at,
            proposal: &proposal,
            proposer: &proposer,
            acceptor: &acceptor,
        })?;
        Ok(Self {
            id: ExchangeId::derive(&canonical),
            completed_at,
            proposal,
            proposer,
            acceptor,
        })
    }
}

/// One particular token being owned by a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ownership {
    /// The owning party.
    pub party: Party,

    /// The id of one token owned by `party`.
    pub token_id: String,
}
