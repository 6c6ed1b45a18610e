//! Standing proposal filters.

use crate::expr::TokenExpr;
use crate::proposal::Proposal;
use crate::types::PartyKey;
use serde::{Deserialize, Serialize};

/// A standing declaration of what proposals a party wants delivered.
///
/// Evaluation order: the blacklist always wins, then the whitelist if one is
/// set, then the `want` kind match if one is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalFilter {
    /// No proposals are desired from these parties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blacklist: Option<Vec<PartyKey>>,

    /// Proposals are desired only from these parties, unless blacklisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<PartyKey>>,

    /// Only proposals offering tokens matching this expression are desired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub want: Option<TokenExpr>,
}

impl ProposalFilter {
    /// Whether a proposal from `proposer` passes the filter.
    pub fn admits(&self, proposer: &PartyKey, proposal: &Proposal) -> bool {
        if let Some(blacklist) = &self.blacklist {
            if blacklist.contains(proposer) {
                return false;
            }
        }
        if let Some(whitelist) = &self.whitelist {
            if !whitelist.contains(proposer) {
                return false;
            }
        }
        if let Some(want) = &self.want {
            // Interest matching is deliberately loose: the offered side must
            // mention at least one kind the filter asks for.
            let wanted = want.kinds();
            if !proposal.give.kinds().iter().any(|k| wanted.contains(k)) {
                return false;
            }
        }
        true
    }
}
