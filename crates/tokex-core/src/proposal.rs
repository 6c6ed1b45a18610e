//! Exchange proposals and their acceptability rules.

use crate::expr::TokenExpr;
use crate::party::PartySet;
use crate::sat::is_satisfiable;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Permitted clock error, in milliseconds, when comparing the current time
/// to a proposal baseline or deadline.
pub const DEFAULT_FUDGE_MS: i64 = 300;

/// How widely a proposal is disclosed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Sent in secret to each receiver; receivers are not told about each
    /// other.
    Private,
    /// Sent in secret to each receiver; receivers are told who else received
    /// the proposal.
    Protected,
    /// Visible to every party in the trading network, receivers or not.
    Public,
}

impl Visibility {
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Private => 0,
            Self::Protected => 1,
            Self::Public => 2,
        }
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Private),
            1 => Some(Self::Protected),
            2 => Some(Self::Public),
            _ => None,
        }
    }

    /// Whether receivers learn about each other.
    pub const fn discloses_receivers(self) -> bool {
        !matches!(self, Self::Private)
    }
}

impl Serialize for Visibility {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Visibility {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid proposal visibility: {value}"))
        })
    }
}

/// A token exchange proposal.
///
/// A proposal is *qualified* when both its `want` and `give` expressions are
/// qualified, leaving no ambiguity about which entities change hands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// How widely the proposal is disclosed.
    pub visibility: Visibility,

    /// The moment, unix ms, when the proposal becomes acceptable.
    pub baseline: i64,

    /// The moment, unix ms, when the proposal ceases to be acceptable.
    pub deadline: i64,

    /// What tokens are desired.
    pub want: TokenExpr,

    /// What tokens are offered in return.
    pub give: TokenExpr,

    /// What parties receive the proposal.
    #[serde(default)]
    pub receivers: PartySet,
}

impl Proposal {
    /// Whether both sides of the proposal are qualified.
    pub fn is_qualified(&self) -> bool {
        self.want.is_qualified() && self.give.is_qualified()
    }

    /// Whether the proposal can be satisfied at all: the acceptance window
    /// is non-empty and both sides are satisfiable expressions.
    pub fn is_satisfiable(&self) -> bool {
        self.baseline <= self.deadline
            && is_satisfiable(&self.want)
            && is_satisfiable(&self.give)
    }

    /// Whether `now` lies inside the acceptance window, fudged at both ends.
    pub fn is_timely(&self, now: i64, fudge_ms: i64) -> bool {
        now >= self.baseline - fudge_ms && now < self.deadline + fudge_ms
    }

    /// Whether the proposal can be accepted at `now`: timely, qualified and
    /// satisfiable.
    pub fn is_acceptable(&self, now: i64, fudge_ms: i64) -> bool {
        self.is_timely(now, fudge_ms) && self.is_qualified() && self.is_satisfiable()
    }

    /// Whether the proposal can be rejected.
    ///
    /// Rejection has no timing window: a qualified, satisfiable proposal may
    /// be refused before its baseline and after its deadline alike.
    pub fn is_rejectable(&self) -> bool {
        self.is_qualified() && self.is_satisfiable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Token;

    fn proposal(baseline: i64, deadline: i64) -> Proposal {
        Proposal {
            visibility: Visibility::Private,
            baseline,
            deadline,
            want: Token::qualified("paint", "1").into(),
            give: Token::qualified("brush", "2").into(),
            receivers: PartySet::All,
        }
    }

    #[test]
    fn acceptability_respects_the_window() {
        let p = proposal(1_000, 2_000);
        assert!(!p.is_acceptable(500, 300));
        assert!(p.is_acceptable(800, 300)); // within baseline fudge
        assert!(p.is_acceptable(1_500, 300));
        assert!(p.is_acceptable(2_200, 300)); // within deadline fudge
        assert!(!p.is_acceptable(2_300, 300));
    }

    #[test]
    fn rejectable_outside_the_acceptance_window() {
        let p = proposal(1_000, 2_000);
        assert!(p.is_rejectable());
        assert!(!p.is_acceptable(0, 300));
        assert!(!p.is_acceptable(2_300, 300));

        let mut unqualified = proposal(1_000, 2_000);
        unqualified.give = Token::of_kind("brush").into();
        assert!(!unqualified.is_rejectable());
    }

    #[test]
    fn inverted_window_is_unsatisfiable() {
        let p = proposal(2_000, 1_000);
        assert!(!p.is_satisfiable());
        assert!(!p.is_acceptable(1_500, 300));
    }

    #[test]
    fn unqualified_side_blocks_acceptance() {
        let mut p = proposal(1_000, 2_000);
        p.give = Token::of_kind("brush").into();
        assert!(!p.is_qualified());
        assert!(!p.is_acceptable(1_500, 300));
        assert!(p.is_satisfiable());
    }

    #[test]
    fn visibility_round_trips_as_integer() {
        for v in [Visibility::Private, Visibility::Protected, Visibility::Public] {
            let json = serde_json::to_string(&v).unwrap();
            let back: Visibility = serde_json::from_str(&json).unwrap();
            assert_eq!(back, v);
        }
        assert_eq!(serde_json::to_string(&Visibility::Public).unwrap(), "2");
        assert!(serde_json::from_str::<Visibility>("3").is_err());
    }
}
