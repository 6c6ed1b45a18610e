//! Parties and party sets.

use crate::types::PartyKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A party that can own and exchange tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// The public key identifying the party. The broker treats key bytes as
    /// opaque; `keyalg` names the algorithm they belong to, if known.
    pub key: PartyKey,

    /// Signature algorithm behind `key`, lowercase, e.g. `"ed25519"` or
    /// `"ecdsa-secp256k1"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyalg: Option<String>,

    /// Common name of the party.
    pub name: String,

    /// Any other party attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Party {
    pub fn new(key: PartyKey, name: impl Into<String>) -> Self {
        Self {
            key,
            keyalg: None,
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }
}

/// A set of parties addressed by a proposal.
///
/// Wire shape: JSON `null` addresses every party in the trading network, a
/// single party object addresses that party, and an array addresses each of
/// its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartySet {
    All,
    One(Party),
    Many(Vec<Party>),
}

impl PartySet {
    /// The keys of the listed parties, or `None` when the set is everyone.
    pub fn keys(&self) -> Option<Vec<&PartyKey>> {
        match self {
            Self::All => None,
            Self::One(party) => Some(vec![&party.key]),
            Self::Many(parties) => Some(parties.iter().map(|p| &p.key).collect()),
        }
    }

    /// Whether the set names the given key, with `All` matching everyone.
    pub fn contains(&self, key: &PartyKey) -> bool {
        match self {
            Self::All => true,
            Self::One(party) => party.key == *key,
            Self::Many(parties) => parties.iter().any(|p| p.key == *key),
        }
    }
}

impl Default for PartySet {
    fn default() -> Self {
        Self::All
    }
}
