//! Tokens: ownable material or immaterial entities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinds beginning with this prefix are reserved for expression operators
/// on the wire and may not be used by tokens.
pub const RESERVED_KIND_PREFIX: &str = "__";

/// An ownable entity, or a class of such entities.
///
/// `kind` names the general category. A token carrying an `id` denotes one
/// concrete, uniquely identified entity and is called *qualified*; a token
/// without an `id` denotes any entity of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Unique identity of one particular entity, if pinned down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The general category of the entity.
    pub kind: String,

    /// Properties distinguishing this entity from others of the same kind.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Token {
    /// A token denoting any entity of the given kind.
    pub fn of_kind(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            properties: BTreeMap::new(),
        }
    }

    /// A qualified token denoting one concrete entity.
    pub fn qualified(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            kind: kind.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Attach a distinguishing property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// A token is qualified iff it carries an `id`.
    pub fn is_qualified(&self) -> bool {
        self.id.is_some()
    }

    /// The (kind, id) identity of a qualified token.
    ///
    /// Two qualified tokens with equal identities denote the same entity,
    /// whatever their properties say.
    pub fn identity(&self) -> Option<(&str, &str)> {
        self.id.as_deref().map(|id| (self.kind.as_str(), id))
    }

    /// Whether the token's kind collides with the reserved operator tags.
    pub fn has_reserved_kind(&self) -> bool {
        self.kind.starts_with(RESERVED_KIND_PREFIX)
    }
}
