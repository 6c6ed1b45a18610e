//! Tags: arbitrary data attached to exchanges or tokens.

use serde::{Deserialize, Serialize};

/// Arbitrary data associated with some other broker data subject.
///
/// `subject_id` may identify an [`Exchange`](crate::Exchange) or a token;
/// which one is not recorded in the tag and must be known from context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Unique identity of the tag, assigned on insertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Identity of the tagged object.
    pub subject_id: String,

    /// Arbitrary string classifying the tag contents.
    pub kind: String,

    /// Arbitrary metadata associated with the subject.
    pub data: serde_json::Value,
}
