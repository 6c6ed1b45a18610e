//! Queries, result sets and pagination.
//!
//! Every lookup against the broker's records is paginated. Pagination never
//! fails: an offset past the end of the matching items normalizes to an
//! empty page reporting where the result set ends.

use crate::types::PartyKey;
use serde::{Deserialize, Serialize};

/// The pagination part of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Skip this many matching items before applying any limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,

    /// Include no more than this many items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// A page of items matching some query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet<T> {
    /// How many matching items precede `items`.
    pub offset: usize,

    /// How many items this page holds.
    pub limit: usize,

    /// The items of this page. May be empty.
    pub items: Vec<T>,
}

impl<T> ResultSet<T> {
    /// Page `matching` according to `page`.
    ///
    /// An offset at or past the end yields `{offset: total, limit: 0,
    /// items: []}` rather than an error.
    pub fn paginate(matching: Vec<T>, page: Page) -> Self {
        let total = matching.len();
        let offset = page.offset.unwrap_or(0).min(total);
        let mut items: Vec<T> = matching.into_iter().skip(offset).collect();
        if let Some(limit) = page.limit {
            items.truncate(limit);
        }
        Self {
            offset,
            limit: items.len(),
            items,
        }
    }
}

/// Selects completed exchanges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeQuery {
    #[serde(flatten)]
    pub page: Page,

    /// Only exchanges with one of these ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<crate::types::ExchangeId>>,

    /// Only exchanges completed after this moment, unix ms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_after: Option<i64>,

    /// Only exchanges completed before this moment, unix ms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_before: Option<i64>,

    /// Only exchanges proposed by one of these parties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposer_keys: Option<Vec<PartyKey>>,

    /// Only exchanges accepted by one of these parties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceptor_keys: Option<Vec<PartyKey>>,
}

/// Selects token ownership records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipQuery {
    #[serde(flatten)]
    pub page: Page,

    /// Only ownerships of tokens with one of these ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_ids: Option<Vec<String>>,

    /// Only ownerships held by one of these parties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_keys: Option<Vec<PartyKey>>,
}

/// Selects known tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenQuery {
    #[serde(flatten)]
    pub page: Page,

    /// Only tokens with one of these ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,

    /// Only tokens of one of these kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<String>>,

    /// Only tokens owned by this party.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<PartyKey>,
}

/// Selects tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagQuery {
    #[serde(flatten)]
    pub page: Page,

    /// Only tags with one of these ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,

    /// Only tags attached to one of these subjects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_ids: Option<Vec<String>>,

    /// Only tags of this kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_basics() {
        let page = Page {
            offset: Some(1),
            limit: Some(2),
        };
        let set = ResultSet::paginate(vec![10, 20, 30, 40, 50], page);
        assert_eq!(set.offset, 1);
        assert_eq!(set.limit, 2);
        assert_eq!(set.items, [20, 30]);
    }

    #[test]
    fn out_of_range_offset_normalizes() {
        let page = Page {
            offset: Some(1_000),
            limit: Some(10),
        };
        let set = ResultSet::paginate(vec![1, 2, 3, 4, 5], page);
        assert_eq!(set.offset, 5);
        assert_eq!(set.limit, 0);
        assert!(set.items.is_empty());
    }

    #[test]
    fn missing_page_fields_take_everything() {
        let set = ResultSet::paginate(vec![1, 2, 3], Page::default());
        assert_eq!(set.offset, 0);
        assert_eq!(set.limit, 3);
        assert_eq!(set.items, [1, 2, 3]);
    }

    #[test]
    fn limit_past_the_end_reports_actual_count() {
        let page = Page {
            offset: Some(4),
            limit: Some(10),
        };
        let set = ResultSet::paginate(vec![1, 2, 3, 4, 5], page);
        assert_eq!(set.offset, 4);
        assert_eq!(set.limit, 1);
        assert_eq!(set.items, [5]);
    }

    #[test]
    fn query_wire_shape_flattens_pagination() {
        let query = TagQuery {
            page: Page {
                offset: Some(2),
                limit: None,
            },
            kind: Some("provenance".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["offset"], 2);
        assert_eq!(json["kind"], "provenance");
        let back: TagQuery = serde_json::from_value(json).unwrap();
        assert_eq!(back, query);
    }
}
