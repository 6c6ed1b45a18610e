//! Logical expressions over tokens.
//!
//! A `TokenExpr` states conditional interest in tokens: "this token AND that
//! token", "either of these", "exactly one of those", "anything but this".
//! On the wire an expression is either a bare token object or an object whose
//! `kind` is one of the reserved `__not`/`__and`/`__ior`/`__xor` tags.

use crate::token::Token;
use serde::{Deserialize, Serialize};

/// A logical expression of tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TokenExpr {
    /// The logical inverse of its item.
    #[serde(rename = "__not")]
    Not { item: Box<TokenExpr> },

    /// All items must be chosen.
    #[serde(rename = "__and")]
    And { items: Vec<TokenExpr> },

    /// At least one item must be chosen.
    #[serde(rename = "__ior")]
    Ior { items: Vec<TokenExpr> },

    /// Exactly one item must be chosen.
    #[serde(rename = "__xor")]
    Xor { items: Vec<TokenExpr> },

    /// A single token.
    #[serde(untagged)]
    Token(Token),
}

impl TokenExpr {
    pub fn not(item: TokenExpr) -> Self {
        Self::Not {
            item: Box::new(item),
        }
    }

    pub fn and(items: impl Into<Vec<TokenExpr>>) -> Self {
        Self::And {
            items: items.into(),
        }
    }

    pub fn ior(items: impl Into<Vec<TokenExpr>>) -> Self {
        Self::Ior {
            items: items.into(),
        }
    }

    pub fn xor(items: impl Into<Vec<TokenExpr>>) -> Self {
        Self::Xor {
            items: items.into(),
        }
    }

    /// Whether the expression is *qualified*: every token it requires is
    /// pinned to one concrete entity.
    ///
    /// A lone token is qualified iff it carries an id. An AND is qualified
    /// iff all of its items are. IOR, XOR and NOT leave a choice open, so
    /// they are never qualified.
    pub fn is_qualified(&self) -> bool {
        match self {
            Self::Token(token) => token.is_qualified(),
            Self::And { items } => items.iter().all(TokenExpr::is_qualified),
            _ => false,
        }
    }

    /// The concrete tokens named by a qualified expression, in order.
    ///
    /// Returns `None` if the expression is not qualified and therefore does
    /// not denote a fixed set of entities.
    pub fn qualified_tokens(&self) -> Option<Vec<&Token>> {
        let mut out = Vec::new();
        if self.collect_qualified(&mut out) {
            Some(out)
        } else {
            None
        }
    }

    fn collect_qualified<'a>(&'a self, out: &mut Vec<&'a Token>) -> bool {
        match self {
            Self::Token(token) if token.is_qualified() => {
                out.push(token);
                true
            }
            Self::And { items } => items.iter().all(|item| item.collect_qualified(out)),
            _ => false,
        }
    }

    /// Every token kind mentioned anywhere in the expression.
    pub fn kinds(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_kinds(&mut out);
        out
    }

    fn collect_kinds<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Token(token) => {
                if !out.contains(&token.kind.as_str()) {
                    out.push(&token.kind);
                }
            }
            Self::Not { item } => item.collect_kinds(out),
            Self::And { items } | Self::Ior { items } | Self::Xor { items } => {
                for item in items {
                    item.collect_kinds(out);
                }
            }
        }
    }
}

impl From<Token> for TokenExpr {
    fn from(token: Token) -> Self {
        Self::Token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(kind: &str, id: &str) -> TokenExpr {
        Token::qualified(kind, id).into()
    }

    #[test]
    fn qualification_follows_structure() {
        assert!(t("paint", "1").is_qualified());
        assert!(!TokenExpr::from(Token::of_kind("paint")).is_qualified());

        assert!(TokenExpr::and([t("paint", "1"), t("brush", "2")]).is_qualified());
        assert!(!TokenExpr::and([t("paint", "1"), Token::of_kind("brush").into()]).is_qualified());

        assert!(!TokenExpr::ior([t("paint", "1")]).is_qualified());
        assert!(!TokenExpr::xor([t("paint", "1")]).is_qualified());
        assert!(!TokenExpr::not(t("paint", "1")).is_qualified());
    }

    #[test]
    fn qualified_tokens_flattens_nested_ands() {
        let expr = TokenExpr::and([
            t("paint", "1"),
            TokenExpr::and([t("brush", "2"), t("easel", "3")]),
        ]);
        let tokens = expr.qualified_tokens().unwrap();
        let ids: Vec<_> = tokens.iter().map(|t| t.id.as_deref().unwrap()).collect();
        assert_eq!(ids, ["1", "2", "3"]);

        assert!(TokenExpr::ior([t("paint", "1")]).qualified_tokens().is_none());
    }

    #[test]
    fn wire_shape_uses_reserved_kind_tags() {
        let expr = TokenExpr::and([
            t("paint", "1"),
            TokenExpr::not(Token::of_kind("brush").into()),
        ]);
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "__and",
                "items": [
                    {"id": "1", "kind": "paint"},
                    {"kind": "__not", "item": {"kind": "brush"}},
                ],
            })
        );
        let back: TokenExpr = serde_json::from_value(json).unwrap();
        assert_eq!(back, expr);
    }

    #[test]
    fn bare_token_deserializes_as_leaf() {
        let expr: TokenExpr = serde_json::from_str(r#"{"kind":"paint","id":"9"}"#).unwrap();
        assert_eq!(expr, t("paint", "9"));
    }

    #[test]
    fn kinds_are_deduplicated() {
        let expr = TokenExpr::ior([t("paint", "1"), t("paint", "2"), t("brush", "3")]);
        assert_eq!(expr.kinds(), ["paint", "brush"]);
    }
}
