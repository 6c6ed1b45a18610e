//! Proptest strategies for token expressions.

use proptest::prelude::*;
use tokex_core::{Token, TokenExpr};

/// A qualified token drawn from a small universe, so generated expressions
/// share variables often enough to be interesting.
pub fn qualified_token() -> impl Strategy<Value = Token> {
    ("[a-c]", 0..6u8).prop_map(|(kind, id)| Token::qualified(kind, id.to_string()))
}

/// A token that may or may not carry an id.
pub fn any_token() -> impl Strategy<Value = Token> {
    prop_oneof![
        qualified_token(),
        "[a-c]".prop_map(Token::of_kind),
    ]
}

/// An arbitrary token expression of bounded depth and width.
pub fn token_expr() -> impl Strategy<Value = TokenExpr> {
    expr_over(any_token().prop_map(TokenExpr::from))
}

/// An arbitrary expression whose leaves are all qualified.
pub fn qualified_leaf_expr() -> impl Strategy<Value = TokenExpr> {
    expr_over(qualified_token().prop_map(TokenExpr::from))
}

fn expr_over(leaf: impl Strategy<Value = TokenExpr> + 'static) -> impl Strategy<Value = TokenExpr> {
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(TokenExpr::not),
            prop::collection::vec(inner.clone(), 0..4).prop_map(TokenExpr::and),
            prop::collection::vec(inner.clone(), 0..4).prop_map(TokenExpr::ior),
            prop::collection::vec(inner, 0..4).prop_map(TokenExpr::xor),
        ]
    })
}
