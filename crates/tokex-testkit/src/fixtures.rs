//! Fixtures for broker tests: parties with real keys, token and proposal
//! builders.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tokex_core::{now_millis, Party, PartyKey, PartySet, Proposal, Token, TokenExpr, Visibility};

/// A party backed by a freshly generated ed25519 keypair.
pub fn party(name: &str) -> Party {
    let signing = SigningKey::generate(&mut OsRng);
    let mut party = Party::new(
        PartyKey::from_bytes(signing.verifying_key().to_bytes().to_vec()),
        name,
    );
    party.keyalg = Some("ed25519".into());
    party
}

/// A qualified token.
pub fn t(kind: &str, id: &str) -> TokenExpr {
    Token::qualified(kind, id).into()
}

/// An unqualified token.
pub fn tk(kind: &str) -> TokenExpr {
    Token::of_kind(kind).into()
}

pub fn not(item: TokenExpr) -> TokenExpr {
    TokenExpr::not(item)
}

pub fn and(items: impl Into<Vec<TokenExpr>>) -> TokenExpr {
    TokenExpr::and(items)
}

pub fn ior(items: impl Into<Vec<TokenExpr>>) -> TokenExpr {
    TokenExpr::ior(items)
}

pub fn xor(items: impl Into<Vec<TokenExpr>>) -> TokenExpr {
    TokenExpr::xor(items)
}

/// A proposal acceptable from now for one minute.
pub fn proposal(visibility: Visibility, want: TokenExpr, give: TokenExpr) -> Proposal {
    let now = now_millis();
    Proposal {
        visibility,
        baseline: now - 1_000,
        deadline: now + 60_000,
        want,
        give,
        receivers: PartySet::All,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parties_have_distinct_ed25519_keys() {
        let a = party("a");
        let b = party("b");
        assert_ne!(a.key, b.key);
        assert_eq!(a.key.as_bytes().len(), 32);
        assert_eq!(a.keyalg.as_deref(), Some("ed25519"));
    }

    #[test]
    fn fixture_proposal_is_acceptable_now() {
        let p = proposal(Visibility::Private, t("paint", "1"), t("brush", "2"));
        assert!(p.is_acceptable(now_millis(), 300));
    }
}
