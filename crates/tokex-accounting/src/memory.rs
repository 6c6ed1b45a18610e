//! In-memory ledger.

use crate::error::{AccountingError, Result};
use crate::traits::{Accounting, Finalizer, Tagging};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokex_core::{
    Exchange, ExchangeQuery, Ownership, OwnershipQuery, Party, PartyKey, Proposal, ResultSet,
    Tag, TagQuery, Token, TokenQuery,
};

#[derive(Default)]
struct State {
    exchanges: Vec<Exchange>,
    /// Known tokens and their current owners, keyed by token id.
    tokens: HashMap<String, (Token, Party)>,
    tags: HashMap<String, Tag>,
    next_tag_id: u64,
}

/// A ledger keeping every record in process memory.
///
/// Finalization and ownership checks run under one lock, so the invariant
/// "a token is given only by its owner" holds under concurrent confirms.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Seed the ledger with a token owned by `owner`. Test and bootstrap
    /// convenience; exchanges are the only way ownership moves afterwards.
    pub fn grant(&self, token: Token, owner: Party) {
        let Some(id) = token.id.clone() else { return };
        self.locked().tokens.insert(id, (token, owner));
    }

    /// The current owner of a token, if the token is known.
    pub fn owner_of(&self, token_id: &str) -> Option<Party> {
        self.locked()
            .tokens
            .get(token_id)
            .map(|(_, owner)| owner.clone())
    }
}

#[async_trait]
impl Accounting for MemoryLedger {
    async fn exchanges(&self, query: ExchangeQuery) -> Result<ResultSet<Exchange>> {
        let state = self.locked();
        let matching: Vec<Exchange> = state
            .exchanges
            .iter()
            .filter(|x| match &query.ids {
                Some(ids) => ids.contains(&x.id),
                None => true,
            })
            .filter(|x| query.completed_after.is_none_or_gt(x.completed_at))
            .filter(|x| query.completed_before.is_none_or_lt(x.completed_at))
            .filter(|x| match &query.proposer_keys {
                Some(keys) => keys.contains(&x.proposer.key),
                None => true,
            })
            .filter(|x| match &query.acceptor_keys {
                Some(keys) => keys.contains(&x.acceptor.key),
                None => true,
            })
            .cloned()
            .collect();
        Ok(ResultSet::paginate(matching, query.page))
    }

    async fn ownerships(&self, query: OwnershipQuery) -> Result<ResultSet<Ownership>> {
        let state = self.locked();
        let mut matching: Vec<Ownership> = state
            .tokens
            .iter()
            .filter(|(id, _)| match &query.token_ids {
                Some(ids) => ids.contains(id),
                None => true,
            })
            .filter(|(_, (_, owner))| match &query.party_keys {
                Some(keys) => keys.contains(&owner.key),
                None => true,
            })
            .map(|(id, (_, owner))| Ownership {
                party: owner.clone(),
                token_id: id.clone(),
            })
            .collect();
        matching.sort_by(|a, b| a.token_id.cmp(&b.token_id));
        Ok(ResultSet::paginate(matching, query.page))
    }

    async fn tokens(&self, query: TokenQuery) -> Result<ResultSet<Token>> {
        let state = self.locked();
        let mut matching: Vec<Token> = state
            .tokens
            .iter()
            .filter(|(id, _)| match &query.ids {
                Some(ids) => ids.contains(id),
                None => true,
            })
            .filter(|(_, (token, _))| match &query.kinds {
                Some(kinds) => kinds.contains(&token.kind),
                None => true,
            })
            .filter(|(_, (_, owner))| match &query.owner {
                Some(key) => owner.key == *key,
                None => true,
            })
            .map(|(_, (token, _))| token.clone())
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(ResultSet::paginate(matching, query.page))
    }
}

trait OptionalBound {
    fn is_none_or_gt(&self, value: i64) -> bool;
    fn is_none_or_lt(&self, value: i64) -> bool;
}

impl OptionalBound for Option<i64> {
    fn is_none_or_gt(&self, value: i64) -> bool {
        self.map_or(true, |bound| value > bound)
    }

    fn is_none_or_lt(&self, value: i64) -> bool {
        self.map_or(true, |bound| value < bound)
    }
}

#[async_trait]
impl Tagging for MemoryLedger {
    async fn tags(&self, query: TagQuery) -> Result<ResultSet<Tag>> {
        let state = self.locked();
        let mut matching: Vec<Tag> = state
            .tags
            .values()
            .filter(|tag| match &query.ids {
                Some(ids) => tag.id.as_ref().is_some_and(|id| ids.contains(id)),
                None => true,
            })
            .filter(|tag| match &query.subject_ids {
                Some(ids) => ids.contains(&tag.subject_id),
                None => true,
            })
            .filter(|tag| match &query.kind {
                Some(kind) => tag.kind == *kind,
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(ResultSet::paginate(matching, query.page))
    }

    async fn put_tag(&self, mut tag: Tag) -> Result<String> {
        let mut state = self.locked();
        let id = match tag.id.clone() {
            Some(id) => id,
            None => {
                state.next_tag_id += 1;
                let id = format!("tag-{}", state.next_tag_id);
                tag.id = Some(id.clone());
                id
            }
        };
        state.tags.insert(id.clone(), tag);
        Ok(id)
    }
}

#[async_trait]
impl Finalizer for MemoryLedger {
    async fn finalize(
        &self,
        proposal: Proposal,
        proposer: Party,
        acceptor: Party,
        now: i64,
    ) -> Result<Exchange> {
        // give: proposer -> acceptor; want: acceptor -> proposer.
        let given = proposal
            .give
            .qualified_tokens()
            .ok_or(AccountingError::NotQualified)?
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        let wanted = proposal
            .want
            .qualified_tokens()
            .ok_or(AccountingError::NotQualified)?
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();

        let mut state = self.locked();

        let transfers = given
            .iter()
            .map(|token| (token, &proposer, &acceptor))
            .chain(wanted.iter().map(|token| (token, &acceptor, &proposer)));
        for (token, giver, _taker) in transfers.clone() {
            let id = token.id.as_deref().unwrap_or_default();
            if let Some((_, owner)) = state.tokens.get(id) {
                if owner.key != giver.key {
                    return Err(AccountingError::TokenConflict {
                        token_id: id.to_string(),
                    });
                }
            }
        }

        let moves: Vec<(Token, Party)> = transfers
            .map(|(token, _giver, taker)| (token.clone(), taker.clone()))
            .collect();
        for (token, taker) in moves {
            let Some(id) = token.id.clone() else { continue };
            state.tokens.insert(id, (token, taker));
        }

        let exchange = Exchange::seal(now, proposal, proposer, acceptor)?;
        state.exchanges.push(exchange.clone());
        Ok(exchange)
    }
}

/// Convenience for tests and wiring: whether the ledger records a token as
/// owned by the given key.
impl MemoryLedger {
    pub fn is_owned_by(&self, token_id: &str, key: &PartyKey) -> bool {
        self.owner_of(token_id)
            .map(|owner| owner.key == *key)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokex_core::{PartySet, TokenExpr, Visibility};

    fn party(byte: u8, name: &str) -> Party {
        Party::new(PartyKey::from_bytes(vec![byte; 32]), name)
    }

    fn proposal(want: TokenExpr, give: TokenExpr) -> Proposal {
        Proposal {
            visibility: Visibility::Private,
            baseline: 0,
            deadline: 10_000,
            want,
            give,
            receivers: PartySet::All,
        }
    }

    #[tokio::test]
    async fn finalize_moves_ownership_both_ways() {
        let ledger = MemoryLedger::new();
        let alice = party(1, "alice");
        let bob = party(2, "bob");

        let exchange = ledger
            .finalize(
                proposal(
                    Token::qualified("paint", "p1").into(),
                    Token::qualified("brush", "b1").into(),
                ),
                alice.clone(),
                bob.clone(),
                1_000,
            )
            .await
            .unwrap();
        assert_eq!(exchange.completed_at, 1_000);

        // Alice gave b1 and received p1.
        assert!(ledger.is_owned_by("b1", &bob.key));
        assert!(ledger.is_owned_by("p1", &alice.key));
    }

    #[tokio::test]
    async fn finalize_refuses_tokens_owned_elsewhere() {
        let ledger = MemoryLedger::new();
        let alice = party(1, "alice");
        let bob = party(2, "bob");
        let carol = party(3, "carol");
        ledger.grant(Token::qualified("brush", "b1"), carol.clone());

        let error = ledger
            .finalize(
                proposal(
                    Token::qualified("paint", "p1").into(),
                    Token::qualified("brush", "b1").into(),
                ),
                alice,
                bob,
                1_000,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            AccountingError::TokenConflict { token_id } if token_id == "b1"
        ));

        // Nothing was recorded.
        assert!(ledger.is_owned_by("b1", &carol.key));
        assert!(ledger.owner_of("p1").is_none());
        let set = ledger.exchanges(ExchangeQuery::default()).await.unwrap();
        assert!(set.items.is_empty());
    }

    #[tokio::test]
    async fn finalize_requires_qualification() {
        let ledger = MemoryLedger::new();
        let error = ledger
            .finalize(
                proposal(
                    Token::of_kind("paint").into(),
                    Token::qualified("brush", "b1").into(),
                ),
                party(1, "alice"),
                party(2, "bob"),
                1_000,
            )
            .await
            .unwrap_err();
        assert!(matches!(error, AccountingError::NotQualified));
    }

    #[tokio::test]
    async fn queries_filter_and_paginate() {
        let ledger = MemoryLedger::new();
        let alice = party(1, "alice");
        let bob = party(2, "bob");
        for i in 0..5 {
            ledger.grant(
                Token::qualified("paint", format!("p{i}")),
                if i % 2 == 0 { alice.clone() } else { bob.clone() },
            );
        }

        let owned_by_alice = ledger
            .tokens(TokenQuery {
                owner: Some(alice.key.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(owned_by_alice.items.len(), 3);

        let far_page = ledger
            .tokens(TokenQuery {
                page: tokex_core::Page {
                    offset: Some(1_000),
                    limit: Some(10),
                },
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(far_page.offset, 5);
        assert_eq!(far_page.limit, 0);
        assert!(far_page.items.is_empty());
    }

    #[tokio::test]
    async fn tags_mint_ids_and_filter_by_subject() {
        let ledger = MemoryLedger::new();
        let id = ledger
            .put_tag(Tag {
                id: None,
                subject_id: "p1".into(),
                kind: "provenance".into(),
                data: serde_json::json!("mill 4"),
            })
            .await
            .unwrap();
        ledger
            .put_tag(Tag {
                id: None,
                subject_id: "p2".into(),
                kind: "provenance".into(),
                data: serde_json::json!("mill 5"),
            })
            .await
            .unwrap();

        let by_subject = ledger
            .tags(TagQuery {
                subject_ids: Some(vec!["p1".into()]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_subject.items.len(), 1);
        assert_eq!(by_subject.items[0].id.as_deref(), Some(id.as_str()));
    }
}
