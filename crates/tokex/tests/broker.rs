//! End-to-end negotiation scenarios over in-memory channels.

use serde_json::{json, Value};
use tokex_core::{now_millis, Token, Visibility};
use tokex_testkit::{party, proposal, t, tk, BrokerHarness};

fn code(error: tokex_rpc::RpcError) -> i64 {
    error.remote_code().expect("expected a remote error")
}

#[tokio::test]
async fn qualified_exchange_reaches_recipio() {
    let harness = BrokerHarness::new();
    let alice = harness.connect(party("alice"));
    let bob = harness.connect(party("bob"));

    let offer = proposal(Visibility::Private, t("paint", "p1"), t("brush", "b1"));
    let id = alice
        .call(
            "Brokering.propose",
            json!([offer, bob.party.key.to_hex()]),
        )
        .await
        .unwrap();
    let id = id.as_str().expect("proposal id").to_string();

    let push = bob.expect_push("BrokeringPush.propose").await;
    assert_eq!(push[0], json!(id));
    assert_eq!(push[1], json!(alice.party.key.to_hex()));
    assert_eq!(push[2]["visibility"], json!(0));

    bob.call("Brokering.accept", json!([id, now_millis() + 60_000]))
        .await
        .unwrap();
    let push = alice.expect_push("BrokeringPush.accept").await;
    assert_eq!(push[0], json!(id));
    assert_eq!(push[1], json!(bob.party.key.to_hex()));

    alice
        .call("Brokering.confirm", json!([id, bob.party.key.to_hex()]))
        .await
        .unwrap();
    let push = bob.expect_push("BrokeringPush.confirm").await;
    assert_eq!(push[0], json!(id));

    // Exactly one exchange on record, ownership moved both ways.
    let exchanges = alice
        .call("BrokerAccounting.getExchanges", Value::Null)
        .await
        .unwrap();
    assert_eq!(exchanges["items"].as_array().unwrap().len(), 1);
    assert_eq!(
        exchanges["items"][0]["proposer"]["key"],
        json!(alice.party.key.to_hex())
    );

    let ownerships = alice
        .call(
            "BrokerAccounting.getOwnerships",
            json!({"tokenIds": ["p1", "b1"]}),
        )
        .await
        .unwrap();
    let items = ownerships["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    for item in items {
        let expected = if item["tokenId"] == json!("p1") {
            alice.party.key.to_hex()
        } else {
            bob.party.key.to_hex()
        };
        assert_eq!(item["party"]["key"], json!(expected));
    }
}

#[tokio::test]
async fn unqualified_proposal_broadcasts_without_id() {
    let harness = BrokerHarness::new();
    let alice = harness.connect(party("alice"));
    let bob = harness.connect(party("bob"));

    let invitation = proposal(Visibility::Public, tk("paint"), t("brush", "b1"));
    let result = alice
        .call("Brokering.propose", json!([invitation]))
        .await
        .unwrap();
    assert!(result.is_null());

    let push = bob.expect_push("BrokeringPush.propose").await;
    assert!(push[0].is_null());
    assert_eq!(push[1], json!(alice.party.key.to_hex()));
    assert!(alice.take_pushes().is_empty());
}

#[tokio::test]
async fn private_proposal_with_two_receivers_is_refused() {
    let harness = BrokerHarness::new();
    let alice = harness.connect(party("alice"));
    let bob = harness.connect(party("bob"));
    let carol = harness.connect(party("carol"));

    let offer = proposal(Visibility::Private, t("paint", "p1"), t("brush", "b1"));
    let error = alice
        .call(
            "Brokering.propose",
            json!([offer, bob.party.key.to_hex(), carol.party.key.to_hex()]),
        )
        .await
        .unwrap_err();
    assert_eq!(code(error), 7);
    assert!(bob.take_pushes().is_empty());
    assert!(carol.take_pushes().is_empty());
}

#[tokio::test]
async fn protected_fanout_confirm_and_abort_disclose_the_winner() {
    let harness = BrokerHarness::new();
    let alice = harness.connect(party("alice"));
    let bob = harness.connect(party("bob"));
    let carol = harness.connect(party("carol"));

    let offer = proposal(Visibility::Protected, t("paint", "p1"), t("brush", "b1"));
    let id = alice
        .call(
            "Brokering.propose",
            json!([offer, bob.party.key.to_hex(), carol.party.key.to_hex()]),
        )
        .await
        .unwrap();
    let id = id.as_str().unwrap().to_string();

    // Both receivers see the proposal and each other.
    let push = bob.expect_push("BrokeringPush.propose").await;
    assert_eq!(push[3], json!([carol.party.key.to_hex()]));
    let push = carol.expect_push("BrokeringPush.propose").await;
    assert_eq!(push[3], json!([bob.party.key.to_hex()]));

    let deadline = now_millis() + 60_000;
    bob.call("Brokering.accept", json!([id, deadline]))
        .await
        .unwrap();
    carol
        .call("Brokering.accept", json!([id, deadline]))
        .await
        .unwrap();

    alice
        .call("Brokering.confirm", json!([id, bob.party.key.to_hex()]))
        .await
        .unwrap();
    alice
        .call("Brokering.abort", json!([id, carol.party.key.to_hex()]))
        .await
        .unwrap();

    bob.expect_push("BrokeringPush.confirm").await;
    let push = carol.expect_push("BrokeringPush.abort").await;
    assert_eq!(push[0], json!(id));
    assert_eq!(push[1], json!(bob.party.key.to_hex()));
}

#[tokio::test]
async fn negotiation_error_codes_cross_the_wire() {
    let harness = BrokerHarness::new();
    let alice = harness.connect(party("alice"));
    let bob = harness.connect(party("bob"));

    // Unknown proposal.
    let error = bob
        .call(
            "Brokering.accept",
            json!(["00000000000000000000000000000000", now_millis() + 10_000]),
        )
        .await
        .unwrap_err();
    assert_eq!(code(error), 1);

    // Unsatisfiable proposal: wants a token and its own absence.
    let mut offer = proposal(Visibility::Private, t("paint", "p1"), t("brush", "b1"));
    offer.want = tokex_core::TokenExpr::and([
        t("paint", "p1"),
        tokex_core::TokenExpr::not(t("paint", "p1")),
    ]);
    let error = alice
        .call(
            "Brokering.propose",
            json!([offer, bob.party.key.to_hex()]),
        )
        .await
        .unwrap_err();
    assert_eq!(code(error), 3);

    // Rejection makes later acceptance illegal.
    let offer = proposal(Visibility::Private, t("paint", "p1"), t("brush", "b1"));
    let id = alice
        .call(
            "Brokering.propose",
            json!([offer, bob.party.key.to_hex()]),
        )
        .await
        .unwrap();
    let id = id.as_str().unwrap().to_string();
    bob.call("Brokering.reject", json!([id])).await.unwrap();
    alice.expect_push("BrokeringPush.reject").await;
    let error = bob
        .call("Brokering.accept", json!([id, now_millis() + 10_000]))
        .await
        .unwrap_err();
    assert_eq!(code(error), 7);
}

#[tokio::test]
async fn standing_filter_blocks_and_unblocks() {
    let harness = BrokerHarness::new();
    let alice = harness.connect(party("alice"));
    let bob = harness.connect(party("bob"));

    bob.call(
        "BrokerSession.setProposalFilter",
        json!({"blacklist": [alice.party.key.to_hex()]}),
    )
    .await
    .unwrap();
    let filter = bob
        .call("BrokerSession.getProposalFilter", Value::Null)
        .await
        .unwrap();
    assert_eq!(filter["blacklist"], json!([alice.party.key.to_hex()]));

    let offer = proposal(Visibility::Private, t("paint", "p1"), t("brush", "b1"));
    let error = alice
        .call(
            "Brokering.propose",
            json!([offer.clone(), bob.party.key.to_hex()]),
        )
        .await
        .unwrap_err();
    assert_eq!(code(error), 5);

    bob.call("BrokerSession.setProposalFilter", Value::Null)
        .await
        .unwrap();
    alice
        .call("Brokering.propose", json!([offer, bob.party.key.to_hex()]))
        .await
        .unwrap();
}

#[tokio::test]
async fn session_settings_round_trip() {
    let harness = BrokerHarness::new();
    let alice = harness.connect(party("alice"));

    let key = alice
        .call("BrokerSession.getAgentKey", Value::Null)
        .await
        .unwrap();
    assert_eq!(key, json!(alice.party.key.to_hex()));

    assert!(alice
        .call("BrokerSession.getCallback", Value::Null)
        .await
        .unwrap()
        .is_null());
    alice
        .call("BrokerSession.setCallback", json!("https://example.net/hook"))
        .await
        .unwrap();
    assert_eq!(
        alice
            .call("BrokerSession.getCallback", Value::Null)
            .await
            .unwrap(),
        json!("https://example.net/hook")
    );
    alice
        .call("BrokerSession.setCallback", Value::Null)
        .await
        .unwrap();
    assert!(alice
        .call("BrokerSession.getCallback", Value::Null)
        .await
        .unwrap()
        .is_null());
}

#[tokio::test]
async fn out_of_range_pagination_normalizes_over_the_wire() {
    let harness = BrokerHarness::new();
    let alice = harness.connect(party("alice"));
    for i in 0..5 {
        harness.ledger.grant(
            Token::qualified("paint", format!("p{i}")),
            alice.party.clone(),
        );
    }

    let set = alice
        .call(
            "BrokerAccounting.getTokens",
            json!({"offset": 1_000, "limit": 10}),
        )
        .await
        .unwrap();
    assert_eq!(set["offset"], json!(5));
    assert_eq!(set["limit"], json!(0));
    assert_eq!(set["items"], json!([]));
}

#[tokio::test]
async fn tags_attach_to_exchange_subjects() {
    let harness = BrokerHarness::new();
    let alice = harness.connect(party("alice"));

    let id = alice
        .call(
            "BrokerTagging.putTag",
            json!({"subjectId": "p1", "kind": "provenance", "data": {"origin": "mill 4"}}),
        )
        .await
        .unwrap();
    let id = id.as_str().unwrap().to_string();

    let set = alice
        .call("BrokerTagging.getTags", json!({"subjectIds": ["p1"]}))
        .await
        .unwrap();
    assert_eq!(set["items"].as_array().unwrap().len(), 1);
    assert_eq!(set["items"][0]["id"], json!(id));
    assert_eq!(set["items"][0]["data"]["origin"], json!("mill 4"));
}
