//! The broker facade.
//!
//! [`Broker`] wires the call router, the negotiation engine and the
//! accounting boundary together and exposes the full method surface:
//! `Brokering.*` for negotiation, `BrokerAccounting.*` and
//! `BrokerTagging.*` for the records, `BrokerSession.*` for per-party
//! settings. Pushes go back over whichever channel the party is attached
//! through, as `BrokeringPush.*` notifications.

use crate::config::BrokerConfig;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokex_accounting::{Accounting, Finalizer, MemoryLedger, Tagging};
use tokex_core::{now_millis, Party, PartyKey, Proposal, ProposalFilter, ProposalId};
use tokex_rpc::{
    CallChannel, CallContext, ErrorObject, FnHandler, RawChannel, Router, RouterError,
};
use tokex_session::{BrokeringError, Negotiation, PushSink};

/// A running broker.
pub struct Broker {
    router: Arc<Router>,
    negotiation: Arc<Negotiation>,
    accounting: Arc<dyn Accounting>,
    tagging: Arc<dyn Tagging>,
}

impl Broker {
    /// Build a broker over the given record keepers.
    pub fn new(
        config: BrokerConfig,
        accounting: Arc<dyn Accounting>,
        tagging: Arc<dyn Tagging>,
        finalizer: Arc<dyn Finalizer>,
    ) -> Result<Arc<Self>, RouterError> {
        let router = Router::new(config.transport.clone());
        let sink = Arc::new(ChannelPush {
            router: Arc::clone(&router),
        });
        let negotiation = Arc::new(Negotiation::new(config.session.clone(), finalizer, sink));
        let callbacks: Arc<Mutex<HashMap<PartyKey, String>>> = Arc::default();
        register_methods(&router, &negotiation, &accounting, &tagging, &callbacks)?;
        Ok(Arc::new(Self {
            router,
            negotiation,
            accounting,
            tagging,
        }))
    }

    /// Build a broker over a fresh in-memory ledger.
    pub fn in_memory(config: BrokerConfig) -> Result<(Arc<Self>, Arc<MemoryLedger>), RouterError> {
        let ledger = Arc::new(MemoryLedger::new());
        let broker = Self::new(
            config,
            Arc::clone(&ledger) as Arc<dyn Accounting>,
            Arc::clone(&ledger) as Arc<dyn Tagging>,
            Arc::clone(&ledger) as Arc<dyn Finalizer>,
        )?;
        Ok((broker, ledger))
    }

    /// Serve a channel as the given party. The party becomes known to the
    /// negotiation engine and reachable for pushes.
    pub fn attach(&self, raw: Arc<dyn RawChannel>, party: Party) -> CallChannel {
        self.negotiation.register_party(party.clone());
        self.router.attach(raw, party.key)
    }

    /// Drop a party's channel. Its sessions and registration survive, so a
    /// reconnect picks up where it left off.
    pub fn detach(&self, key: &PartyKey) -> bool {
        self.router.detach(key)
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn negotiation(&self) -> &Arc<Negotiation> {
        &self.negotiation
    }

    pub fn accounting(&self) -> &Arc<dyn Accounting> {
        &self.accounting
    }

    pub fn tagging(&self) -> &Arc<dyn Tagging> {
        &self.tagging
    }
}

/// Push delivery over the router's connection table. Best effort: a party
/// without a live channel just misses the push.
struct ChannelPush {
    router: Arc<Router>,
}

impl ChannelPush {
    async fn push(&self, to: &PartyKey, method: &str, params: Value) {
        match self.router.connection(to) {
            Some(channel) => {
                if let Err(error) = channel.notify(method, params).await {
                    tracing::warn!(%to, method, %error, "push delivery failed");
                }
            }
            None => tracing::debug!(%to, method, "party not connected; push dropped"),
        }
    }
}

#[async_trait]
impl PushSink for ChannelPush {
    async fn propose(
        &self,
        to: &PartyKey,
        id: Option<ProposalId>,
        proposer: &PartyKey,
        proposal: &Proposal,
        co_receivers: &[PartyKey],
    ) {
        self.push(
            to,
            "BrokeringPush.propose",
            json!([id, proposer, proposal, co_receivers]),
        )
        .await;
    }

    async fn accept(&self, to: &PartyKey, id: ProposalId, acceptor: &PartyKey, deadline: i64) {
        self.push(to, "BrokeringPush.accept", json!([id, acceptor, deadline]))
            .await;
    }

    async fn reject(&self, to: &PartyKey, id: ProposalId, rejector: &PartyKey) {
        self.push(to, "BrokeringPush.reject", json!([id, rejector]))
            .await;
    }

    async fn confirm(&self, to: &PartyKey, id: ProposalId) {
        self.push(to, "BrokeringPush.confirm", json!([id])).await;
    }

    async fn abort(&self, to: &PartyKey, id: ProposalId, confirmed: Option<&PartyKey>) {
        self.push(to, "BrokeringPush.abort", json!([id, confirmed]))
            .await;
    }
}

// ── Handler plumbing ──────────────────────────────────────────────────────

fn app_error(error: &BrokeringError) -> ErrorObject {
    ErrorObject::new(error.code(), error.to_string())
}

fn record_error<E: std::fmt::Display>(error: E) -> ErrorObject {
    tracing::warn!(%error, "record lookup failed");
    ErrorObject::new(0, "request failed")
}

/// The nth element of positional params.
fn arg<T: DeserializeOwned>(params: &Value, index: usize, what: &str) -> Result<T, ErrorObject> {
    let value = params.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|_| ErrorObject::invalid_params(format!("bad or missing {what}")))
}

/// Object-style params; null means an empty query.
fn query_arg<T: DeserializeOwned + Default>(params: Value) -> Result<T, ErrorObject> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params).map_err(|_| ErrorObject::invalid_params("bad query"))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ErrorObject> {
    serde_json::to_value(value).map_err(|error| {
        tracing::error!(%error, "result encoding failed");
        ErrorObject::internal()
    })
}

fn register_methods(
    router: &Arc<Router>,
    negotiation: &Arc<Negotiation>,
    accounting: &Arc<dyn Accounting>,
    tagging: &Arc<dyn Tagging>,
    callbacks: &Arc<Mutex<HashMap<PartyKey, String>>>,
) -> Result<(), RouterError> {
    {
        let negotiation = Arc::clone(negotiation);
        router.add_method(
            "Brokering.propose",
            Arc::new(FnHandler(move |ctx: CallContext, params: Value| {
                let negotiation = Arc::clone(&negotiation);
                async move {
                    let proposal: Proposal = arg(&params, 0, "proposal")?;
                    let mut receivers: Vec<PartyKey> = Vec::new();
                    if let Some(rest) = params.as_array().and_then(|items| items.get(1..)) {
                        for item in rest {
                            receivers.push(
                                serde_json::from_value(item.clone()).map_err(|_| {
                                    ErrorObject::invalid_params("bad receiver key")
                                })?,
                            );
                        }
                    }
                    let id = negotiation
                        .propose(&ctx.peer, proposal, receivers, now_millis())
                        .await
                        .map_err(|e| app_error(&e))?;
                    Ok(json!(id))
                }
            })),
        )?;
    }
    {
        let negotiation = Arc::clone(negotiation);
        router.add_method(
            "Brokering.accept",
            Arc::new(FnHandler(move |ctx: CallContext, params: Value| {
                let negotiation = Arc::clone(&negotiation);
                async move {
                    let id: ProposalId = arg(&params, 0, "proposal id")?;
                    let deadline: i64 = arg(&params, 1, "deadline")?;
                    negotiation
                        .accept(&ctx.peer, id, deadline, now_millis())
                        .await
                        .map_err(|e| app_error(&e))?;
                    Ok(Value::Null)
                }
            })),
        )?;
    }
    {
        let negotiation = Arc::clone(negotiation);
        router.add_method(
            "Brokering.reject",
            Arc::new(FnHandler(move |ctx: CallContext, params: Value| {
                let negotiation = Arc::clone(&negotiation);
                async move {
                    let id: ProposalId = arg(&params, 0, "proposal id")?;
                    negotiation
                        .reject(&ctx.peer, id)
                        .await
                        .map_err(|e| app_error(&e))?;
                    Ok(Value::Null)
                }
            })),
        )?;
    }
    {
        let negotiation = Arc::clone(negotiation);
        router.add_method(
            "Brokering.confirm",
            Arc::new(FnHandler(move |ctx: CallContext, params: Value| {
                let negotiation = Arc::clone(&negotiation);
                async move {
                    let id: ProposalId = arg(&params, 0, "proposal id")?;
                    let acceptor: PartyKey = arg(&params, 1, "acceptor key")?;
                    negotiation
                        .confirm(&ctx.peer, id, &acceptor, now_millis())
                        .await
                        .map_err(|e| app_error(&e))?;
                    Ok(Value::Null)
                }
            })),
        )?;
    }
    {
        let negotiation = Arc::clone(negotiation);
        router.add_method(
            "Brokering.abort",
            Arc::new(FnHandler(move |ctx: CallContext, params: Value| {
                let negotiation = Arc::clone(&negotiation);
                async move {
                    let id: ProposalId = arg(&params, 0, "proposal id")?;
                    let acceptor: PartyKey = arg(&params, 1, "acceptor key")?;
                    negotiation
                        .abort(&ctx.peer, id, &acceptor, now_millis())
                        .await
                        .map_err(|e| app_error(&e))?;
                    Ok(Value::Null)
                }
            })),
        )?;
    }

    {
        let accounting = Arc::clone(accounting);
        router.add_method(
            "BrokerAccounting.getExchanges",
            Arc::new(FnHandler(move |_ctx: CallContext, params: Value| {
                let accounting = Arc::clone(&accounting);
                async move {
                    let set = accounting
                        .exchanges(query_arg(params)?)
                        .await
                        .map_err(record_error)?;
                    to_json(&set)
                }
            })),
        )?;
    }
    {
        let accounting = Arc::clone(accounting);
        router.add_method(
            "BrokerAccounting.getOwnerships",
            Arc::new(FnHandler(move |_ctx: CallContext, params: Value| {
                let accounting = Arc::clone(&accounting);
                async move {
                    let set = accounting
                        .ownerships(query_arg(params)?)
                        .await
                        .map_err(record_error)?;
                    to_json(&set)
                }
            })),
        )?;
    }
    {
        let accounting = Arc::clone(accounting);
        router.add_method(
            "BrokerAccounting.getTokens",
            Arc::new(FnHandler(move |_ctx: CallContext, params: Value| {
                let accounting = Arc::clone(&accounting);
                async move {
                    let set = accounting
                        .tokens(query_arg(params)?)
                        .await
                        .map_err(record_error)?;
                    to_json(&set)
                }
            })),
        )?;
    }

    {
        let tagging = Arc::clone(tagging);
        router.add_method(
            "BrokerTagging.getTags",
            Arc::new(FnHandler(move |_ctx: CallContext, params: Value| {
                let tagging = Arc::clone(&tagging);
                async move {
                    let set = tagging
                        .tags(query_arg(params)?)
                        .await
                        .map_err(record_error)?;
                    to_json(&set)
                }
            })),
        )?;
    }
    {
        let tagging = Arc::clone(tagging);
        router.add_method(
            "BrokerTagging.putTag",
            Arc::new(FnHandler(move |_ctx: CallContext, params: Value| {
                let tagging = Arc::clone(&tagging);
                async move {
                    let tag = serde_json::from_value(params)
                        .map_err(|_| ErrorObject::invalid_params("bad tag"))?;
                    let id = tagging.put_tag(tag).await.map_err(record_error)?;
                    Ok(json!(id))
                }
            })),
        )?;
    }

    router.add_method(
        "BrokerSession.getAgentKey",
        Arc::new(FnHandler(|ctx: CallContext, _params: Value| async move {
            Ok(json!(ctx.peer.to_hex()))
        })),
    )?;
    {
        let callbacks = Arc::clone(callbacks);
        router.add_method(
            "BrokerSession.getCallback",
            Arc::new(FnHandler(move |ctx: CallContext, _params: Value| {
                let callbacks = Arc::clone(&callbacks);
                async move {
                    let callback = locked(&callbacks).get(&ctx.peer).cloned();
                    Ok(json!(callback))
                }
            })),
        )?;
    }
    {
        let callbacks = Arc::clone(callbacks);
        router.add_method(
            "BrokerSession.setCallback",
            Arc::new(FnHandler(move |ctx: CallContext, params: Value| {
                let callbacks = Arc::clone(&callbacks);
                async move {
                    match params {
                        Value::Null => {
                            locked(&callbacks).remove(&ctx.peer);
                        }
                        Value::String(callback) => {
                            locked(&callbacks).insert(ctx.peer.clone(), callback);
                        }
                        _ => return Err(ErrorObject::invalid_params("bad callback")),
                    }
                    Ok(Value::Null)
                }
            })),
        )?;
    }
    {
        let negotiation = Arc::clone(negotiation);
        router.add_method(
            "BrokerSession.getProposalFilter",
            Arc::new(FnHandler(move |ctx: CallContext, _params: Value| {
                let negotiation = Arc::clone(&negotiation);
                async move { Ok(json!(negotiation.filter(&ctx.peer))) }
            })),
        )?;
    }
    {
        let negotiation = Arc::clone(negotiation);
        router.add_method(
            "BrokerSession.setProposalFilter",
            Arc::new(FnHandler(move |ctx: CallContext, params: Value| {
                let negotiation = Arc::clone(&negotiation);
                async move {
                    let filter: Option<ProposalFilter> = if params.is_null() {
                        None
                    } else {
                        Some(
                            serde_json::from_value(params)
                                .map_err(|_| ErrorObject::invalid_params("bad filter"))?,
                        )
                    };
                    negotiation.set_filter(&ctx.peer, filter);
                    Ok(Value::Null)
                }
            })),
        )?;
    }

    Ok(())
}

fn locked<K, V>(map: &Mutex<HashMap<K, V>>) -> std::sync::MutexGuard<'_, HashMap<K, V>> {
    match map.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
