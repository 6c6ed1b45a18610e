//! Call router: method table, channel sources and dispatch isolation.
//!
//! A [`Router`] owns a table of named method handlers and a set of channel
//! sources. Each channel accepted from a source is wrapped in a
//! [`CallChannel`] and its incoming calls are dispatched against the method
//! table, each on its own task, so one slow or faulting handler never stalls
//! the channel or its neighbors.

use crate::channel::RawChannel;
use crate::error::{ErrorObject, RouterError};
use crate::transport::{CallChannel, Dispatch, Responder, TransportConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokex_core::PartyKey;

/// Per-call context handed to every handler.
///
/// Carries the identity bound to the channel the call arrived on. How that
/// identity was established is the embedder's concern.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub peer: PartyKey,
}

/// A named method implementation.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: CallContext, params: Value) -> Result<Value, ErrorObject>;
}

/// Adapts an async closure into a [`Handler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(CallContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ErrorObject>> + Send,
{
    async fn handle(&self, ctx: CallContext, params: Value) -> Result<Value, ErrorObject> {
        (self.0)(ctx, params).await
    }
}

/// Produces authenticated channels for the router to serve.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// Stable identity of the source, for registration bookkeeping.
    fn id(&self) -> String;

    /// Wait for the next channel, already bound to a party identity.
    /// `None` means the source is exhausted.
    async fn accept(&self) -> Option<(Arc<dyn RawChannel>, PartyKey)>;
}

struct SourceEntry {
    loop_task: JoinHandle<()>,
}

/// The call router.
pub struct Router {
    config: TransportConfig,
    methods: Mutex<HashMap<String, Arc<dyn Handler>>>,
    sources: Mutex<HashMap<String, SourceEntry>>,
    connections: Mutex<HashMap<PartyKey, CallChannel>>,
}

impl Router {
    pub fn new(config: TransportConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            methods: Mutex::new(HashMap::new()),
            sources: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
        })
    }

    /// Register a handler under a method name.
    pub fn add_method(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RouterError> {
        let name = name.into();
        let mut methods = lock(&self.methods);
        if methods.contains_key(&name) {
            return Err(RouterError::DuplicateMethod(name));
        }
        methods.insert(name, handler);
        Ok(())
    }

    /// Remove a method. Returns whether it was registered.
    pub fn remove_method(&self, name: &str) -> bool {
        lock(&self.methods).remove(name).is_some()
    }

    /// Register a channel source and start serving the channels it yields.
    pub fn add_source(
        self: &Arc<Self>,
        source: Arc<dyn ChannelSource>,
    ) -> Result<(), RouterError> {
        let id = source.id();
        let mut sources = lock(&self.sources);
        if sources.contains_key(&id) {
            return Err(RouterError::DuplicateSource(id));
        }
        let router = Arc::clone(self);
        let loop_task = tokio::spawn(async move {
            while let Some((raw, peer)) = source.accept().await {
                router.attach(raw, peer);
            }
        });
        sources.insert(id, SourceEntry { loop_task });
        Ok(())
    }

    /// Remove a source, stopping its accept loop. Channels it already
    /// yielded stay attached. Returns whether the source was registered.
    pub fn remove_source(&self, id: &str) -> bool {
        match lock(&self.sources).remove(id) {
            Some(entry) => {
                entry.loop_task.abort();
                true
            }
            None => false,
        }
    }

    /// Serve one channel directly, bound to the given party identity.
    pub fn attach(self: &Arc<Self>, raw: Arc<dyn RawChannel>, peer: PartyKey) -> CallChannel {
        let dispatch = Arc::new(RouterDispatch {
            router: Arc::clone(self),
            peer: peer.clone(),
        });
        let channel = CallChannel::attach(raw, self.config.clone(), dispatch);
        lock(&self.connections).insert(peer, channel.clone());
        channel
    }

    /// The live channel of a connected party, if any.
    pub fn connection(&self, peer: &PartyKey) -> Option<CallChannel> {
        lock(&self.connections).get(peer).cloned()
    }

    /// Every currently attached (party, channel) pair.
    pub fn connections(&self) -> Vec<(PartyKey, CallChannel)> {
        lock(&self.connections)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Drop a party's channel from the connection table.
    pub fn detach(&self, peer: &PartyKey) -> bool {
        lock(&self.connections).remove(peer).is_some()
    }

    fn method(&self, name: &str) -> Option<Arc<dyn Handler>> {
        lock(&self.methods).get(name).cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // Handler state never crosses this lock, so poisoning carries nothing
    // worth preserving.
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

struct RouterDispatch {
    router: Arc<Router>,
    peer: PartyKey,
}

#[async_trait]
impl Dispatch for RouterDispatch {
    async fn dispatch(&self, method: String, params: Value, responder: Option<Responder>) {
        let Some(handler) = self.router.method(&method) else {
            match responder {
                Some(responder) => {
                    let _ = responder.err(ErrorObject::method_not_found(&method)).await;
                }
                None => tracing::warn!(method, "notification for unknown method"),
            }
            return;
        };

        let ctx = CallContext {
            peer: self.peer.clone(),
        };
        tokio::spawn(async move {
            // The inner spawn fences off handler panics from the channel.
            let outcome =
                tokio::spawn(async move { handler.handle(ctx, params).await }).await;
            match (outcome, responder) {
                (Ok(Ok(result)), Some(responder)) => {
                    let _ = responder.ok(result).await;
                }
                (Ok(Err(error)), Some(responder)) => {
                    let _ = responder.err(error).await;
                }
                (Ok(_), None) => {}
                (Err(join_error), responder) => {
                    tracing::error!(method, %join_error, "handler panicked");
                    if let Some(responder) = responder {
                        let _ = responder.err(ErrorObject::internal()).await;
                    }
                }
            }
        });
    }
}
