//! Call transport: correlation, timeouts and the responder capability.
//!
//! A [`CallChannel`] wraps a raw channel with JSON-RPC call semantics.
//! Outgoing calls get a correlation id and a pending-table entry; a spawned
//! drive task reads incoming frames, resolves replies against the table and
//! hands requests to a [`Dispatch`].

use crate::channel::{ChannelEvent, RawChannel};
use crate::error::{codes, ChannelError, ErrorObject, Result, RpcError};
use crate::message::{self, Incoming, MAX_SAFE_ID};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Transport tuning knobs.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long a call waits for its reply.
    pub call_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Where incoming requests on a channel go.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Handle one incoming request. `responder` is present iff the request
    /// owes a reply.
    async fn dispatch(&self, method: String, params: Value, responder: Option<Responder>);
}

/// A dispatcher for pure-client channels: answers calls with method-not-found
/// and drops notifications with a warning.
pub struct RejectAll;

#[async_trait]
impl Dispatch for RejectAll {
    async fn dispatch(&self, method: String, _params: Value, responder: Option<Responder>) {
        match responder {
            Some(responder) => {
                let _ = responder.err(ErrorObject::method_not_found(&method)).await;
            }
            None => tracing::warn!(method, "dropping unexpected notification"),
        }
    }
}

/// The single-use right to answer one incoming call.
///
/// Consuming the responder through [`ok`](Responder::ok) or
/// [`err`](Responder::err) is the only way to reply, so a call can never be
/// answered twice. Dropping it leaves the call unanswered and the caller to
/// its timeout.
pub struct Responder {
    channel: Arc<dyn RawChannel>,
    id: u64,
}

impl Responder {
    /// The correlation id of the call being answered.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Answer the call with a result.
    pub async fn ok(self, result: Value) -> Result<()> {
        let frame = serde_json::to_vec(&message::reply_ok(self.id, result))?;
        self.channel.send(frame).await?;
        Ok(())
    }

    /// Answer the call with an error.
    pub async fn err(self, error: ErrorObject) -> Result<()> {
        let frame = serde_json::to_vec(&message::reply_err(Some(self.id), &error))?;
        self.channel.send(frame).await?;
        Ok(())
    }
}

type PendingTable = Mutex<HashMap<u64, oneshot::Sender<std::result::Result<Value, ErrorObject>>>>;

struct Inner {
    raw: Arc<dyn RawChannel>,
    pending: PendingTable,
    next_id: AtomicU64,
    call_timeout: Duration,
}

/// A raw channel wrapped with call semantics. Cheap to clone.
#[derive(Clone)]
pub struct CallChannel {
    inner: Arc<Inner>,
}

impl CallChannel {
    /// Wrap `raw`, spawning the drive task that feeds `dispatch` and
    /// resolves replies.
    pub fn attach(
        raw: Arc<dyn RawChannel>,
        config: TransportConfig,
        dispatch: Arc<dyn Dispatch>,
    ) -> Self {
        // A small random seed keeps ids from colliding in logs when many
        // transports start at once.
        let seed = rand::thread_rng().gen_range(0..65_536);
        let inner = Arc::new(Inner {
            raw,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(seed),
            call_timeout: config.call_timeout,
        });
        tokio::spawn(drive(Arc::clone(&inner), dispatch));
        Self { inner }
    }

    /// Send a call and wait for its reply.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.inner.mint_id();
        let (tx, rx) = oneshot::channel();
        self.inner.pending_insert(id, tx);

        let frame = serde_json::to_vec(&message::request(id, method, &params))?;
        if let Err(error) = self.inner.raw.send(frame).await {
            self.inner.pending_remove(id);
            return Err(error.into());
        }

        match tokio::time::timeout(self.inner.call_timeout, rx).await {
            Err(_elapsed) => {
                self.inner.pending_remove(id);
                Err(RpcError::Timeout)
            }
            Ok(Err(_dropped)) => Err(RpcError::ChannelClosed),
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => Err(RpcError::Remote(error)),
        }
    }

    /// Send a notification. No reply is owed or awaited.
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let frame = serde_json::to_vec(&message::notification(method, &params))?;
        self.inner.raw.send(frame).await?;
        Ok(())
    }

    /// Close the underlying channel and fail every pending call.
    pub async fn close(&self) -> Result<()> {
        self.inner.raw.close().await?;
        self.inner.fail_pending();
        Ok(())
    }
}

impl Inner {
    fn mint_id(&self) -> u64 {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(if n >= MAX_SAFE_ID { 0 } else { n + 1 })
            })
            .unwrap_or(0)
    }

    fn pending_insert(&self, id: u64, tx: oneshot::Sender<std::result::Result<Value, ErrorObject>>) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(id, tx);
        }
    }

    fn pending_remove(
        &self,
        id: u64,
    ) -> Option<oneshot::Sender<std::result::Result<Value, ErrorObject>>> {
        self.pending.lock().ok().and_then(|mut p| p.remove(&id))
    }

    fn fail_pending(&self) {
        // Dropping the senders makes every waiting call observe
        // ChannelClosed.
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
    }

    async fn send_best_effort(&self, value: Value) {
        match serde_json::to_vec(&value) {
            Ok(frame) => {
                if let Err(error) = self.raw.send(frame).await {
                    if !matches!(error, ChannelError::Closed) {
                        tracing::warn!(%error, "failed to send protocol error reply");
                    }
                }
            }
            Err(error) => tracing::warn!(%error, "failed to encode protocol error reply"),
        }
    }
}

async fn drive(inner: Arc<Inner>, dispatch: Arc<dyn Dispatch>) {
    loop {
        match inner.raw.next().await {
            ChannelEvent::Frame(frame) => handle_frame(&inner, &dispatch, &frame).await,
            ChannelEvent::Closed => {
                inner.fail_pending();
                break;
            }
            ChannelEvent::Errored(detail) => {
                tracing::warn!(detail, "channel errored");
                inner.fail_pending();
                break;
            }
        }
    }
}

async fn handle_frame(inner: &Arc<Inner>, dispatch: &Arc<dyn Dispatch>, frame: &[u8]) {
    let value: Value = match serde_json::from_slice(frame) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(%error, "unparseable frame");
            let reply =
                message::reply_err(None, &ErrorObject::new(codes::PARSE_ERROR, "parse error"));
            inner.send_best_effort(reply).await;
            return;
        }
    };

    match message::classify(value) {
        Err(fault) => {
            tracing::warn!(fault = fault.describe(), "invalid message");
            let reply = message::reply_err(
                None,
                &ErrorObject::new(codes::INVALID_REQUEST, fault.describe()),
            );
            inner.send_best_effort(reply).await;
        }
        Ok(Incoming::Call { id, method, params }) => {
            let responder = Responder {
                channel: Arc::clone(&inner.raw),
                id,
            };
            dispatch.dispatch(method, params, Some(responder)).await;
        }
        Ok(Incoming::Notification { method, params }) => {
            dispatch.dispatch(method, params, None).await;
        }
        Ok(Incoming::Reply { id, outcome }) => match inner.pending_remove(id) {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            // A late reply after its call timed out, or noise. Never a fault.
            None => tracing::warn!(id, "reply for unknown call"),
        },
    }
}
