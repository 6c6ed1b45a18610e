//! A wired broker with in-memory channels for end-to-end tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokex::{Broker, BrokerConfig};
use tokex_accounting::MemoryLedger;
use tokex_core::Party;
use tokex_rpc::{
    memory_duplex, CallChannel, Dispatch, ErrorObject, Responder, RpcError, TransportConfig,
};

/// A broker over a fresh in-memory ledger, ready to accept consumers.
pub struct BrokerHarness {
    pub broker: Arc<Broker>,
    pub ledger: Arc<MemoryLedger>,
    transport: TransportConfig,
}

impl BrokerHarness {
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    pub fn with_config(config: BrokerConfig) -> Self {
        let transport = config.transport.clone();
        let (broker, ledger) =
            Broker::in_memory(config).expect("broker method registration cannot collide");
        Self {
            broker,
            ledger,
            transport,
        }
    }

    /// Connect a consumer over a fresh in-memory duplex.
    pub fn connect(&self, party: Party) -> Consumer {
        let (server_end, client_end) = memory_duplex(64);
        self.broker.attach(server_end, party.clone());
        let pushes: Arc<Mutex<Vec<(String, Value)>>> = Arc::default();
        let channel = CallChannel::attach(
            client_end,
            self.transport.clone(),
            Arc::new(PushRecorder {
                pushes: Arc::clone(&pushes),
            }),
        );
        Consumer {
            party,
            channel,
            pushes,
        }
    }
}

impl Default for BrokerHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected consumer: its call channel plus every push it received.
pub struct Consumer {
    pub party: Party,
    pub channel: CallChannel,
    pushes: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Consumer {
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.channel.call(method, params).await
    }

    /// Drain the pushes received so far.
    pub fn take_pushes(&self) -> Vec<(String, Value)> {
        match self.pushes.lock() {
            Ok(mut pushes) => pushes.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }

    /// Wait until a push with the given method arrives, then remove and
    /// return its params. Panics after a second of silence.
    pub async fn expect_push(&self, method: &str) -> Value {
        for _ in 0..200 {
            {
                let mut pushes = match self.pushes.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Some(index) = pushes.iter().position(|(m, _)| m == method) {
                    return pushes.remove(index).1;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no {method} push arrived");
    }
}

struct PushRecorder {
    pushes: Arc<Mutex<Vec<(String, Value)>>>,
}

#[async_trait]
impl Dispatch for PushRecorder {
    async fn dispatch(&self, method: String, params: Value, responder: Option<Responder>) {
        match responder {
            // Consumers only expect push notifications.
            Some(responder) => {
                let _ = responder.err(ErrorObject::method_not_found(&method)).await;
            }
            None => {
                if let Ok(mut pushes) = self.pushes.lock() {
                    pushes.push((method, params));
                }
            }
        }
    }
}
