//! Raw message channels.
//!
//! A raw channel delivers whole frames, in order, reliably, until it closes
//! or faults. Framing and delivery are the implementation's concern; over a
//! real network this would be a WebSocket or similar. The in-memory duplex
//! here backs tests and in-process wiring.

use crate::error::ChannelError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

/// What a channel yields next.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A whole incoming frame.
    Frame(Vec<u8>),
    /// The channel closed in an orderly fashion. Terminal.
    Closed,
    /// The channel failed. Terminal.
    Errored(String),
}

/// An ordered, reliable, message-oriented channel.
#[async_trait]
pub trait RawChannel: Send + Sync {
    /// Send one frame. Fails if the channel is closed.
    async fn send(&self, frame: Vec<u8>) -> Result<(), ChannelError>;

    /// Wait for the next event. After a terminal event, every later call
    /// yields `Closed`.
    async fn next(&self) -> ChannelEvent;

    /// Close the channel. Fails with `AlreadyClosed` if called twice.
    async fn close(&self) -> Result<(), ChannelError>;
}

/// One end of an in-memory duplex channel.
pub struct MemoryChannel {
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    /// Shared by both ends; flipping it ends the conversation for both.
    shutdown: Arc<watch::Sender<bool>>,
}

/// A connected pair of in-memory channel ends.
///
/// Frames sent on one end arrive on the other. Closing either end closes
/// the conversation for both; undelivered frames are discarded.
pub fn memory_duplex(capacity: usize) -> (Arc<MemoryChannel>, Arc<MemoryChannel>) {
    let (a_tx, b_rx) = mpsc::channel(capacity);
    let (b_tx, a_rx) = mpsc::channel(capacity);
    let (shutdown, _) = watch::channel(false);
    let shutdown = Arc::new(shutdown);
    let a = Arc::new(MemoryChannel {
        tx: Mutex::new(Some(a_tx)),
        rx: Mutex::new(a_rx),
        shutdown: Arc::clone(&shutdown),
    });
    let b = Arc::new(MemoryChannel {
        tx: Mutex::new(Some(b_tx)),
        rx: Mutex::new(b_rx),
        shutdown,
    });
    (a, b)
}

#[async_trait]
impl RawChannel for MemoryChannel {
    async fn send(&self, frame: Vec<u8>) -> Result<(), ChannelError> {
        if *self.shutdown.borrow() {
            return Err(ChannelError::Closed);
        }
        // Clone the sender out of the lock before awaiting the send.
        let tx = self
            .tx
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(ChannelError::Closed)?;
        tx.send(frame).await.map_err(|_| ChannelError::Closed)
    }

    async fn next(&self) -> ChannelEvent {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return ChannelEvent::Closed;
        }
        let mut rx = self.rx.lock().await;
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(frame) => ChannelEvent::Frame(frame),
                None => ChannelEvent::Closed,
            },
            _ = shutdown.changed() => ChannelEvent::Closed,
        }
    }

    /// Never touches the receive side, so it completes even while a reader
    /// is parked in [`next`](RawChannel::next); the shutdown flag wakes that
    /// reader instead.
    async fn close(&self) -> Result<(), ChannelError> {
        if self.tx.lock().await.take().is_none() {
            return Err(ChannelError::AlreadyClosed);
        }
        self.shutdown.send_replace(true);
        Ok(())
    }
}
