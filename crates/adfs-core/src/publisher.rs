//! Per-session outbound event stream.
//!
//! Delivery is best effort. Once the session transport is gone every publish
//! is dropped silently; nothing is buffered for later.

use crate::events::{Event, StatusEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub trait EventSink: Send + Sync {
    fn publish(&self, event: Event);
}

pub struct SessionPublisher {
    tx: mpsc::UnboundedSender<Event>,
    closed: AtomicBool,
}

impl SessionPublisher {
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let publisher = Arc::new(Self {
            tx,
            closed: AtomicBool::new(false),
        });
        (publisher, rx)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.tx.is_closed()
    }
}

impl EventSink for SessionPublisher {
    fn publish(&self, event: Event) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if self.tx.send(event).is_err() {
            self.closed.store(true, Ordering::SeqCst);
            debug!("session transport closed; dropping events");
        }
    }
}

/// Stops forwarding once the owning request is cancelled.
#[derive(Clone)]
pub struct GatedSink {
    inner: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl GatedSink {
    pub fn new(inner: Arc<dyn EventSink>, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }
}

impl EventSink for GatedSink {
    fn publish(&self, event: Event) {
        if !self.cancel.is_cancelled() {
            self.inner.publish(event);
        }
    }
}

/// Copies process-wide status events into one session until `cancel` fires.
pub fn forward_status(
    mut rx: broadcast::Receiver<StatusEvent>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(status) => sink.publish(Event::ConnectionStatus(status)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session fell behind on connection status events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConnectionState;

    #[tokio::test]
    async fn publish_after_receiver_drop_is_noop() {
        let (publisher, rx) = SessionPublisher::channel();
        publisher.publish(Event::error("first"));
        drop(rx);
        publisher.publish(Event::error("second"));
        assert!(publisher.is_closed());
    }

    #[tokio::test]
    async fn gated_sink_drops_after_cancel() {
        let (publisher, mut rx) = SessionPublisher::channel();
        let cancel = CancellationToken::new();
        let gated = GatedSink::new(publisher, cancel.clone());
        gated.publish(Event::error("kept"));
        cancel.cancel();
        gated.publish(Event::error("dropped"));
        assert!(matches!(rx.recv().await, Some(Event::Error { message }) if message == "kept"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn forwards_status_in_order() {
        let (tx, _keep) = broadcast::channel(16);
        let (publisher, mut rx) = SessionPublisher::channel();
        let cancel = CancellationToken::new();
        let handle = forward_status(tx.subscribe(), publisher, cancel.clone());
        for state in [ConnectionState::Connecting, ConnectionState::Connected] {
            tx.send(StatusEvent::new("p", state, None)).unwrap();
        }
        let mut seen = Vec::new();
        for _ in 0..2 {
            if let Some(Event::ConnectionStatus(status)) = rx.recv().await {
                seen.push(status.state);
            }
        }
        assert_eq!(seen, vec![ConnectionState::Connecting, ConnectionState::Connected]);
        cancel.cancel();
        handle.await.unwrap();
    }
}
