//! Actor bus. Wraps `tokio::sync::broadcast` so actors only see
//! `BusSender` / `BusReceiver`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

use puttlink::{ActorState, ActorStatus, AlertLevel, AlertMessage, PuttlinkMessage};

pub type BusTx = broadcast::Sender<PuttlinkMessage>;

/// `BusReceiver::poll()` failure: bus closed or shutdown requested.
#[derive(Debug)]
pub enum PollError {
    Shutdown,
}

// ---------------------------------------------------------------------------
// BusSender
// ---------------------------------------------------------------------------

/// Cloneable sender that stamps `source` with the owning actor's id.
#[derive(Clone)]
pub struct BusSender {
    actor_id: String,
    inner: BusTx,
    shutdown: Arc<AtomicBool>,
}

impl BusSender {
    pub fn new(actor_id: String, inner: BusTx, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            actor_id,
            inner,
            shutdown,
        }
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn raw_sender(&self) -> &BusTx {
        &self.inner
    }

    pub fn send(&self, mut msg: PuttlinkMessage) {
        msg.source = self.actor_id.clone();
        let _ = self.inner.send(msg);
    }

    pub fn status(&self, status: ActorStatus, telemetry: HashMap<String, String>) {
        self.send(PuttlinkMessage::new(ActorState::new(status, telemetry)));
    }

    pub fn alert(&self, level: AlertLevel, message: impl Into<String>) {
        self.send(PuttlinkMessage::new(AlertMessage {
            level,
            message: message.into(),
        }));
    }

    /// New receiver on this bus sharing this sender's shutdown flag.
    pub fn subscribe(&self) -> BusReceiver {
        BusReceiver {
            inner: self.inner.subscribe(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

// ---------------------------------------------------------------------------
// BusReceiver
// ---------------------------------------------------------------------------

pub struct BusReceiver {
    inner: broadcast::Receiver<PuttlinkMessage>,
    shutdown: Arc<AtomicBool>,
}

impl BusReceiver {
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Non-blocking: next message, `Ok(None)` when empty, or
    /// `Err(PollError::Shutdown)` once the bus closes or the flag is set.
    pub fn poll(&mut self) -> Result<Option<PuttlinkMessage>, PollError> {
        if self.is_shutdown() {
            return Err(PollError::Shutdown);
        }
        loop {
            match self.inner.try_recv() {
                Ok(msg) => return Ok(Some(msg)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(PollError::Shutdown),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("bus: lagged, dropped {n} events");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puttlink::PuttlinkEvent;

    #[test]
    fn sender_stamps_source() {
        let (tx, _) = broadcast::channel(8);
        let flag = Arc::new(AtomicBool::new(false));
        let sender = BusSender::new("mock_display.0".into(), tx, Arc::clone(&flag));
        let mut rx = sender.subscribe();
        sender.alert(AlertLevel::Warn, "hello");
        let msg = rx.poll().unwrap().unwrap();
        assert_eq!(msg.source, "mock_display.0");
        assert!(matches!(msg.event, PuttlinkEvent::Alert(_)));
        assert!(rx.poll().unwrap().is_none());

        flag.store(true, Ordering::Relaxed);
        assert!(matches!(rx.poll(), Err(PollError::Shutdown)));
    }
}
