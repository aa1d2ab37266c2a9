use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{trace, warn};

/// Subscriber end of a [`Topic`].
pub type Receiver<T> = broadcast::Receiver<Arc<T>>;

/// Named broadcast topic with bounded capacity.
/// `T` must be `Send + Sync` because we hop across threads.
#[derive(Debug)]
pub struct Topic<T> {
    name: Arc<str>,
    tx: broadcast::Sender<Arc<T>>,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(name: impl Into<Arc<str>>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            name: name.into(),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publishes `msg` and returns how many subscribers received it.
    pub fn publish(&self, msg: T) -> usize {
        match self.tx.send(Arc::new(msg)) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!(topic = %self.name, "Published with no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> Receiver<T> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Drains every message queued on `rx` and returns the newest one.
///
/// Lagged receivers skip ahead to the oldest retained message and keep
/// draining, so the caller always ends with the most recent value.
pub fn drain_latest<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Option<T> {
    let mut latest = None;
    loop {
        match rx.try_recv() {
            Ok(msg) => latest = Some(msg),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Receiver lagged, dropping stale messages");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return latest,
        }
    }
}
