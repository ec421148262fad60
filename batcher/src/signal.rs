use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, timeout};

/// Broadcast notification that new results are available in some executor.
///
/// One signal is created per aggregation flow and handed to every executor
/// of that flow. Internally it is a generation counter: each listener
/// remembers the last generation it has seen, so a broadcast that happens
/// between a caller checking its results and starting to wait is not lost.
#[derive(Clone, Debug)]
pub struct ArrivalSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for ArrivalSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrivalSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Creates a listener that observes broadcasts issued after this call.
    pub fn subscribe(&self) -> ArrivalListener {
        ArrivalListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Wakes every listener. Callers publish their results before calling this.
    pub fn broadcast(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }
}

#[derive(Debug)]
pub struct ArrivalListener {
    rx: watch::Receiver<u64>,
}

impl ArrivalListener {
    /// Waits up to `max_wait` for a broadcast this listener has not seen yet.
    ///
    /// Returns `true` if one arrived. Waking up does not guarantee that the
    /// caller's own keys were resolved, callers re-check after every wait.
    pub async fn wait(&mut self, max_wait: Duration) -> bool {
        matches!(timeout(max_wait, self.rx.changed()).await, Ok(Ok(())))
    }
}
