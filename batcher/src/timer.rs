use std::future::Future;
use tokio::task::AbortHandle;
use tokio::time::{Duration, sleep};

/// One-shot, cancelable deadline.
///
/// When the deadline passes, `on_fire` is spawned as its own task. The timer
/// task itself only sleeps, so cancelling the timer from inside `on_fire`
/// (which is what a flush does) never aborts the work that is running.
#[derive(Debug, Default)]
pub struct FlushTimer {
    handle: Option<AbortHandle>,
}

impl FlushTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `on_fire` to run once after `duration`.
    ///
    /// Must be called from within a tokio runtime. A timer that is still
    /// armed is cancelled first.
    pub fn arm<F>(&mut self, duration: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let handle = tokio::spawn(async move {
            sleep(duration).await;
            tokio::spawn(on_fire);
        });
        self.handle = Some(handle.abort_handle());
    }

    /// Prevents a pending `on_fire` from running. Returns whether a timer was armed.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for FlushTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
