//! Request coalescing batch executor.
//!
//! Keys submitted by independent callers are queued and sent to the resolver
//! in batches. A batch is flushed as soon as `max_batch_size` keys are queued,
//! or when the flush timer armed by the first queued key expires. Resolved
//! values are buffered until the callers claim them with [`BatchExecutor::grab`]
//! or give up on them with [`BatchExecutor::release`], and every successful
//! batch wakes the callers through the shared [`ArrivalSignal`].
//!
//! ```text
//! EMPTY --submit--> ACCUMULATING --threshold | deadline--> FLUSHING --> EMPTY
//!                    ^        |
//!                    +-submit-+
//! ```

use crate::buffer::ResultBuffer;
use crate::errors::BatcherError;
use crate::metrics_defs::{
    BATCH_FLUSH, BATCH_SIZE, BUFFERED_RESULTS, RESOLVER_DURATION, RESOLVER_FAILURE,
};
use crate::resolver::{Resolver, join_keys};
use crate::result_map::ResultMap;
use crate::signal::ArrivalSignal;
use crate::timer::FlushTimer;
use parking_lot::Mutex;
use shared::{counter, gauge, histogram};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchSettings {
    /// Number of queued keys that triggers an immediate flush.
    pub max_batch_size: usize,
    /// Deadline for flushing a partial batch. `None` flushes on size only.
    pub flush_timeout: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FlushReason {
    Threshold,
    Deadline,
}

impl FlushReason {
    fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Threshold => "threshold",
            FlushReason::Deadline => "deadline",
        }
    }
}

struct ExecutorState<V> {
    pending: Vec<String>,
    buffer: ResultBuffer<V>,
    timer: FlushTimer,
}

struct ExecutorInner<V> {
    name: String,
    settings: BatchSettings,
    state: Mutex<ExecutorState<V>>,
    // Held for the whole resolver call, one batch in flight at a time.
    flush_permit: Semaphore,
    resolver: Arc<dyn Resolver<V>>,
    signal: ArrivalSignal,
}

/// Coalesces lookups for one category of keys. Cloning is cheap and every
/// clone drives the same queue and buffer.
pub struct BatchExecutor<V> {
    inner: Arc<ExecutorInner<V>>,
}

impl<V> Clone for BatchExecutor<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> BatchExecutor<V>
where
    V: Clone + Send + 'static,
{
    pub fn new(
        name: impl Into<String>,
        settings: BatchSettings,
        signal: ArrivalSignal,
        resolver: Arc<dyn Resolver<V>>,
    ) -> Result<Self, BatcherError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BatcherError::BlankName);
        }
        if settings.max_batch_size == 0 {
            return Err(BatcherError::InvalidBatchSize);
        }
        if settings.flush_timeout.is_some_and(|t| t.is_zero()) {
            return Err(BatcherError::InvalidFlushTimeout);
        }

        Ok(Self {
            inner: Arc::new(ExecutorInner {
                name,
                settings,
                state: Mutex::new(ExecutorState {
                    pending: Vec::new(),
                    buffer: ResultBuffer::new(),
                    timer: FlushTimer::new(),
                }),
                flush_permit: Semaphore::new(1),
                resolver,
                signal,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queues `keys` for resolution.
    ///
    /// Every full batch formed by these keys is flushed before this returns.
    /// The flushes run on their own task, so dropping this future leaves them
    /// running and no queued key loses its trigger. A partial batch arms the
    /// flush timer if none is running.
    pub async fn submit<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let full_batches = {
            let mut state = self.inner.state.lock();
            state.pending.extend(keys.into_iter().map(Into::into));

            let full_batches = state.pending.len() / self.inner.settings.max_batch_size;
            if full_batches == 0 && !state.pending.is_empty() && !state.timer.is_armed() {
                self.arm_timer(&mut state.timer);
            }
            full_batches
        };
        if full_batches == 0 {
            return;
        }

        let executor = self.clone();
        let flushes = tokio::spawn(async move {
            for _ in 0..full_batches {
                executor.flush(FlushReason::Threshold).await;
            }
        });
        if let Err(e) = flushes.await {
            tracing::error!(executor = %self.inner.name, error = %e, "Threshold flush task failed");
        }
    }

    /// Moves every resolved value this executor holds for a pending key of
    /// `result_map` into the map. Returns the number of keys resolved.
    pub fn grab(&self, result_map: &mut ResultMap<V>) -> usize {
        let mut state = self.inner.state.lock();
        let grabbed = result_map.fill_from(|key| state.buffer.take(key));
        gauge!(BUFFERED_RESULTS, "executor" => self.inner.name.clone())
            .set(state.buffer.len() as f64);
        drop(state);

        tracing::debug!(
            executor = %self.inner.name,
            grabbed,
            resolved = result_map.resolved_len(),
            total = result_map.len(),
            "Grabbed results"
        );
        grabbed
    }

    /// Creates the map a caller collects its results in.
    ///
    /// Values are only buffered for keys some caller waits for. A caller that
    /// stops waiting before its map is complete hands it to
    /// [`BatchExecutor::release`].
    pub fn create_result_map<I, K>(&self, keys: I) -> ResultMap<V>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let result_map = ResultMap::new(keys);
        let mut state = self.inner.state.lock();
        for key in result_map.pending_keys() {
            state.buffer.register(key);
        }
        result_map
    }

    /// Gives up on the unresolved keys of `result_map`. Their values, buffered
    /// or still to come, are discarded. Call at most once per map.
    pub fn release(&self, result_map: &ResultMap<V>) -> usize {
        let mut state = self.inner.state.lock();
        let mut released = 0;
        for key in result_map.pending_keys() {
            state.buffer.release(key);
            released += 1;
        }
        gauge!(BUFFERED_RESULTS, "executor" => self.inner.name.clone())
            .set(state.buffer.len() as f64);
        let waiting = state.buffer.waiting_len();
        drop(state);

        if released > 0 {
            tracing::debug!(
                executor = %self.inner.name,
                released,
                waiting,
                "Released unresolved keys"
            );
        }
        released
    }

    /// Keys queued but not yet sent to the resolver.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Resolved values not yet claimed by any caller.
    pub fn buffered_len(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    fn arm_timer(&self, timer: &mut FlushTimer) {
        let Some(timeout) = self.inner.settings.flush_timeout else {
            return;
        };

        tracing::debug!(executor = %self.inner.name, ?timeout, "Starting flush timer");
        let executor = Arc::downgrade(&self.inner);
        timer.arm(timeout, async move {
            if let Some(inner) = executor.upgrade() {
                BatchExecutor { inner }.flush(FlushReason::Deadline).await;
            }
        });
    }

    /// Single entry point for sending a batch, used by both the size
    /// threshold and the flush timer.
    async fn flush(&self, reason: FlushReason) {
        let Ok(_permit) = self.inner.flush_permit.acquire().await else {
            return;
        };

        let batch = {
            let mut state = self.inner.state.lock();
            let max_batch_size = self.inner.settings.max_batch_size;

            // Another flush already took the keys that crossed the threshold.
            if reason == FlushReason::Threshold && state.pending.len() < max_batch_size {
                return;
            }

            state.timer.cancel();
            let take = state.pending.len().min(max_batch_size);
            let batch: Vec<String> = state.pending.drain(..take).collect();

            if !state.pending.is_empty() && state.pending.len() < max_batch_size {
                self.arm_timer(&mut state.timer);
            }
            batch
        };

        if batch.is_empty() {
            tracing::debug!(executor = %self.inner.name, "No pending keys, skipping flush");
            return;
        }

        self.resolve_batch(batch, reason).await;
    }

    async fn resolve_batch(&self, batch: Vec<String>, reason: FlushReason) {
        let name = &self.inner.name;
        tracing::info!(
            executor = %name,
            reason = reason.as_str(),
            batch_size = batch.len(),
            "Updating data from remote service"
        );
        counter!(BATCH_FLUSH, "executor" => name.clone(), "reason" => reason.as_str()).increment(1);
        histogram!(BATCH_SIZE, "executor" => name.clone()).record(batch.len() as f64);

        let params = join_keys(&batch);
        let started = Instant::now();
        let result = self.inner.resolver.resolve(&params).await;
        histogram!(RESOLVER_DURATION, "executor" => name.clone())
            .record(started.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) if !response.is_empty() => response,
            Ok(_) => {
                tracing::warn!(
                    executor = %name,
                    batch_size = batch.len(),
                    "Remote service returned no data, discarding batch"
                );
                counter!(RESOLVER_FAILURE, "executor" => name.clone()).increment(1);
                return;
            }
            Err(e) => {
                tracing::error!(
                    executor = %name,
                    batch_size = batch.len(),
                    error = %e,
                    "Cannot get data from remote service"
                );
                counter!(RESOLVER_FAILURE, "executor" => name.clone()).increment(1);
                return;
            }
        };

        let mut state = self.inner.state.lock();
        let stored = state.buffer.merge(&batch, &response);
        gauge!(BUFFERED_RESULTS, "executor" => name.clone()).set(state.buffer.len() as f64);

        tracing::debug!(executor = %name, stored, "Signalling that results arrived");
        self.inner.signal.broadcast();
    }
}
