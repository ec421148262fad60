use std::collections::{HashMap, VecDeque};

/// Resolved values waiting to be claimed by callers.
///
/// A key submitted by several independent callers shows up several times in
/// a batch, so one value is kept per waiting caller and every caller can
/// claim its own copy. Values are only stored while some caller still waits
/// for the key, a caller that gives up has to [`release`](Self::release) it.
#[derive(Debug)]
pub struct ResultBuffer<V> {
    entries: HashMap<String, VecDeque<V>>,
    // Callers waiting per key, counting each caller once.
    waiting: HashMap<String, usize>,
}

impl<V> Default for ResultBuffer<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            waiting: HashMap::new(),
        }
    }
}

impl<V> ResultBuffer<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one more caller waiting for `key`.
    pub fn register(&mut self, key: &str) {
        *self.waiting.entry(key.to_string()).or_default() += 1;
    }

    /// Removes and returns one value for `key`, ending the wait of one caller.
    pub fn take(&mut self, key: &str) -> Option<V> {
        let values = self.entries.get_mut(key)?;
        let value = values.pop_front();
        if values.is_empty() {
            self.entries.remove(key);
        }
        if value.is_some() {
            self.unregister(key);
        }
        value
    }

    /// Ends the wait of one caller for `key` without claiming a value.
    /// Values nobody waits for anymore are discarded.
    pub fn release(&mut self, key: &str) {
        let waiting = self.unregister(key);
        if let Some(values) = self.entries.get_mut(key) {
            values.truncate(waiting);
            if values.is_empty() {
                self.entries.remove(key);
            }
        }
    }

    /// Number of values held, counting repeated keys once per value.
    pub fn len(&self) -> usize {
        self.entries.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of callers still waiting, summed over all keys.
    pub fn waiting_len(&self) -> usize {
        self.waiting.values().sum()
    }

    fn unregister(&mut self, key: &str) -> usize {
        let Some(count) = self.waiting.get_mut(key) else {
            return 0;
        };
        *count = count.saturating_sub(1);
        let remaining = *count;
        if remaining == 0 {
            self.waiting.remove(key);
        }
        remaining
    }

    fn stored(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, VecDeque::len)
    }
}

impl<V: Clone> ResultBuffer<V> {
    /// Stores the response values for the keys of `batch`.
    ///
    /// Keys of the batch missing from `response` are dropped, keys of
    /// `response` that were not part of the batch are ignored. A key gets at
    /// most one value per waiting caller. Returns the number of stored values.
    pub fn merge(&mut self, batch: &[String], response: &HashMap<String, V>) -> usize {
        let mut stored = 0;
        for key in batch {
            let Some(value) = response.get(key) else {
                continue;
            };
            let waiting = self.waiting.get(key.as_str()).copied().unwrap_or(0);
            if self.stored(key) >= waiting {
                continue;
            }
            self.entries
                .entry(key.clone())
                .or_default()
                .push_back(value.clone());
            stored += 1;
        }
        stored
    }
}
