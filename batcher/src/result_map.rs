use indexmap::IndexMap;
use serde::Serialize;

/// Per-request view of the keys a caller is waiting for.
///
/// Every key starts unresolved (`None`). A key is resolved at most once and
/// never reverts, so a later batch carrying the same key cannot overwrite it.
/// Serializes as a JSON object in request order, with `null` for keys that
/// are still unresolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultMap<V> {
    entries: IndexMap<String, Option<V>>,
}

impl<V> ResultMap<V> {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            entries: keys.into_iter().map(|key| (key.into(), None)).collect(),
        }
    }

    /// Resolves every pending key for which `claim` yields a value.
    /// Returns the number of keys resolved by this call.
    pub fn fill_from<F>(&mut self, mut claim: F) -> usize
    where
        F: FnMut(&str) -> Option<V>,
    {
        let mut resolved = 0;
        for (key, slot) in self.entries.iter_mut().filter(|(_, v)| v.is_none()) {
            if let Some(value) = claim(key.as_str()) {
                *slot = Some(value);
                resolved += 1;
            }
        }
        resolved
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key).and_then(Option::as_ref)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_complete(&self) -> bool {
        self.entries.values().all(Option::is_some)
    }

    pub fn pending_keys(&self) -> impl Iterator<Item = &String> {
        self.entries
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k)
    }

    pub fn resolved_len(&self) -> usize {
        self.entries.values().filter(|v| v.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
