use crate::errors::ResolverError;
use async_trait::async_trait;
use indexmap::IndexSet;
use std::collections::HashMap;
use std::future::Future;

pub const PARAMS_SEPARATOR: &str = ",";

/// Resolves one batch of keys against a remote lookup service.
///
/// `keys` is the batch encoded with [`join_keys`]. The returned map may omit
/// keys the remote side could not resolve, and may contain keys that were
/// never asked for; those are ignored by the executor.
#[async_trait]
pub trait Resolver<V>: Send + Sync {
    async fn resolve(&self, keys: &str) -> Result<HashMap<String, V>, ResolverError>;
}

/// Adapts an async closure into a [`Resolver`].
pub struct ResolverFn<F> {
    f: F,
}

pub fn resolver_fn<F>(f: F) -> ResolverFn<F> {
    ResolverFn { f }
}

#[async_trait]
impl<V, F, Fut> Resolver<V> for ResolverFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HashMap<String, V>, ResolverError>> + Send + 'static,
    V: Send + 'static,
{
    async fn resolve(&self, keys: &str) -> Result<HashMap<String, V>, ResolverError> {
        (self.f)(keys.to_string()).await
    }
}

/// Encodes a batch in submission order.
pub fn join_keys(keys: &[String]) -> String {
    keys.join(PARAMS_SEPARATOR)
}

/// Splits a comma separated parameter list into keys.
///
/// Whitespace around keys is trimmed, empty pieces are skipped and repeated
/// keys are collapsed, keeping the position of their first occurrence.
pub fn split_keys(params: &str) -> Vec<String> {
    let mut keys = IndexSet::new();
    for key in params.split(PARAMS_SEPARATOR) {
        let key = key.trim();
        if !key.is_empty() {
            keys.insert(key.to_string());
        }
    }
    keys.into_iter().collect()
}
