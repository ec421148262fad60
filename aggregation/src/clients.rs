use crate::category::Category;
use crate::errors::{AggregationError, Result};
use async_trait::async_trait;
use batcher::{Resolver, ResolverError};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;
use url::Url;

/// Client shared by the resolvers of every category.
pub fn build_client(http_timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(http_timeout).build()?)
}

/// Resolves batches of one category with `GET {url}/{category}?q=<keys>`.
///
/// The upstream answers with a JSON object mapping each key it knows to its
/// value. Keys it does not know are left out.
pub struct UpstreamResolver<V> {
    client: reqwest::Client,
    endpoint: Url,
    _value: PhantomData<fn() -> V>,
}

impl<V> UpstreamResolver<V> {
    pub fn new(client: reqwest::Client, base_url: &Url, category: Category) -> Result<Self> {
        let mut endpoint = base_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| AggregationError::InvalidUpstreamUrl(base_url.to_string()))?
            .pop_if_empty()
            .push(category.as_str());

        Ok(Self {
            client,
            endpoint,
            _value: PhantomData,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl<V> Resolver<V> for UpstreamResolver<V>
where
    V: DeserializeOwned + Send + 'static,
{
    async fn resolve(&self, keys: &str) -> Result<HashMap<String, V>, ResolverError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("q", keys)])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::UnexpectedStatus(status.as_u16()));
        }

        response
            .json::<HashMap<String, V>>()
            .await
            .map_err(|e| match e.is_timeout() {
                true => ResolverError::Timeout,
                false => ResolverError::Decode(e.to_string()),
            })
    }
}

fn request_error(e: reqwest::Error) -> ResolverError {
    if e.is_timeout() {
        ResolverError::Timeout
    } else {
        ResolverError::RequestFailed(e.to_string())
    }
}
