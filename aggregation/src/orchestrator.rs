use crate::category::Category;
use crate::clients::{UpstreamResolver, build_client};
use crate::config::Config;
use crate::errors::{AggregationError, Result};
use crate::metrics_defs::AGGREGATION_INCOMPLETE;
use crate::types::{AggregationRequest, AggregationResponse};
use batcher::{ArrivalSignal, BatchExecutor, BatchSettings, ResultMap, split_keys};
use serde::de::DeserializeOwned;
use shared::counter;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// How long an aggregation keeps waiting for unresolved keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Wait at most `max_iterations` times `poll_interval`, then return
    /// whatever was resolved.
    Bounded {
        poll_interval: Duration,
        max_iterations: u32,
    },
    /// Wait until every key is resolved. Keys the upstream never answers
    /// keep the request open forever.
    Unbounded { poll_interval: Duration },
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicy::Bounded {
            poll_interval: Duration::from_secs(1),
            max_iterations: 10,
        }
    }
}

impl WaitPolicy {
    fn poll_interval(&self) -> Duration {
        match *self {
            WaitPolicy::Bounded { poll_interval, .. } => poll_interval,
            WaitPolicy::Unbounded { poll_interval } => poll_interval,
        }
    }

    fn is_exhausted(&self, waits: u32) -> bool {
        match *self {
            WaitPolicy::Bounded { max_iterations, .. } => waits >= max_iterations,
            WaitPolicy::Unbounded { .. } => false,
        }
    }
}

/// Fans one aggregation request out to the executor of every requested
/// category and collects the results.
pub struct Orchestrator {
    pricing: BatchExecutor<f64>,
    shipments: BatchExecutor<Vec<String>>,
    tracking: BatchExecutor<String>,
    signal: ArrivalSignal,
    wait_policy: WaitPolicy,
}

impl Orchestrator {
    /// All three executors must have been created with `signal`.
    pub fn new(
        pricing: BatchExecutor<f64>,
        shipments: BatchExecutor<Vec<String>>,
        tracking: BatchExecutor<String>,
        signal: ArrivalSignal,
        wait_policy: WaitPolicy,
    ) -> Self {
        Self {
            pricing,
            shipments,
            tracking,
            signal,
            wait_policy,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_client(config.upstream.http_timeout())?;
        let signal = ArrivalSignal::new();

        let executors = &config.executors;
        let base_url = &config.upstream.url;
        let pricing = upstream_executor(
            Category::Pricing,
            executors.pricing.settings(),
            &signal,
            client.clone(),
            base_url,
        )?;
        let shipments = upstream_executor(
            Category::Shipments,
            executors.shipments.settings(),
            &signal,
            client.clone(),
            base_url,
        )?;
        let tracking = upstream_executor(
            Category::Tracking,
            executors.tracking.settings(),
            &signal,
            client,
            base_url,
        )?;

        Ok(Self::new(
            pricing,
            shipments,
            tracking,
            signal,
            config.wait_policy.policy(),
        ))
    }

    pub async fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResponse> {
        let keys_of = |category| {
            request
                .param(category)
                .map(split_keys)
                .filter(|keys| !keys.is_empty())
        };
        let pricing_keys = keys_of(Category::Pricing);
        let shipments_keys = keys_of(Category::Shipments);
        let tracking_keys = keys_of(Category::Tracking);

        if pricing_keys.is_none() && shipments_keys.is_none() && tracking_keys.is_none() {
            return Err(AggregationError::NoCategories);
        }

        // Subscribe before submitting so no arrival is missed
        let mut listener = self.signal.subscribe();

        let mut pricing = pricing_keys.map(|keys| Claim::new(&self.pricing, keys));
        let mut shipments = shipments_keys.map(|keys| Claim::new(&self.shipments, keys));
        let mut tracking = tracking_keys.map(|keys| Claim::new(&self.tracking, keys));
        tokio::join!(
            Claim::submit(pricing.as_ref()),
            Claim::submit(shipments.as_ref()),
            Claim::submit(tracking.as_ref()),
        );

        let mut waits = 0;
        loop {
            let complete = [
                Claim::grab(pricing.as_mut()),
                Claim::grab(shipments.as_mut()),
                Claim::grab(tracking.as_mut()),
            ]
            .into_iter()
            .all(|complete| complete);

            if complete {
                break;
            }
            if self.wait_policy.is_exhausted(waits) {
                tracing::warn!(waits, "Wait budget exhausted, returning partial aggregation");
                counter!(AGGREGATION_INCOMPLETE).increment(1);
                break;
            }

            listener.wait(self.wait_policy.poll_interval()).await;
            waits += 1;
        }

        let response = AggregationResponse {
            pricing: pricing.map(Claim::finish),
            tracking: tracking.map(Claim::finish),
            shipments: shipments.map(Claim::finish),
        };
        tracing::debug!(waits, complete = response.is_complete(), "Aggregation done");
        Ok(response)
    }
}

/// Keys one aggregation waits for in one executor. Whatever is still
/// unresolved when the claim is finished or dropped is released, so late
/// values are not buffered for a caller that is gone.
struct Claim<V>
where
    V: Clone + Send + 'static,
{
    executor: BatchExecutor<V>,
    keys: Vec<String>,
    result_map: ResultMap<V>,
}

impl<V> Claim<V>
where
    V: Clone + Send + 'static,
{
    fn new(executor: &BatchExecutor<V>, keys: Vec<String>) -> Self {
        Self {
            executor: executor.clone(),
            result_map: executor.create_result_map(keys.iter().cloned()),
            keys,
        }
    }

    async fn submit(claim: Option<&Self>) {
        if let Some(claim) = claim {
            claim.executor.submit(claim.keys.iter().cloned()).await;
        }
    }

    /// Returns whether every key of the claim is resolved.
    fn grab(claim: Option<&mut Self>) -> bool {
        let Some(claim) = claim else {
            return true;
        };
        claim.executor.grab(&mut claim.result_map);
        claim.result_map.is_complete()
    }

    fn finish(mut self) -> ResultMap<V> {
        self.executor.release(&self.result_map);
        std::mem::replace(&mut self.result_map, ResultMap::new(Vec::<String>::new()))
    }
}

impl<V> Drop for Claim<V>
where
    V: Clone + Send + 'static,
{
    fn drop(&mut self) {
        if !self.result_map.is_complete() {
            self.executor.release(&self.result_map);
        }
    }
}

fn upstream_executor<V>(
    category: Category,
    settings: BatchSettings,
    signal: &ArrivalSignal,
    client: reqwest::Client,
    base_url: &Url,
) -> Result<BatchExecutor<V>>
where
    V: DeserializeOwned + Clone + Send + 'static,
{
    let resolver = UpstreamResolver::<V>::new(client, base_url, category)?;
    Ok(BatchExecutor::new(
        category.executor_name(),
        settings,
        signal.clone(),
        Arc::new(resolver),
    )?)
}
