pub mod category;
pub mod clients;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod orchestrator;
pub mod service;
#[cfg(test)]
mod testutils;
pub mod types;

pub use errors::{AggregationError, Result};

use orchestrator::Orchestrator;
use service::AggregationService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub async fn run(config: config::Config) -> Result<()> {
    config.validate()?;

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    let ready = Arc::new(AtomicBool::new(false));

    let aggregation_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        AggregationService::new(orchestrator),
    );

    let ready_check = ready.clone();
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new(move || ready_check.load(Ordering::Relaxed)),
    );

    ready.store(true, Ordering::Relaxed);
    tracing::info!(upstream = %config.upstream.url, "Starting aggregation service");

    tokio::try_join!(aggregation_task, admin_task)?;
    Ok(())
}
