//! Metrics definitions for the batch executors.

use shared::metrics_defs::{MetricDef, MetricType};

pub const BATCH_FLUSH: MetricDef = MetricDef {
    name: "batch.flush",
    metric_type: MetricType::Counter,
    description: "Number of batches sent to a resolver. Tagged with executor, reason.",
};

pub const BATCH_SIZE: MetricDef = MetricDef {
    name: "batch.size",
    metric_type: MetricType::Histogram,
    description: "Number of keys per flushed batch. Tagged with executor.",
};

pub const RESOLVER_DURATION: MetricDef = MetricDef {
    name: "resolver.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent in the resolver call in seconds. Tagged with executor.",
};

pub const RESOLVER_FAILURE: MetricDef = MetricDef {
    name: "resolver.failure",
    metric_type: MetricType::Counter,
    description: "Number of batches discarded because the resolver failed or returned nothing. Tagged with executor.",
};

pub const BUFFERED_RESULTS: MetricDef = MetricDef {
    name: "batch.buffered_results",
    metric_type: MetricType::Gauge,
    description: "Resolved values waiting to be claimed. Tagged with executor.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    BATCH_FLUSH,
    BATCH_SIZE,
    RESOLVER_DURATION,
    RESOLVER_FAILURE,
    BUFFERED_RESULTS,
];
