use shared::metrics_defs::{MetricDef, MetricType};

pub const AGGREGATION_DURATION: MetricDef = MetricDef {
    name: "aggregation.duration",
    metric_type: MetricType::Histogram,
    description: "Time to answer an aggregation request in seconds. Tagged with status.",
};

pub const AGGREGATION_INCOMPLETE: MetricDef = MetricDef {
    name: "aggregation.incomplete",
    metric_type: MetricType::Counter,
    description: "Aggregations returned with unresolved keys after the wait budget ran out",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of aggregation requests currently being processed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    AGGREGATION_DURATION,
    AGGREGATION_INCOMPLETE,
    REQUESTS_INFLIGHT,
];
