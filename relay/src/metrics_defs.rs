//! Metrics definitions for the relay.

use shared::metrics_defs::{MetricDef, MetricType};

pub const RUNS: MetricDef = MetricDef {
    name: "relay.run",
    metric_type: MetricType::Counter,
    description: "Number of relay runs. Tagged with outcome and the failing step.",
};

pub const STEP_DURATION: MetricDef = MetricDef {
    name: "relay.step.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent in a pipeline step in seconds. Tagged with step.",
};

pub const EVENTS_FETCHED: MetricDef = MetricDef {
    name: "relay.events.fetched",
    metric_type: MetricType::Histogram,
    description: "Number of events returned by the event store",
};

pub const ANOMALIES: MetricDef = MetricDef {
    name: "relay.anomaly",
    metric_type: MetricType::Counter,
    description: "Number of batches that did not collapse to a single fact",
};

pub const FACTS_SUBMITTED: MetricDef = MetricDef {
    name: "relay.facts.submitted",
    metric_type: MetricType::Counter,
    description: "Number of facts accepted by the fact endpoint",
};

pub const FACTS_FAILED: MetricDef = MetricDef {
    name: "relay.facts.failed",
    metric_type: MetricType::Counter,
    description: "Number of fact submissions that failed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    RUNS,
    STEP_DURATION,
    EVENTS_FETCHED,
    ANOMALIES,
    FACTS_SUBMITTED,
    FACTS_FAILED,
];
