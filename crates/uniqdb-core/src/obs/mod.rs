//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! Estimators and the aggregate layer never touch counters directly.
//! Instrumentation flows through `MetricsEvent` and `MetricsSink`.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventReport, EventState, FunctionCounters, FunctionSummary};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
