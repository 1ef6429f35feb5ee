//! Metrics sink boundary.
//!
//! Estimator and aggregate logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the thread-local metrics state.
use crate::obs::metrics;
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = RefCell::new(None);
}

///
/// MetricsEvent
///
/// Per-row paths never emit events; batches, merges, decodes and
/// structural transitions do.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    StateInit {
        function: &'static str,
    },
    RowsAdded {
        function: &'static str,
        rows: u64,
    },
    StateMerge {
        function: &'static str,
    },
    StateDecodeRejected {
        function: &'static str,
    },
    SamplingDegreeRaised {
        degree: u8,
    },
    HybridPromoted,
    ExactHeapSpill {
        cells: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default sink that writes into the thread-local metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::StateInit { function } => {
                metrics::with_state_mut(|m| {
                    m.ops.states_initialized = m.ops.states_initialized.saturating_add(1);
                    let entry = metrics::function_entry(m, function);
                    entry.states_initialized = entry.states_initialized.saturating_add(1);
                });
            }

            MetricsEvent::RowsAdded { function, rows } => {
                metrics::with_state_mut(|m| {
                    m.ops.rows_added = m.ops.rows_added.saturating_add(rows);
                    let entry = metrics::function_entry(m, function);
                    entry.rows_added = entry.rows_added.saturating_add(rows);
                });
            }

            MetricsEvent::StateMerge { function } => {
                metrics::with_state_mut(|m| {
                    m.ops.state_merges = m.ops.state_merges.saturating_add(1);
                    let entry = metrics::function_entry(m, function);
                    entry.state_merges = entry.state_merges.saturating_add(1);
                });
            }

            MetricsEvent::StateDecodeRejected { function } => {
                metrics::with_state_mut(|m| {
                    m.ops.decode_rejections = m.ops.decode_rejections.saturating_add(1);
                    let entry = metrics::function_entry(m, function);
                    entry.decode_rejections = entry.decode_rejections.saturating_add(1);
                });
            }

            MetricsEvent::SamplingDegreeRaised { degree } => {
                metrics::with_state_mut(|m| {
                    m.ops.sampling_degree_raises = m.ops.sampling_degree_raises.saturating_add(1);
                    m.ops.sampling_max_skip_degree = m.ops.sampling_max_skip_degree.max(degree);
                });
            }

            MetricsEvent::HybridPromoted => {
                metrics::with_state_mut(|m| {
                    m.ops.hybrid_promotions = m.ops.hybrid_promotions.saturating_add(1);
                });
            }

            MetricsEvent::ExactHeapSpill { cells } => {
                metrics::with_state_mut(|m| {
                    m.ops.exact_heap_spills = m.ops.exact_heap_spills.saturating_add(1);
                    m.ops.exact_max_spill_cells = m.ops.exact_max_spill_cells.max(cells);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // Preconditions:
        // - `ptr` was produced from a valid `&dyn MetricsSink` in `with_metrics_sink`.
        // - `with_metrics_sink` always restores the previous pointer before returning,
        //   including unwind paths via `Guard::drop`.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        //
        // Aliasing:
        // - Only a shared reference is materialized, matching the shared borrow
        //   used to install the override.
        //
        // What would break this:
        // - If `with_metrics_sink` failed to restore on all exits (normal + panic),
        //   `ptr` could outlive the borrowed sink and become dangling.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current metrics state.
///
/// `window_start_ms` filters by window start (`EventState::window_start_ms`),
/// not by per-event timestamps.
#[must_use]
pub fn metrics_report(window_start_ms: Option<u64>) -> metrics::EventReport {
    metrics::report_window_start(window_start_ms)
}

/// Reset all metrics state on the current thread.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override on the current thread.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // Preconditions:
    // - `sink_ptr` is installed only for this dynamic scope.
    // - `Guard` always restores the previous slot on all exits, including panic.
    // - `record` only dereferences synchronously and never persists `sink_ptr`.
    //
    // What would break this:
    // - Any deferred use of `sink_ptr` beyond this scope.
    // - Any path that bypasses Guard restoration.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}

///
/// TESTS
///
