use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for aggregate-state operations.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub functions: BTreeMap<String, FunctionCounters>,
    pub window_start_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            functions: BTreeMap::new(),
            window_start_ms: now_millis(),
        }
    }
}

#[expect(clippy::cast_possible_truncation)]
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Aggregate entrypoints
    pub states_initialized: u64,
    pub rows_added: u64,
    pub state_merges: u64,
    pub decode_rejections: u64,

    // Structural transitions
    pub sampling_degree_raises: u64,
    pub sampling_max_skip_degree: u8,
    pub hybrid_promotions: u64,
    pub exact_heap_spills: u64,
    pub exact_max_spill_cells: u64,
}

///
/// FunctionCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FunctionCounters {
    pub states_initialized: u64,
    pub rows_added: u64,
    pub state_merges: u64,
    pub decode_rejections: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters and restart the window.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

/// Borrow the per-function counter entry, creating it on first use.
pub(crate) fn function_entry<'a>(
    m: &'a mut EventState,
    function: &'static str,
) -> &'a mut FunctionCounters {
    m.functions.entry(function.to_string()).or_default()
}

///
/// EventReport
/// Counter report for the current window.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Ephemeral runtime counters since `window_start_ms`.
    pub counters: Option<EventState>,
    /// Per-function counters and averages.
    pub function_counters: Vec<FunctionSummary>,
}

///
/// FunctionSummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FunctionSummary {
    pub name: String,
    pub states_initialized: u64,
    pub rows_added: u64,
    pub state_merges: u64,
    pub decode_rejections: u64,
    pub avg_rows_per_state: f64,
}

/// Build a metrics report, or an empty one when the caller's window starts
/// after the current window began.
#[must_use]
pub(crate) fn report_window_start(window_start_ms: Option<u64>) -> EventReport {
    let snap = with_state(Clone::clone);
    if window_start_ms.is_some_and(|start| start > snap.window_start_ms) {
        return EventReport::default();
    }

    report_from(snap)
}

#[expect(clippy::cast_precision_loss)]
fn report_from(snap: EventState) -> EventReport {
    let mut function_counters: Vec<FunctionSummary> = snap
        .functions
        .iter()
        .map(|(name, ops)| {
            let avg_rows = if ops.states_initialized > 0 {
                ops.rows_added as f64 / ops.states_initialized as f64
            } else {
                0.0
            };

            FunctionSummary {
                name: name.clone(),
                states_initialized: ops.states_initialized,
                rows_added: ops.rows_added,
                state_merges: ops.state_merges,
                decode_rejections: ops.decode_rejections,
                avg_rows_per_state: avg_rows,
            }
        })
        .collect();

    function_counters.sort_by(|a, b| match b.rows_added.cmp(&a.rows_added) {
        Ordering::Equal => a.name.cmp(&b.name),
        other => other,
    });

    EventReport {
        counters: Some(snap),
        function_counters,
    }
}

///
/// TESTS
///
