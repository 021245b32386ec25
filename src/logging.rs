//! Tracing setup and the engine's structured log events
//!
//! Hosts call [`init_logging`] once; library code only emits events and spans.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};
use uuid::Uuid;

/// Initialize the logging system
///
/// `RUST_LOG` wins over `log_level` when set. Later calls are ignored once a
/// global subscriber is installed.
pub fn init_logging(log_level: &str, json: bool) {
    let default_filter = format!("activity_analysis={log_level}");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = Registry::default().with(env_filter);
    let result = if json {
        registry.with(json_layer()).try_init()
    } else {
        registry.with(console_layer()).try_init()
    };

    if result.is_ok() {
        tracing::info!(json = json, "Logging system initialized");
    }
}

/// One JSON object per event, span context included
fn json_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
}

/// Compact human-readable output
fn console_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_ansi(true)
}

/// Create a span for one analysis request
#[macro_export]
macro_rules! analysis_span {
    ($operation:expr, $user_anonymized_id:expr) => {
        tracing::info_span!(
            "activity_analysis",
            operation = %$operation,
            user_anonymized_id = %$user_anonymized_id,
            goals_matched = tracing::field::Empty,
            outcomes = tracing::field::Empty,
        )
    };
}

/// Create a span for store operations
#[macro_export]
macro_rules! db_span {
    ($operation:expr, $table:expr) => {
        tracing::debug_span!(
            "store_operation",
            operation = %$operation,
            table = %$table,
            rows_affected = tracing::field::Empty,
        )
    };
}

/// Log the outcome of a merge decision
pub fn log_activity_merged(
    user_anonymized_id: Uuid,
    goal_id: Uuid,
    outcome: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) {
    tracing::debug!(
        user_anonymized_id = %user_anonymized_id,
        goal_id = %goal_id,
        outcome = %outcome,
        start_time = %start_time,
        end_time = %end_time,
        "Activity merged"
    );
}

/// Log how the day activity cache resolved a lookup
pub fn log_cache_lookup(
    user_anonymized_id: Uuid,
    goal_id: Uuid,
    state: &str,
    event_date: NaiveDate,
) {
    tracing::trace!(
        user_anonymized_id = %user_anonymized_id,
        goal_id = %goal_id,
        state = %state,
        event_date = %event_date,
        "Day activity cache lookup"
    );
}

/// Log conflict notification hand-off
pub fn log_conflict_dispatched(user_anonymized_id: Uuid, goal_id: Uuid, buddy_count: usize) {
    tracing::info!(
        user_anonymized_id = %user_anonymized_id,
        goal_id = %goal_id,
        buddy_count = buddy_count,
        "Goal conflict dispatched"
    );
}

/// Log device clock drift correction
pub fn log_clock_drift_corrected(offset_ms: i64) {
    tracing::debug!(offset_ms = offset_ms, "Corrected device clock drift");
}

/// Log an event split at a day boundary
pub fn log_day_boundary_split(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    spans_multiple_days: bool,
) {
    if spans_multiple_days {
        tracing::warn!(
            start_time = %start_time,
            end_time = %end_time,
            "Event spans more than one day boundary; intermediate days are dropped"
        );
    } else {
        tracing::debug!(
            start_time = %start_time,
            end_time = %end_time,
            "Split event at day boundary"
        );
    }
}

/// Log store operation
pub fn log_store_operation(
    operation: &str,
    table: &str,
    duration_ms: u64,
    rows_affected: Option<u64>,
) {
    tracing::debug!(
        operation = %operation,
        table = %table,
        duration_ms = duration_ms,
        rows_affected = ?rows_affected,
        "Store operation completed"
    );
}
