//! Periodic counter tick engine.
//!
//! Once per interval: load every enabled counter, resolve the current level
//! of each bound input with a single bulk read, apply
//! [`coreflex_core::counter_tick::advance`], and write back only the rows
//! that changed in a single batched statement.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use coreflex_core::counter::{DigitalInput, Level};
use coreflex_core::counter_tick::{advance, max_delta_secs, CounterState};
use coreflex_core::types::{DbId, Timestamp};
use coreflex_db::models::counter::{CounterTickUpdate, TickCounter};
use coreflex_db::repositories::{CounterRepo, DeviceStateRepo};
use serde_json::Value;
use sqlx::PgPool;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Counts reported by one tick pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Enabled counters loaded.
    pub loaded: usize,
    /// Counters whose input level could be resolved this pass.
    pub resolved: usize,
    /// Rows written back.
    pub updated: u64,
    /// Rows whose timer was initialized (first tick).
    pub initialized: usize,
}

/// Liveness of the tick loop, shared with the health endpoint.
#[derive(Debug, Default)]
pub struct TickHeartbeat {
    /// Completed passes.
    passes: AtomicU64,
    /// Passes that failed with a database error.
    failures: AtomicU64,
    /// Wall-clock millis of the last completed pass, 0 before the first.
    last_pass_ms: AtomicI64,
}

impl TickHeartbeat {
    pub fn record_pass(&self, at: Timestamp) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.last_pass_ms.store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn last_pass_at(&self) -> Option<Timestamp> {
        match self.last_pass_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    /// `true` if a pass completed within `max_age` of `now`.
    pub fn is_fresh(&self, now: Timestamp, max_age: Duration) -> bool {
        let Some(last) = self.last_pass_at() else {
            return false;
        };
        chrono::Duration::from_std(max_age)
            .map_or(true, |max_age| now.signed_duration_since(last) <= max_age)
    }
}

/// Background counter tick engine.
///
/// A single long-lived Tokio task.
pub struct CounterTicker {
    pool: PgPool,
    interval: Duration,
    heartbeat: Arc<TickHeartbeat>,
}

impl CounterTicker {
    pub fn new(pool: PgPool, interval: Duration) -> Self {
        Self {
            pool,
            interval,
            heartbeat: Arc::new(TickHeartbeat::default()),
        }
    }

    /// Handle on this engine's liveness counters.
    pub fn heartbeat(&self) -> Arc<TickHeartbeat> {
        Arc::clone(&self.heartbeat)
    }

    /// Run tick passes until the cancellation token is triggered.
    ///
    /// A pass in flight when cancellation arrives is abandoned; its batched
    /// write either landed already or never starts.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            max_delta_secs = max_delta_secs(self.interval),
            "Counter tick engine started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!("Counter tick pass abandoned on shutdown");
                            break;
                        }
                        result = self.run_pass() => match result {
                            Ok(summary) => {
                                self.heartbeat.record_pass(Utc::now());
                                tracing::debug!(
                                    loaded = summary.loaded,
                                    resolved = summary.resolved,
                                    updated = summary.updated,
                                    initialized = summary.initialized,
                                    "Counter tick pass complete",
                                );
                            }
                            Err(e) => {
                                self.heartbeat.record_failure();
                                tracing::error!(error = %e, "Counter tick pass failed");
                            }
                        }
                    }
                }
            }
        }

        tracing::info!("Counter tick engine stopped");
    }

    /// Run one pass stamped with the current time.
    pub async fn run_pass(&self) -> Result<TickSummary, sqlx::Error> {
        self.run_pass_at(Utc::now()).await
    }

    /// Run one pass as if the clock read `now`.
    pub async fn run_pass_at(&self, now: Timestamp) -> Result<TickSummary, sqlx::Error> {
        let counters = CounterRepo::list_enabled_for_tick(&self.pool).await?;
        if counters.is_empty() {
            return Ok(TickSummary::default());
        }

        let bound = resolve_bindings(&counters);
        let pairs: Vec<(DbId, String)> = bound
            .iter()
            .map(|(c, _)| (c.user_id, c.device_id.trim().to_string()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let rows = DeviceStateRepo::bulk_read_inputs(&self.pool, &pairs).await?;
        let live: HashMap<(DbId, String), Value> = rows
            .into_iter()
            .map(|r| ((r.user_id, r.device_id), r.io_values))
            .collect();

        let plan = plan_pass(&bound, &live, now, max_delta_secs(self.interval));
        let updated = CounterRepo::apply_tick_updates(&self.pool, &plan.updates).await?;

        Ok(TickSummary {
            loaded: counters.len(),
            resolved: plan.resolved,
            updated,
            initialized: plan.initialized,
        })
    }
}

/// Counters with a device and a valid input field, paired with that field.
fn resolve_bindings(counters: &[TickCounter]) -> Vec<(&TickCounter, DigitalInput)> {
    counters
        .iter()
        .filter(|c| !c.device_id.trim().is_empty())
        .filter_map(|c| DigitalInput::normalize(&c.field).map(|field| (c, field)))
        .collect()
}

#[derive(Debug, Default)]
struct PassPlan {
    updates: Vec<CounterTickUpdate>,
    resolved: usize,
    initialized: usize,
}

/// Apply the tick transition to every counter whose level is known.
///
/// Devices that are missing, owned by someone else, or have never reported
/// the field leave their counters untouched.
fn plan_pass(
    bound: &[(&TickCounter, DigitalInput)],
    live: &HashMap<(DbId, String), Value>,
    now: Timestamp,
    max_delta: i64,
) -> PassPlan {
    let mut plan = PassPlan::default();

    for (counter, field) in bound {
        let key = (counter.user_id, counter.device_id.trim().to_string());
        let Some(level) = live
            .get(&key)
            .and_then(|values| values.get(field.as_str()))
            .and_then(Level::from_json)
        else {
            continue;
        };
        plan.resolved += 1;

        let state = CounterState {
            count: counter.count,
            prev_level: Level::from_i16(counter.prev_level),
            run_seconds: counter.run_seconds,
            last_tick_at: counter.last_tick_at,
        };
        let outcome = advance(state, level, now, max_delta);
        if !outcome.changed {
            continue;
        }
        if outcome.initialized {
            plan.initialized += 1;
        }

        plan.updates.push(CounterTickUpdate {
            id: counter.id,
            count: outcome.state.count,
            prev_level: outcome.state.prev_level.as_i16(),
            run_seconds: outcome.state.run_seconds,
            last_tick_at: outcome.state.last_tick_at.unwrap_or(now),
        });
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use serde_json::json;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn counter(id: DbId, device_id: &str, field: &str, last: Option<Timestamp>) -> TickCounter {
        TickCounter {
            id,
            user_id: 1,
            device_id: device_id.to_string(),
            field: field.to_string(),
            count: 5,
            prev_level: 0,
            run_seconds: 100,
            last_tick_at: last,
        }
    }

    #[test]
    fn heartbeat_freshness() {
        let beat = TickHeartbeat::default();
        assert_eq!(beat.last_pass_at(), None);
        assert!(!beat.is_fresh(t0(), Duration::from_secs(6)));

        beat.record_pass(t0());
        beat.record_failure();
        assert_eq!(beat.passes(), 1);
        assert_eq!(beat.failures(), 1);
        assert_eq!(beat.last_pass_at(), Some(t0()));
        assert!(beat.is_fresh(t0() + ChronoDuration::seconds(6), Duration::from_secs(6)));
        assert!(!beat.is_fresh(t0() + ChronoDuration::seconds(7), Duration::from_secs(6)));
    }

    #[test]
    fn unbound_and_invalid_fields_are_not_resolved() {
        let counters = vec![
            counter(1, "", "di1", None),
            counter(2, "D1", "do1", None),
            counter(3, "D1", "in2", None),
        ];
        let bound = resolve_bindings(&counters);
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].0.id, 3);
        assert_eq!(bound[0].1, DigitalInput::Di2);
    }

    #[test]
    fn missing_values_leave_counters_untouched() {
        let counters = vec![
            counter(1, "D1", "di2", Some(t0())),
            counter(2, "D2", "di2", Some(t0())),
        ];
        let bound = resolve_bindings(&counters);
        let live = HashMap::from([((1, "D1".to_string()), json!({"di2": null}))]);

        let plan = plan_pass(&bound, &live, t0() + ChronoDuration::seconds(3), 6);
        assert!(plan.updates.is_empty());
        assert_eq!(plan.resolved, 0);
    }

    #[test]
    fn rising_edge_produces_an_update() {
        let counters = vec![counter(7, "D123", "di2", Some(t0()))];
        let bound = resolve_bindings(&counters);
        let live = HashMap::from([((1, "D123".to_string()), json!({"di2": 1}))]);
        let now = t0() + ChronoDuration::seconds(3);

        let plan = plan_pass(&bound, &live, now, 6);
        assert_eq!(
            plan.updates,
            vec![CounterTickUpdate {
                id: 7,
                count: 6,
                prev_level: 1,
                run_seconds: 103,
                last_tick_at: now,
            }]
        );
    }

    #[test]
    fn steady_low_writes_nothing() {
        let counters = vec![counter(7, "D123", "di2", Some(t0()))];
        let bound = resolve_bindings(&counters);
        let live = HashMap::from([((1, "D123".to_string()), json!({"di2": 0}))]);

        let plan = plan_pass(&bound, &live, t0() + ChronoDuration::seconds(2), 6);
        assert!(plan.updates.is_empty());
        assert_eq!(plan.resolved, 1);
    }
}
