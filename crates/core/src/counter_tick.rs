//! Per-counter tick transition (rising-edge counting + run-time accrual).
//!
//! Pure logic: the tick engine loads counter rows and device levels, calls
//! [`advance`] for each, and persists whatever comes back as changed.

use std::time::Duration;

use crate::counter::Level;
use crate::types::Timestamp;

/// Lower bound for the elapsed-delta clamp, in seconds.
pub const MIN_MAX_DELTA_SECS: i64 = 5;

/// The clamp allows this many nominal intervals of elapsed time per tick.
pub const MAX_DELTA_INTERVALS: f64 = 3.0;

/// Accumulated state of one counter, as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterState {
    pub count: i64,
    pub prev_level: Level,
    pub run_seconds: i64,
    pub last_tick_at: Option<Timestamp>,
}

/// Result of applying one observation to a [`CounterState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub state: CounterState,
    /// Whether the row must be written back.
    pub changed: bool,
    /// `true` when this was the counter's first tick (timer initialization).
    pub initialized: bool,
}

/// Largest elapsed delta a single tick may accrue: `max(5, interval * 3)`
/// whole seconds.
///
/// A stalled scheduler therefore under-counts run-time rather than
/// fabricating it.
pub fn max_delta_secs(interval: Duration) -> i64 {
    let scaled = (interval.as_secs_f64() * MAX_DELTA_INTERVALS) as i64;
    scaled.max(MIN_MAX_DELTA_SECS)
}

/// Whole seconds between `last` and `now`, clamped to `[0, max_delta]`.
///
/// Negative deltas (clock skew between writers) clamp to zero.
pub fn clamped_delta_secs(last: Timestamp, now: Timestamp, max_delta: i64) -> i64 {
    now.signed_duration_since(last)
        .num_seconds()
        .clamp(0, max_delta.max(0))
}

/// Apply one observed `level` at time `now` to `state`.
///
/// - First tick (`last_tick_at` is `None`): seed `prev_level`, stamp the
///   timer, accrue nothing and evaluate no edge.
/// - Later ticks: a low-to-high transition increments `count`; while the
///   level is high the clamped elapsed delta is added to `run_seconds`.
///
/// `last_tick_at` is only moved forward when the row is written, so a
/// counter sitting low keeps its previous stamp until something changes.
/// A `now` behind the stored stamp never moves it backwards.
pub fn advance(state: CounterState, level: Level, now: Timestamp, max_delta: i64) -> TickOutcome {
    let Some(last_tick_at) = state.last_tick_at else {
        return TickOutcome {
            state: CounterState {
                prev_level: level,
                last_tick_at: Some(now),
                ..state
            },
            changed: true,
            initialized: true,
        };
    };

    let delta = clamped_delta_secs(last_tick_at, now, max_delta);

    let mut next = state;
    if state.prev_level == Level::Low && level == Level::High {
        next.count += 1;
    }

    let accrued = level == Level::High && delta > 0;
    if accrued {
        next.run_seconds += delta;
    }
    next.prev_level = level;

    let changed = next.count != state.count || next.prev_level != state.prev_level || accrued;
    if changed {
        next.last_tick_at = Some(now.max(last_tick_at));
    }

    TickOutcome {
        state: next,
        changed,
        initialized: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    fn state(count: i64, prev: Level, run: i64, last: Option<Timestamp>) -> CounterState {
        CounterState {
            count,
            prev_level: prev,
            run_seconds: run,
            last_tick_at: last,
        }
    }

    #[test]
    fn max_delta_has_a_floor_of_five_seconds() {
        assert_eq!(max_delta_secs(Duration::from_secs(1)), 5);
        assert_eq!(max_delta_secs(Duration::from_secs(2)), 6);
        assert_eq!(max_delta_secs(Duration::from_millis(500)), 5);
        assert_eq!(max_delta_secs(Duration::from_secs(10)), 30);
    }

    #[test]
    fn delta_is_clamped_both_ways() {
        assert_eq!(clamped_delta_secs(t0(), t0() + secs(3), 6), 3);
        assert_eq!(clamped_delta_secs(t0(), t0() + secs(600), 6), 6);
        assert_eq!(clamped_delta_secs(t0(), t0() - secs(4), 6), 0);
    }

    #[test]
    fn first_tick_only_initializes() {
        let before = state(7, Level::Low, 40, None);
        let out = advance(before, Level::High, t0(), 6);

        assert!(out.changed);
        assert!(out.initialized);
        assert_eq!(out.state.count, 7);
        assert_eq!(out.state.run_seconds, 40);
        assert_eq!(out.state.prev_level, Level::High);
        assert_eq!(out.state.last_tick_at, Some(t0()));
    }

    #[test]
    fn rising_edge_counts_and_accrues_elapsed_time() {
        let before = state(5, Level::Low, 100, Some(t0()));
        let out = advance(before, Level::High, t0() + secs(3), 6);

        assert!(out.changed);
        assert!(!out.initialized);
        assert_eq!(out.state.count, 6);
        assert_eq!(out.state.run_seconds, 103);
        assert_eq!(out.state.prev_level, Level::High);
        assert_eq!(out.state.last_tick_at, Some(t0() + secs(3)));
    }

    #[test]
    fn falling_edge_does_not_count() {
        let before = state(5, Level::High, 100, Some(t0()));
        let out = advance(before, Level::Low, t0() + secs(2), 6);

        assert!(out.changed);
        assert_eq!(out.state.count, 5);
        assert_eq!(out.state.run_seconds, 100);
        assert_eq!(out.state.prev_level, Level::Low);
    }

    #[test]
    fn steady_low_is_not_written() {
        let before = state(5, Level::Low, 100, Some(t0()));
        let out = advance(before, Level::Low, t0() + secs(2), 6);

        assert!(!out.changed);
        assert_eq!(out.state, before);
    }

    #[test]
    fn steady_high_accrues_without_new_edges() {
        let mut current = state(2, Level::High, 0, Some(t0()));
        let mut now = t0();
        for step in [2, 2, 3, 1, 2] {
            now += secs(step);
            let out = advance(current, Level::High, now, 6);
            assert!(out.changed);
            current = out.state;
        }
        assert_eq!(current.count, 2);
        assert_eq!(current.run_seconds, 10);
    }

    #[test]
    fn long_gap_is_capped() {
        let before = state(0, Level::High, 0, Some(t0()));
        let max_delta = max_delta_secs(Duration::from_secs(2));
        let out = advance(before, Level::High, t0() + secs(600), max_delta);
        assert_eq!(out.state.run_seconds, 6);
    }

    #[test]
    fn repeated_observation_at_same_instant_is_idempotent() {
        let before = state(1, Level::Low, 10, Some(t0()));
        let first = advance(before, Level::High, t0() + secs(2), 6);
        let second = advance(first.state, Level::High, t0() + secs(2), 6);

        assert!(!second.changed);
        assert_eq!(second.state, first.state);
    }

    #[test]
    fn clock_behind_stored_stamp_keeps_stamp() {
        let out = advance(
            state(0, Level::Low, 0, Some(t0())),
            Level::High,
            t0() - secs(5),
            6,
        );
        assert!(out.changed);
        assert_eq!(out.state.count, 1);
        assert_eq!(out.state.run_seconds, 0);
        assert_eq!(out.state.last_tick_at, Some(t0()));
    }

    #[test]
    fn high_with_zero_delta_does_not_write() {
        let before = state(1, Level::High, 10, Some(t0()));
        let out = advance(before, Level::High, t0(), 6);
        assert!(!out.changed);
    }
}
