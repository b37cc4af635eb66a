//! Per-knight rolling activity derived from the event buffer.

use chrono::{DateTime, Duration, Utc};
use rtd_core::{Event, EventKind};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

pub const SPARK_BUCKETS: usize = 5;
/// Trailing window for counters and the sparkline.
const WINDOW_SECONDS: i64 = 30 * 60;
/// A task older than this without a matching result no longer counts as
/// in-flight for the busy flag.
const BUSY_SECONDS: i64 = 60;
/// Task count at which heat saturates to 1.0.
const HEAT_SATURATION: f32 = 10.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KnightActivity {
    pub knight: String,
    pub recent_results: usize,
    pub recent_tasks: usize,
    pub last_active: Option<DateTime<Utc>>,
    /// Result counts over five equal slices of the window, oldest
    /// first, normalized to the busiest bucket.
    pub sparkline: [f32; SPARK_BUCKETS],
    pub busy: bool,
    pub heat: f32,
}

#[derive(Default)]
struct Accumulator {
    tasks: usize,
    results: usize,
    last_active: Option<DateTime<Utc>>,
    buckets: [usize; SPARK_BUCKETS],
    busy: bool,
}

/// Folds the event buffer (any order) into per-knight activity at `now`.
///
/// Busy means: some task_id with a Task event inside the last 60 s and
/// no Result event carrying the same task_id anywhere in the buffer.
pub fn aggregate_activity(events: &[Event], now: DateTime<Utc>) -> Vec<KnightActivity> {
    let window = Duration::seconds(WINDOW_SECONDS);
    let busy_window = Duration::seconds(BUSY_SECONDS);
    let bucket_span = WINDOW_SECONDS / SPARK_BUCKETS as i64;

    let mut answered: HashSet<&str> = HashSet::new();
    for event in events {
        if event.kind == EventKind::Result {
            if let Some(task_id) = event.payload.task_id() {
                answered.insert(task_id);
            }
        }
    }

    let mut knights: BTreeMap<String, Accumulator> = BTreeMap::new();
    for event in events {
        let Some(knight) = event.knight() else {
            continue;
        };
        let age = now - event.observed_at;
        if age < Duration::zero() || age > window {
            continue;
        }
        let acc = knights.entry(knight).or_default();
        acc.last_active = Some(match acc.last_active {
            Some(seen) => seen.max(event.observed_at),
            None => event.observed_at,
        });
        match event.kind {
            EventKind::Task => {
                acc.tasks += 1;
                if age <= busy_window {
                    if let Some(task_id) = event.payload.task_id() {
                        if !answered.contains(task_id) {
                            acc.busy = true;
                        }
                    }
                }
            }
            EventKind::Result => {
                acc.results += 1;
                let idx = (age.num_seconds() / bucket_span).min(SPARK_BUCKETS as i64 - 1);
                // Bucket 0 is the oldest slice.
                acc.buckets[SPARK_BUCKETS - 1 - idx as usize] += 1;
            }
        }
    }

    knights
        .into_iter()
        .map(|(knight, acc)| {
            let peak = acc.buckets.iter().copied().max().unwrap_or(0);
            let mut sparkline = [0.0f32; SPARK_BUCKETS];
            if peak > 0 {
                for (slot, count) in sparkline.iter_mut().zip(acc.buckets) {
                    *slot = count as f32 / peak as f32;
                }
            }
            let mut heat = (acc.tasks as f32 / HEAT_SATURATION).min(1.0);
            if acc.busy {
                // Busy implies at least warm.
                heat = heat.max(0.5);
            }
            KnightActivity {
                knight,
                recent_results: acc.results,
                recent_tasks: acc.tasks,
                last_active: acc.last_active,
                sparkline,
                busy: acc.busy,
                heat,
            }
        })
        .collect()
}
