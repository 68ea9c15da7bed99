// src/timer.rs
/*!
Named, accumulating wall-clock timers.

The blocked engine charges kernel time, cache-copy time and the I/O phases to
named timers so a job can report where its time went. A timer may be started
and stopped many times; `get_dtimer` returns the accumulated total.
*/

use std::time::{Duration, Instant};

use ahash::AHashMap;
use tracing::info;

#[derive(Debug, Default, Clone)]
struct Timer {
    total: Duration,
    started: Option<Instant>,
    count: usize,
}

/// A set of named timers, keyed by label.
#[derive(Debug, Default, Clone)]
pub struct TimerArray {
    timers: AHashMap<String, Timer>,
}

impl TimerArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `name`, creating it on first use. Restarting a running timer resets its start point.
    pub fn start_timer(&mut self, name: &str) {
        let t = self.timers.entry(name.to_owned()).or_default();
        t.started = Some(Instant::now());
    }

    /// Stop `name` and add the elapsed time to its total. Stopping an idle timer is a no-op.
    pub fn stop_timer(&mut self, name: &str) {
        if let Some(t) = self.timers.get_mut(name) {
            if let Some(start) = t.started.take() {
                t.total += start.elapsed();
                t.count += 1;
            }
        }
    }

    /// Accumulated time of `name` (zero if the timer was never used).
    pub fn get_dtimer(&self, name: &str) -> Duration {
        self.timers.get(name).map_or(Duration::ZERO, |t| t.total)
    }

    /// Number of completed start/stop intervals of `name`.
    pub fn get_count(&self, name: &str) -> usize {
        self.timers.get(name).map_or(0, |t| t.count)
    }

    pub fn reset(&mut self) {
        self.timers.clear();
    }

    /// Log every timer, longest first.
    pub fn report(&self) {
        let mut rows: Vec<_> = self.timers.iter().collect();
        rows.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        for (name, t) in rows {
            info!(timer = %name, total_s = t.total.as_secs_f64(), calls = t.count, "timer");
        }
    }
}
