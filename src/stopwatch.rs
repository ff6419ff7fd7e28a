// Trial stopwatch: one start, one stop, no pauses.
// Penalties move the effective start earlier, so the clock "already ran" that much longer.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stopwatch {
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    running: bool,
    penalty_ms: u64,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin timing. Ignored while already running.
    pub fn start(&mut self, now: Timestamp) {
        if self.running {
            return;
        }
        self.start = Some(now);
        self.end = None;
        self.penalty_ms = 0;
        self.running = true;
    }

    /// Add `ms` to the elapsed time. Ignored unless running.
    pub fn apply_penalty(&mut self, ms: u64) {
        if self.running {
            self.penalty_ms = self.penalty_ms.saturating_add(ms);
        }
    }

    /// Freeze the clock. Ignored unless running.
    pub fn stop(&mut self, now: Timestamp) {
        if !self.running {
            return;
        }
        self.end = Some(now);
        self.running = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn penalty_ms(&self) -> u64 {
        self.penalty_ms
    }

    /// Elapsed microseconds including penalties. Live while running, frozen once stopped,
    /// zero if never started.
    pub fn elapsed_micros(&self, now: Timestamp) -> u64 {
        let Some(start) = self.start else {
            return 0;
        };
        let until = if self.running {
            now
        } else {
            self.end.unwrap_or(start)
        };
        until
            .micros_since(start)
            .saturating_add(self.penalty_ms.saturating_mul(1000))
    }

    pub fn elapsed_now(&self, now: Timestamp) -> Timestamp {
        Timestamp::from_micros(self.elapsed_micros(now))
    }

    /// Elapsed seconds rounded to millisecond precision, as stored in the ledger.
    pub fn elapsed_secs(&self, now: Timestamp) -> f64 {
        (self.elapsed_micros(now) as f64 / 1000.0).round() / 1000.0
    }

    /// Timer readout, seconds with three decimals.
    pub fn display(&self, now: Timestamp) -> String {
        format!("{:.3}", self.elapsed_secs(now))
    }
}
