// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Progress narration for long operations.

use std::sync::Mutex;

/// Receives `(fraction, label)` updates. Fractions are in `[0, 1]`.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, fraction: f64, label: &str);
}

/// Discards all updates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _fraction: f64, _label: &str) {}
}

/// Forwards updates clamped to `[0, 1]` and never lower than the previous
/// one, so stages that report out of order cannot make progress go backwards.
pub struct Monotonic<'a> {
    inner: &'a dyn ProgressReporter,
    last: Mutex<f64>,
}

impl<'a> Monotonic<'a> {
    pub fn new(inner: &'a dyn ProgressReporter) -> Self {
        Self {
            inner,
            last: Mutex::new(0.0),
        }
    }
}

impl ProgressReporter for Monotonic<'_> {
    fn report(&self, fraction: f64, label: &str) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let value = match self.last.lock() {
            Ok(mut last) => {
                *last = last.max(fraction);
                *last
            }
            Err(_) => fraction,
        };
        self.inner.report(value, label);
    }
}

/// Maps a sub-operation's own `[0, 1]` onto `[start, end]` of the parent.
pub struct Scaled<'a> {
    inner: &'a dyn ProgressReporter,
    start: f64,
    end: f64,
}

impl<'a> Scaled<'a> {
    pub fn new(inner: &'a dyn ProgressReporter, start: f64, end: f64) -> Self {
        Self { inner, start, end }
    }
}

impl ProgressReporter for Scaled<'_> {
    fn report(&self, fraction: f64, label: &str) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.inner
            .report(self.start + (self.end - self.start) * fraction, label);
    }
}

/// Keeps every update; useful for rendering a summary afterwards and in tests.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<(f64, String)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<(f64, String)> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.updates().into_iter().map(|(_, l)| l).collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, fraction: f64, label: &str) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push((fraction, label.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_never_goes_backwards() {
        let rec = RecordingProgress::new();
        let mono = Monotonic::new(&rec);
        mono.report(0.3, "a");
        mono.report(0.1, "b");
        mono.report(1.7, "c");
        mono.report(f64::NAN, "d");
        let values: Vec<f64> = rec.updates().into_iter().map(|(f, _)| f).collect();
        assert_eq!(values, vec![0.3, 0.3, 1.0, 1.0]);
    }

    #[test]
    fn scaled_maps_into_parent_range() {
        let rec = RecordingProgress::new();
        let scaled = Scaled::new(&rec, 0.2, 0.6);
        scaled.report(0.0, "start");
        scaled.report(0.5, "half");
        scaled.report(1.0, "done");
        let values: Vec<f64> = rec.updates().into_iter().map(|(f, _)| f).collect();
        assert!((values[1] - 0.4).abs() < 1e-9);
        assert!((values[2] - 0.6).abs() < 1e-9);
    }
}
