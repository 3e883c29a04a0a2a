// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::disallowed_methods)] // progress lines go to stderr

use hsm_core::ProgressReporter;
use std::sync::Mutex;

/// Renders progress as `[ 42%] label` lines on stderr, skipping repeats.
#[derive(Default)]
pub struct ConsoleProgress {
    last: Mutex<Option<(u32, String)>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn render(fraction: f64, label: &str) -> String {
    format!("[{:>3}%] {label}", percent(fraction))
}

fn percent(fraction: f64) -> u32 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u32
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, fraction: f64, label: &str) {
        let current = (percent(fraction), label.to_string());
        let Ok(mut last) = self.last.lock() else {
            return;
        };
        if last.as_ref() == Some(&current) {
            return;
        }
        eprintln!("{}", render(fraction, label));
        *last = Some(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_are_padded_and_clamped() {
        assert_eq!(render(0.42, "Downloading"), "[ 42%] Downloading");
        assert_eq!(render(1.0, "Done"), "[100%] Done");
        assert_eq!(render(0.0, "Start"), "[  0%] Start");
        assert_eq!(render(1.7, "Over"), "[100%] Over");
        assert_eq!(render(f64::NAN, "Odd"), "[  0%] Odd");
    }
}
