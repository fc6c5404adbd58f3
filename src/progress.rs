//! Upload progress and ETA arithmetic, plus the size/ETA labels the shells
//! display. Everything here is pure: callers pass the clock in.

use std::time::{Duration, Instant};

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Percentage of `total` covered by `loaded`, in `0.0..=100.0`.
/// An unknown or zero total counts as no progress.
pub fn percent(loaded: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((loaded as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
}

/// Remaining time if the transfer keeps its average rate so far.
///
/// `None` until some progress has been made. Never negative: a clock that
/// reads earlier than `started_at` counts as zero elapsed.
pub fn eta(started_at: Instant, now: Instant, percent: f64) -> Option<Duration> {
    if !(percent > 0.0) {
        return None;
    }
    let elapsed = now.saturating_duration_since(started_at).as_secs_f64();
    let remaining = elapsed * (100.0 / percent.min(100.0) - 1.0);
    Duration::try_from_secs_f64(remaining.max(0.0)).ok()
}

/// Progress of one transfer at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub percent: f64,
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn compute(loaded: u64, total: u64, started_at: Instant, now: Instant) -> Self {
        let percent = percent(loaded, total);
        Self {
            percent,
            eta: eta(started_at, now, percent),
        }
    }

    /// Whole percent as shown in progress labels (rounded down).
    pub fn whole_percent(&self) -> u8 {
        whole_percent(self.percent)
    }
}

pub fn whole_percent(percent: f64) -> u8 {
    percent.clamp(0.0, 100.0).floor() as u8
}

/// `1536` → `"1.5 KB"`. Base 1024, at most two decimals, trailing zeros dropped.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

/// Whole seconds, rounded up: `"ETA: 4s"`.
pub fn format_eta(eta: Duration) -> String {
    format!("ETA: {}s", eta.as_secs_f64().ceil() as u64)
}
