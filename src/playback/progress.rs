// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use serde::Serialize;

/// Shown instead of a time when the duration is not known yet
pub const TIME_PLACEHOLDER: &str = "--:--";

/// Shown for times that cannot be formatted (NaN, infinite, negative)
pub const ZERO_TIME: &str = "00:00:00";

/// A displayable view of the playback position, recomputed on every tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub current_seconds: f64,
    /// `None` while the engine does not know the duration
    pub duration_seconds: Option<f64>,
    /// Always within `0.0..=1.0`; exactly `0.0` when the duration is unknown
    pub progress: f64,
    pub current_text: String,
    pub remaining_text: String,
}

impl ProgressSnapshot {
    /// Snapshot for an idle player
    pub fn empty() -> Self {
        Self {
            current_seconds: 0.0,
            duration_seconds: None,
            progress: 0.0,
            current_text: TIME_PLACEHOLDER.to_string(),
            remaining_text: TIME_PLACEHOLDER.to_string(),
        }
    }

    /// Snapshot of the engine's position
    pub fn at(current: Duration, duration: Option<Duration>) -> Self {
        let duration = known(duration);
        let current_seconds = current.as_secs_f64();

        Self {
            current_seconds,
            duration_seconds: duration,
            progress: fraction(current_seconds, duration),
            current_text: format_time(current_seconds),
            remaining_text: remaining_text(current_seconds, duration),
        }
    }

    /// Snapshot while the user drags the progress bar.
    ///
    /// The drag position is authoritative for both the bar and the time
    /// texts; the engine's position is ignored until the seek is committed.
    pub fn scrubbing(scrub: f64, duration: Option<Duration>) -> Self {
        let duration = known(duration);
        let scrub = clamp_fraction(scrub);

        match duration {
            Some(total) => {
                let proposed = scrub * total;
                Self {
                    current_seconds: proposed,
                    duration_seconds: Some(total),
                    progress: scrub,
                    current_text: format_time(proposed),
                    remaining_text: remaining_text(proposed, Some(total)),
                }
            }
            None => Self::empty(),
        }
    }
}

fn known(duration: Option<Duration>) -> Option<f64> {
    duration
        .map(|d| d.as_secs_f64())
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}

/// Clamp a requested fraction into `0.0..=1.0`, mapping NaN to `0.0`
pub fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn fraction(current: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(total) => clamp_fraction(current / total),
        None => 0.0,
    }
}

fn remaining_text(current: f64, duration: Option<f64>) -> String {
    match duration {
        Some(total) => format_time((total - current).max(0.0)),
        None => TIME_PLACEHOLDER.to_string(),
    }
}

/// Format seconds as zero-padded `HH:MM:SS`, truncating to whole seconds
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return ZERO_TIME.to_string();
    }

    let total = seconds.trunc() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
