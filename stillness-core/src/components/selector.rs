//! Duration selection: presets, custom picks and quick-add chips.
//!
//! The selector is a pure state transform over an optional number of seconds.
//! It knows nothing about the engine; callers pass in whether a session is
//! currently running, and every change is refused while one is.

use crate::common::{MAX_SELECTABLE_SECONDS, MIN_SELECTABLE_SECONDS};
use std::time::Duration;

/// A named preset duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickTimer {
    pub label: &'static str,
    pub seconds: u32,
}

/// A named increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickAdd {
    pub label: &'static str,
    pub seconds: u32,
}

pub const QUICK_TIMERS: [QuickTimer; 4] = [
    QuickTimer { label: "5m", seconds: 5 * 60 },
    QuickTimer { label: "15m", seconds: 15 * 60 },
    QuickTimer { label: "30m", seconds: 30 * 60 },
    QuickTimer { label: "1h", seconds: 60 * 60 },
];

pub const QUICK_ADDS: [QuickAdd; 4] = [
    QuickAdd { label: "+15s", seconds: 15 },
    QuickAdd { label: "+30s", seconds: 30 },
    QuickAdd { label: "+1m", seconds: 60 },
    QuickAdd { label: "+5m", seconds: 5 * 60 },
];

/// Where the custom picker starts when nothing is selected yet.
pub const DEFAULT_CUSTOM_SECONDS: u32 = 10 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationSelector {
    selected: Option<u32>,
}

impl DurationSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_seconds(&self) -> Option<u32> {
        self.selected
    }

    /// The selection as a duration; zero when nothing is selected.
    pub fn selected_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.selected.unwrap_or(0)))
    }

    /// Replaces the selection. Returns whether anything changed hands.
    ///
    /// Zero is refused; values past the 12 hour ceiling are clamped to it.
    pub fn select_exact(&mut self, seconds: u32, session_running: bool) -> bool {
        if session_running || seconds < MIN_SELECTABLE_SECONDS {
            return false;
        }
        self.selected = Some(seconds.min(MAX_SELECTABLE_SECONDS));
        true
    }

    /// Adds `delta` to the selection (or to zero), clamped to `[1, 43200]`.
    pub fn add_seconds(&mut self, delta: u32, session_running: bool) -> bool {
        if session_running || delta == 0 {
            return false;
        }
        let total = self
            .selected
            .unwrap_or(0)
            .saturating_add(delta)
            .clamp(MIN_SELECTABLE_SECONDS, MAX_SELECTABLE_SECONDS);
        self.select_exact(total, session_running)
    }

    /// True when the selection matches none of the presets.
    pub fn is_custom(&self) -> bool {
        self.selected
            .is_some_and(|seconds| QUICK_TIMERS.iter().all(|preset| preset.seconds != seconds))
    }

    /// The preset matching the current selection, if any.
    pub fn matching_preset(&self) -> Option<QuickTimer> {
        let seconds = self.selected?;
        QUICK_TIMERS.into_iter().find(|preset| preset.seconds == seconds)
    }
}

/// Formats a selection compactly: `"1h 5m 30s"`, `"45s"`, `"0s"`.
pub fn format_duration(total_seconds: u32) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 {
        parts.push(format!("{}s", seconds));
    }
    if parts.is_empty() {
        return "0s".to_string();
    }
    parts.join(" ")
}

/// Formats a countdown for a clock face: `"MM:SS"`, or `"H:MM:SS"` past an hour.
pub fn format_clock(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Parses user input such as `"90"`, `"90s"`, `"5m"`, `"1h30m"` or `"1h 5m 30s"`.
///
/// A bare number is seconds. Returns `None` for malformed input, zero, or
/// anything that overflows.
pub fn parse_duration(input: &str) -> Option<u32> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    if let Ok(seconds) = compact.parse::<u32>() {
        return (seconds > 0).then_some(seconds);
    }

    let mut total: u32 = 0;
    let mut digits = String::new();
    for c in compact.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c.to_ascii_lowercase() {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        let value: u32 = digits.parse().ok()?;
        total = total.checked_add(value.checked_mul(unit)?)?;
        digits.clear();
    }
    if !digits.is_empty() || total == 0 {
        return None;
    }
    Some(total)
}
