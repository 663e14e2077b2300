//! The registry of vibration patterns.
//!
//! Each pattern is tagged data: a label, a waveform and a loop flag. Playback
//! dispatches on the flag, never on which variant it is. Continuous patterns
//! keep buzzing until the user acknowledges them; finite ones are short
//! chimes that stop by themselves.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Alternating silence/vibrate segments in milliseconds, starting with a
/// (possibly zero) silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waveform {
    timings: &'static [u64],
}

impl Waveform {
    /// Builds a waveform, rejecting timings without a vibrate segment.
    ///
    /// This is a `const fn` so the built-in table is validated at compile time.
    pub const fn new(timings: &'static [u64]) -> Self {
        assert!(
            timings.len() >= 2,
            "a waveform needs a leading silence and at least one vibrate segment"
        );
        Self { timings }
    }

    pub fn timings(&self) -> &'static [u64] {
        self.timings
    }

    /// True when the segment at `index` drives the motor.
    pub fn is_vibrate_segment(index: usize) -> bool {
        index % 2 == 1
    }

    /// Length of one pass through the waveform.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.timings.iter().sum())
    }

    /// Length of the part of the waveform that repeats when looping from `index`.
    pub fn loop_duration(&self, index: usize) -> Duration {
        Duration::from_millis(self.timings.get(index..).unwrap_or(&[]).iter().sum())
    }
}

/// How a waveform is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    /// Run the timings once, then stop.
    Once,
    /// Run the timings, then restart from this index until cancelled.
    LoopFrom(usize),
}

impl RepeatMode {
    /// The pattern's own mode: loop from the start when continuous, once otherwise.
    pub fn natural(pattern: VibrationPattern) -> Self {
        if pattern.is_looping() {
            RepeatMode::LoopFrom(0)
        } else {
            RepeatMode::Once
        }
    }

    /// Resolves an optional repeat override.
    ///
    /// A negative override plays once. A non-negative one is the index to loop
    /// from. An index that falls outside the waveform, or whose loop would be
    /// zero-length, degrades to playing once.
    pub fn resolve(pattern: VibrationPattern, repeat_override: Option<i32>) -> Self {
        let Some(repeat) = repeat_override else {
            return Self::natural(pattern);
        };
        let Ok(index) = usize::try_from(repeat) else {
            return RepeatMode::Once;
        };
        let waveform = pattern.waveform();
        if index >= waveform.timings().len() || waveform.loop_duration(index).is_zero() {
            warn!(
                pattern = pattern.key(),
                repeat, "Repeat index outside the waveform; playing once"
            );
            return RepeatMode::Once;
        }
        RepeatMode::LoopFrom(index)
    }

    pub fn is_looping(self) -> bool {
        matches!(self, RepeatMode::LoopFrom(_))
    }
}

/// One entry of the static registry.
#[derive(Debug)]
pub struct PatternSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub waveform: Waveform,
    pub looping: bool,
}

// Continuous patterns, looping until dismissed.

/// Soft evenly spaced pulses with a longer trailing gap.
static GENTLE_PULSE: PatternSpec = PatternSpec {
    key: "GENTLE_PULSE",
    label: "Gentle Pulse",
    waveform: Waveform::new(&[0, 200, 300, 200, 300, 200, 600]),
    looping: true,
};

/// Rapid short bursts followed by a half-second rest.
static QUICK_PULSE: PatternSpec = PatternSpec {
    key: "QUICK_PULSE",
    label: "Quick Pulse",
    waveform: Waveform::new(&[0, 80, 80, 80, 80, 80, 80, 80, 500]),
    looping: true,
};

/// Gradually lengthening pulses that crest, then rest.
static WAVE: PatternSpec = PatternSpec {
    key: "WAVE",
    label: "Wave",
    waveform: Waveform::new(&[0, 100, 50, 150, 50, 200, 50, 250, 50, 300, 400]),
    looping: true,
};

static ESCALATING: PatternSpec = PatternSpec {
    key: "ESCALATING",
    label: "Escalating",
    waveform: Waveform::new(&[0, 100, 200, 150, 200, 200, 200, 300, 200, 400, 400]),
    looping: true,
};

// Auto-stop patterns with their repetitions baked in, played once.

/// Three soft double-taps.
static GENTLE_BELLS: PatternSpec = PatternSpec {
    key: "GENTLE_BELLS",
    label: "Gentle Bells",
    waveform: Waveform::new(&[
        0, 120, 100, 120, 600, //
        120, 100, 120, 600, //
        120, 100, 120,
    ]),
    looping: false,
};

/// Five sets of boom-boom-boom.
static TRIPLE_CHIME: PatternSpec = PatternSpec {
    key: "TRIPLE_CHIME",
    label: "Triple Chime",
    waveform: Waveform::new(&[
        0, 150, 120, 150, 120, 150, 700, //
        150, 120, 150, 120, 150, 700, //
        150, 120, 150, 120, 150, 700, //
        150, 120, 150, 120, 150, 700, //
        150, 120, 150, 120, 150,
    ]),
    looping: false,
};

/// Four bursts, each shorter than the last.
static FADE_OUT: PatternSpec = PatternSpec {
    key: "FADE_OUT",
    label: "Fade Out",
    waveform: Waveform::new(&[0, 400, 300, 300, 300, 200, 300, 100]),
    looping: false,
};

/// Every vibration pattern the app offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VibrationPattern {
    GentlePulse,
    QuickPulse,
    Wave,
    Escalating,
    GentleBells,
    TripleChime,
    FadeOut,
}

impl Default for VibrationPattern {
    /// The first continuous pattern.
    fn default() -> Self {
        VibrationPattern::GentlePulse
    }
}

impl VibrationPattern {
    /// All patterns in display order: continuous first, then auto-stop.
    pub const ALL: [VibrationPattern; 7] = [
        VibrationPattern::GentlePulse,
        VibrationPattern::QuickPulse,
        VibrationPattern::Wave,
        VibrationPattern::Escalating,
        VibrationPattern::GentleBells,
        VibrationPattern::TripleChime,
        VibrationPattern::FadeOut,
    ];

    pub fn spec(self) -> &'static PatternSpec {
        match self {
            VibrationPattern::GentlePulse => &GENTLE_PULSE,
            VibrationPattern::QuickPulse => &QUICK_PULSE,
            VibrationPattern::Wave => &WAVE,
            VibrationPattern::Escalating => &ESCALATING,
            VibrationPattern::GentleBells => &GENTLE_BELLS,
            VibrationPattern::TripleChime => &TRIPLE_CHIME,
            VibrationPattern::FadeOut => &FADE_OUT,
        }
    }

    /// Stable identifier used when persisting the choice.
    pub fn key(self) -> &'static str {
        self.spec().key
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn waveform(self) -> Waveform {
        self.spec().waveform
    }

    pub fn is_looping(self) -> bool {
        self.spec().looping
    }

    /// Exact lookup by persisted key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|pattern| pattern.key() == key)
    }

    pub fn continuous() -> impl Iterator<Item = VibrationPattern> {
        Self::ALL.into_iter().filter(|pattern| pattern.is_looping())
    }

    pub fn finite() -> impl Iterator<Item = VibrationPattern> {
        Self::ALL.into_iter().filter(|pattern| !pattern.is_looping())
    }
}

impl fmt::Display for VibrationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a pattern name matches nothing in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPattern(pub String);

impl fmt::Display for UnknownPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown vibration pattern '{}'", self.0)
    }
}

impl std::error::Error for UnknownPattern {}

impl FromStr for VibrationPattern {
    type Err = UnknownPattern;

    /// Lenient parse for user input: accepts the key, the label, or either
    /// with any case and `-`/`_`/space as separators.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(input);
        Self::ALL
            .into_iter()
            .find(|pattern| normalize(pattern.key()) == wanted || normalize(pattern.label()) == wanted)
            .ok_or_else(|| UnknownPattern(input.to_string()))
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_the_first_continuous_pattern() {
        assert_eq!(
            VibrationPattern::continuous().next(),
            Some(VibrationPattern::default())
        );
    }

    #[test]
    fn registry_splits_four_continuous_and_three_finite() {
        assert_eq!(VibrationPattern::continuous().count(), 4);
        assert_eq!(VibrationPattern::finite().count(), 3);
        assert!(VibrationPattern::Wave.is_looping());
        assert!(!VibrationPattern::GentleBells.is_looping());
    }

    #[test]
    fn keys_are_unique_and_round_trip() {
        for pattern in VibrationPattern::ALL {
            assert_eq!(VibrationPattern::from_key(pattern.key()), Some(pattern));
        }
        assert_eq!(VibrationPattern::from_key("OLD_GENTLE"), None);
    }

    #[test]
    fn every_waveform_starts_silent_and_vibrates() {
        for pattern in VibrationPattern::ALL {
            let timings = pattern.waveform().timings();
            assert!(timings.len() >= 2, "{pattern}");
            assert!(
                timings.iter().skip(1).step_by(2).any(|&ms| ms > 0),
                "{pattern} never vibrates"
            );
        }
    }

    #[test]
    fn baked_in_repetitions_match_their_names() {
        let vibrate_segments = |p: VibrationPattern| {
            p.waveform().timings().iter().skip(1).step_by(2).count()
        };
        assert_eq!(vibrate_segments(VibrationPattern::GentleBells), 6);
        assert_eq!(vibrate_segments(VibrationPattern::TripleChime), 15);
        assert_eq!(vibrate_segments(VibrationPattern::FadeOut), 4);
        assert_eq!(
            VibrationPattern::GentleBells.waveform().duration(),
            Duration::from_millis(2_220)
        );
    }

    #[test]
    fn repeat_mode_follows_the_loop_flag() {
        assert_eq!(
            RepeatMode::resolve(VibrationPattern::Wave, None),
            RepeatMode::LoopFrom(0)
        );
        assert_eq!(
            RepeatMode::resolve(VibrationPattern::FadeOut, None),
            RepeatMode::Once
        );
    }

    #[test]
    fn repeat_override_wins() {
        assert_eq!(
            RepeatMode::resolve(VibrationPattern::Wave, Some(-1)),
            RepeatMode::Once
        );
        assert_eq!(
            RepeatMode::resolve(VibrationPattern::FadeOut, Some(3)),
            RepeatMode::LoopFrom(3)
        );
        assert_eq!(
            RepeatMode::resolve(VibrationPattern::FadeOut, Some(99)),
            RepeatMode::Once
        );
    }

    #[test]
    fn parses_keys_and_labels_leniently() {
        assert_eq!("gentle bells".parse(), Ok(VibrationPattern::GentleBells));
        assert_eq!("TRIPLE_CHIME".parse(), Ok(VibrationPattern::TripleChime));
        assert_eq!("fade-out".parse(), Ok(VibrationPattern::FadeOut));
        assert!("OLD_GENTLE".parse::<VibrationPattern>().is_err());
    }
}
