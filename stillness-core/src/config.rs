//! Defines all configuration structures for the Stillness core.
//!
//! These structs are deserialized with `serde` from an optional `stillness.toml`
//! layered under `STILLNESS__*` environment overrides, so the tick speed,
//! notification cadence and preference location can be tuned without
//! touching application code.

use crate::error::StillnessError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Base name of the optional configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_BASENAME: &str = "stillness";

/// The top-level configuration for the `TimerEngine` and its collaborators.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StillnessConfig {
    /// How often the countdown is re-evaluated while running.
    pub tick: TickResolution,

    /// Progress notification settings.
    pub notification: NotificationConfig,

    /// Where user preferences live.
    pub preferences: PreferencesConfig,
}

/// Defines the tick granularity of the countdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickResolution {
    /// 20 ticks per second.
    Fine,
    /// 10 ticks per second.
    #[default]
    Standard,
    /// 1 tick per second. Remaining time is still exact at each tick.
    Coarse,
    /// A user-defined tick period.
    Custom { millis: u64 },
}

impl TickResolution {
    /// The period between two ticks. Never zero.
    pub fn period(&self) -> Duration {
        match self {
            TickResolution::Fine => Duration::from_millis(50),
            TickResolution::Standard => Duration::from_millis(100),
            TickResolution::Coarse => Duration::from_secs(1),
            TickResolution::Custom { millis } => Duration::from_millis((*millis).max(1)),
        }
    }
}

/// Controls how often the progress surface is re-posted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Post only when the rendered notice changes (about once per second).
    /// When false, every tick re-posts the notice.
    pub throttle: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { throttle: true }
    }
}

/// Selects the preference backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// A TOML file to persist preferences in. In-memory when unset.
    pub path: Option<PathBuf>,
}

impl StillnessConfig {
    /// Loads the configuration.
    ///
    /// With an explicit `path` the file must exist. Without one, a
    /// `stillness.toml` in the working directory is used if present. In both
    /// cases `STILLNESS__<SECTION>__<KEY>` environment variables win.
    pub fn load(path: Option<&Path>) -> Result<Self, StillnessError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_BASENAME).required(false),
        };
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("STILLNESS").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_standard_ticks_with_throttling() {
        let config = StillnessConfig::default();
        assert_eq!(config.tick, TickResolution::Standard);
        assert_eq!(config.tick.period(), Duration::from_millis(100));
        assert!(config.notification.throttle);
        assert!(config.preferences.path.is_none());
    }

    #[test]
    fn custom_zero_period_is_clamped() {
        assert_eq!(
            TickResolution::Custom { millis: 0 }.period(),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn loads_a_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
tick = {{ custom = {{ millis = 250 }} }}

[notification]
throttle = false

[preferences]
path = "/tmp/stillness-prefs.toml"
"#
        )
        .unwrap();

        let config = StillnessConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.tick, TickResolution::Custom { millis: 250 });
        assert!(!config.notification.throttle);
        assert_eq!(
            config.preferences.path.as_deref(),
            Some(Path::new("/tmp/stillness-prefs.toml"))
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = StillnessConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(StillnessError::Config(_))));
    }
}
