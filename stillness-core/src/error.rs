//! Error types for the Stillness core.
//!
//! Timer and haptic operations never fail: invalid or redundant requests are
//! absorbed as no-ops. Errors only exist at the edges of the crate, where
//! configuration and preference files are read or written, or where a caller
//! talks to an engine that has already been shut down.

use thiserror::Error;

/// Core error type for the Stillness crate.
#[derive(Error, Debug)]
pub enum StillnessError {
    /// Configuration could not be read or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// IO errors from the preference file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The preference file is not valid TOML.
    #[error("Preference file parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// Preferences could not be serialized.
    #[error("Preference file serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// The timer engine task has shut down and no longer accepts commands.
    #[error("Timer engine has shut down")]
    EngineStopped,

    /// The timer engine was asked to start outside of a tokio runtime.
    #[error("No async runtime available to run the timer engine")]
    NoRuntime,
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, StillnessError>;
