//! Contains common, primitive types shared across the Stillness core.
//!
//! This module defines the identifier types used to tell sessions and commands
//! apart, plus the duration bounds every selection is clamped to. Using
//! distinct types keeps a session id from being mistaken for a command id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shortest duration a user can select, in seconds.
pub const MIN_SELECTABLE_SECONDS: u32 = 1;

/// Longest duration a user can select, in seconds (12 hours).
pub const MAX_SELECTABLE_SECONDS: u32 = 43_200;

/// Identifies one countdown session.
///
/// The engine allocates a fresh id on every accepted START, so two sessions of
/// identical length are still distinguishable by observers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    pub(crate) fn next(self) -> Self {
        SessionId(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Identifies a command sent to the timer engine.
///
/// Ids are handed out in send order. Every snapshot carries the id of the
/// last command the engine processed, which is how the bridge reconciles its
/// optimistic state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CommandId(pub u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd#{}", self.0)
    }
}
