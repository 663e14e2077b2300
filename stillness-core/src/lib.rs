//! # Stillness
//!
//! The core of a meditation timer: a countdown engine that keeps running with
//! or without a UI, a haptic alert engine, and the glue a screen needs.
//!
//! ## Core Concepts
//!
//! - **TimerEngine**: A background task that owns the countdown session. It is
//!   the single writer of timer state, driven by commands and its own ticker,
//!   and publishes a full `TimerSnapshot` after every change.
//! - **Last-value snapshots**: Snapshots travel on a `watch` channel, so an
//!   observer attaching at any time reads the current state immediately.
//! - **VibrationEngine**: Plays a `VibrationPattern` on a `HapticDevice`.
//!   Continuous patterns loop until cancelled; finite ones stop by themselves.
//! - **TimerBridge**: Merges the engine's snapshots with the user's local
//!   duration selection into a `ViewState`, forwards user intent to the engine
//!   and sounds the alert once per completed session.
//! - **Configuration-Driven**: Tick speed, notification cadence and the
//!   preference location come from a `StillnessConfig`, usually loaded from
//!   `stillness.toml`.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use stillness::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StillnessConfig::load(None)?;
//!     let engine = TimerEngine::new(&config);
//!     let haptics = VibrationEngine::new(Arc::new(NoHaptics));
//!     let preferences = Preferences::open(&config)?;
//!
//!     let bridge = TimerBridge::new(engine.clone(), haptics, preferences);
//!     bridge.attach();
//!     bridge.select_exact(5 * 60);
//!     bridge.start_timer();
//!
//!     let mut view = bridge.subscribe();
//!     while view.changed().await.is_ok() {
//!         if view.borrow().is_completed {
//!             break;
//!         }
//!     }
//!     bridge.reset_after_completion();
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Stillness Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod preferences;
pub mod session;
pub(crate) mod time;

/// A prelude module for easy importing of the most common Stillness types.
pub mod prelude {
    pub use crate::common::{CommandId, SessionId};
    pub use crate::components::bridge::{TimerBridge, ViewState};
    pub use crate::components::haptics::{HapticDevice, NoHaptics, PlaybackStatus, VibrationEngine};
    pub use crate::components::notification::{
        NoticeAction, ProgressNotice, ProgressSurface, SilentSurface,
    };
    pub use crate::components::pattern::{RepeatMode, VibrationPattern};
    pub use crate::config::{StillnessConfig, TickResolution};
    pub use crate::engine::TimerEngine;
    pub use crate::error::StillnessError;
    pub use crate::events::{SystemEvent, TimerCommand, TimerEvent, TimerPhase, TimerSnapshot};
    pub use crate::preferences::{MemoryStore, PreferenceStore, Preferences, TomlFileStore};
}
