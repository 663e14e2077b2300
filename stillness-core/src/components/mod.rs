//! The building blocks around the timer engine.
//!
//! The selector and the bridge sit on the presentation side, the pattern
//! registry and the vibration engine drive the alert, and the notification
//! module mirrors the engine's state onto a progress surface. The
//! `TimerEngine` itself only depends on the notification module.

pub mod bridge;
pub mod haptics;
pub mod notification;
pub mod pattern;
pub mod selector;
