//! Defines all public state and event types published by the Stillness core.
//!
//! The snapshot is the only channel through which observers learn of
//! progress. Lifecycle and system events are convenience streams layered on
//! top of it for listeners that only care about transitions.

use crate::common::{CommandId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The phase of a countdown session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

impl TimerPhase {
    /// True for the phases in which a session is live and owns the display.
    pub fn is_active(self) -> bool {
        !matches!(self, TimerPhase::Idle)
    }
}

/// The full observable state of the countdown at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    /// The session this snapshot belongs to. `SessionId(0)` before any start.
    pub session: SessionId,
    pub total: Duration,
    pub remaining: Duration,
    pub phase: TimerPhase,
    /// Publication counter; strictly increasing across the engine's lifetime.
    pub revision: u64,
    /// The last command the engine processed when this snapshot was taken.
    pub acknowledged: CommandId,
    pub at: DateTime<Utc>,
}

impl TimerSnapshot {
    /// The snapshot an engine publishes before it has ever been started.
    pub fn initial() -> Self {
        Self {
            session: SessionId::default(),
            total: Duration::ZERO,
            remaining: Duration::ZERO,
            phase: TimerPhase::Idle,
            revision: 0,
            acknowledged: CommandId::default(),
            at: Utc::now(),
        }
    }

    /// A session is running while it is counting down or paused mid-way.
    pub fn is_running(&self) -> bool {
        matches!(self.phase, TimerPhase::Running | TimerPhase::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.phase == TimerPhase::Paused
    }

    pub fn is_completed(&self) -> bool {
        self.phase == TimerPhase::Completed
    }

    /// Time already counted down in this session.
    pub fn elapsed(&self) -> Duration {
        self.total.saturating_sub(self.remaining)
    }
}

/// An inbound command for the timer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Begin or restart a countdown. `remaining` defaults to `total`.
    Start {
        total: Duration,
        remaining: Option<Duration>,
    },
    Pause,
    Resume,
    Stop,
}

impl TimerCommand {
    /// A start command that counts down the full `total`.
    pub fn start(total: Duration) -> Self {
        TimerCommand::Start {
            total,
            remaining: None,
        }
    }
}

/// Transitions of the countdown session, broadcast once each.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    /// Fired when a START is accepted.
    Started {
        session: SessionId,
        total: Duration,
        remaining: Duration,
        at: DateTime<Utc>,
    },
    /// Fired when a running session is frozen.
    Paused {
        session: SessionId,
        remaining: Duration,
        at: DateTime<Utc>,
    },
    /// Fired when a paused session continues.
    Resumed {
        session: SessionId,
        remaining: Duration,
        at: DateTime<Utc>,
    },
    /// Fired when a live session is reset to idle by STOP.
    Stopped {
        session: SessionId,
        at: DateTime<Utc>,
    },
    /// Fired exactly once when a session counts down to zero.
    Completed {
        session: SessionId,
        at: DateTime<Utc>,
    },
}

/// Events related to the lifecycle of the engine task itself.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when the engine task is provisioned.
    EngineStarted { timestamp: tokio::time::Instant },
    /// Fired once when the engine task is about to exit.
    EngineShutdown,
}
