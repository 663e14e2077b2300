//! The countdown session state machine.
//!
//! `TimerSession` is a pure, clock-driven state machine. It owns no tasks and
//! never reads the clock itself: every transition receives the current
//! instant, which keeps it trivially testable and lets the engine decide when
//! time is observed.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//! Running --(remaining hits 0)--> Completed
//! Running | Paused | Completed --stop--> Idle
//! ```
//!
//! While running, remaining time is derived from a monotonic deadline rather
//! than decremented per tick, so late or skipped ticks never skew the count.

use crate::common::SessionId;
use crate::events::TimerPhase;
use std::time::Duration;
use tokio::time::Instant;

/// What a command or tick did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Paused,
    Resumed,
    Stopped,
    Ticked,
    Completed,
}

#[derive(Debug, Clone)]
pub struct TimerSession {
    id: SessionId,
    total: Duration,
    remaining: Duration,
    phase: TimerPhase,
    /// Set only while `Running`.
    deadline: Option<Instant>,
}

impl Default for TimerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerSession {
    pub fn new() -> Self {
        Self {
            id: SessionId::default(),
            total: Duration::ZERO,
            remaining: Duration::ZERO,
            phase: TimerPhase::Idle,
            deadline: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn is_ticking(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    /// Begins a new session, replacing whatever was there.
    ///
    /// `remaining` defaults to `total` and is clamped to it. A zero total,
    /// nothing left to count down, or a deadline the clock cannot represent
    /// is rejected.
    pub fn start(
        &mut self,
        total: Duration,
        remaining: Option<Duration>,
        now: Instant,
    ) -> Option<Transition> {
        let remaining = remaining.unwrap_or(total).min(total);
        if total.is_zero() || remaining.is_zero() {
            return None;
        }
        let deadline = now.checked_add(remaining)?;
        self.id = self.id.next();
        self.total = total;
        self.remaining = remaining;
        self.phase = TimerPhase::Running;
        self.deadline = Some(deadline);
        Some(Transition::Started)
    }

    /// Freezes the countdown. A pause that lands on or after the deadline
    /// completes the session instead of leaving a paused zero behind.
    pub fn pause(&mut self, now: Instant) -> Option<Transition> {
        if self.phase != TimerPhase::Running {
            return None;
        }
        self.flush(now);
        if self.remaining.is_zero() {
            return Some(self.complete());
        }
        self.phase = TimerPhase::Paused;
        self.deadline = None;
        Some(Transition::Paused)
    }

    /// Continues from the frozen remaining time.
    pub fn resume(&mut self, now: Instant) -> Option<Transition> {
        if self.phase != TimerPhase::Paused {
            return None;
        }
        let deadline = now.checked_add(self.remaining)?;
        self.phase = TimerPhase::Running;
        self.deadline = Some(deadline);
        Some(Transition::Resumed)
    }

    /// Resets to idle with the full duration restored. Also used to dismiss
    /// a completed session.
    pub fn stop(&mut self) -> Option<Transition> {
        if self.phase == TimerPhase::Idle {
            return None;
        }
        self.phase = TimerPhase::Idle;
        self.remaining = self.total;
        self.deadline = None;
        Some(Transition::Stopped)
    }

    /// Re-evaluates the remaining time. Only meaningful while running.
    pub fn tick(&mut self, now: Instant) -> Option<Transition> {
        if self.phase != TimerPhase::Running {
            return None;
        }
        self.flush(now);
        if self.remaining.is_zero() {
            Some(self.complete())
        } else {
            Some(Transition::Ticked)
        }
    }

    fn flush(&mut self, now: Instant) {
        if let Some(deadline) = self.deadline {
            let left = deadline.saturating_duration_since(now);
            // Monotonic even if a caller hands in a stale instant.
            self.remaining = self.remaining.min(left);
        }
    }

    fn complete(&mut self) -> Transition {
        self.phase = TimerPhase::Completed;
        self.remaining = Duration::ZERO;
        self.deadline = None;
        Transition::Completed
    }
}
