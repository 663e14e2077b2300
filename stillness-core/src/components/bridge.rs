//! Connects the timer engine to a presentation layer.
//!
//! The bridge owns the UI-local duration selection, merges it with the
//! engine's snapshots into one `ViewState`, and translates user intent into
//! engine commands. It also sounds the completion alert.
//!
//! Commands update the view optimistically. The provisional state is tagged
//! with the `CommandId` the engine handed back and is dropped as soon as a
//! snapshot acknowledges that command, so the engine always has the last word.

use crate::common::{CommandId, SessionId};
use crate::components::haptics::VibrationEngine;
use crate::components::selector::DurationSelector;
use crate::engine::TimerEngine;
use crate::error::Result;
use crate::events::{TimerPhase, TimerSnapshot};
use crate::preferences::Preferences;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything a timer screen needs to render itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewState {
    pub selected_seconds: Option<u32>,
    pub total: Duration,
    pub remaining: Duration,
    /// True while counting down or paused mid-way.
    pub is_running: bool,
    pub is_paused: bool,
    pub is_completed: bool,
}

impl ViewState {
    pub fn phase(&self) -> TimerPhase {
        if self.is_completed {
            TimerPhase::Completed
        } else if self.is_paused {
            TimerPhase::Paused
        } else if self.is_running {
            TimerPhase::Running
        } else {
            TimerPhase::Idle
        }
    }

    /// Fraction of the session already elapsed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        let elapsed = self.total.saturating_sub(self.remaining);
        (elapsed.as_secs_f64() / self.total.as_secs_f64()).clamp(0.0, 1.0)
    }
}

/// State the bridge assumes until the engine acknowledges a command.
#[derive(Debug, Clone, Copy)]
struct Provisional {
    phase: TimerPhase,
    awaiting: CommandId,
    /// `(total, remaining)` to show meanwhile, when the snapshot can't say.
    display: Option<(Duration, Duration)>,
}

struct BridgeState {
    selector: DurationSelector,
    snapshot: TimerSnapshot,
    provisional: Option<Provisional>,
    alerted: Option<SessionId>,
}

impl BridgeState {
    fn phase(&self) -> TimerPhase {
        self.provisional
            .map(|provisional| provisional.phase)
            .unwrap_or(self.snapshot.phase)
    }

    fn is_running(&self) -> bool {
        matches!(self.phase(), TimerPhase::Running | TimerPhase::Paused)
    }

    fn view(&self) -> ViewState {
        let phase = self.phase();
        let snapshot = &self.snapshot;
        let (total, remaining) = match self.provisional.and_then(|provisional| provisional.display) {
            Some(display) => display,
            None if phase.is_active() && snapshot.phase.is_active() => {
                (snapshot.total, snapshot.remaining)
            }
            None => match self.selector.selected_seconds() {
                Some(_) => {
                    let selected = self.selector.selected_duration();
                    (selected, selected)
                }
                None => (snapshot.total, snapshot.total),
            },
        };

        ViewState {
            selected_seconds: self.selector.selected_seconds(),
            total,
            remaining,
            is_running: matches!(phase, TimerPhase::Running | TimerPhase::Paused),
            is_paused: phase == TimerPhase::Paused,
            is_completed: phase == TimerPhase::Completed,
        }
    }
}

struct BridgeShared {
    engine: TimerEngine,
    haptics: VibrationEngine,
    preferences: Preferences,
    state: Mutex<BridgeState>,
    view_sender: watch::Sender<ViewState>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for BridgeShared {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.sync_task).take() {
            task.abort();
        }
    }
}

/// The view model between a `TimerEngine` and a screen.
#[derive(Clone)]
pub struct TimerBridge {
    shared: Arc<BridgeShared>,
}

impl TimerBridge {
    /// Creates a detached bridge seeded with the engine's current snapshot.
    pub fn new(engine: TimerEngine, haptics: VibrationEngine, preferences: Preferences) -> Self {
        let snapshot = engine.snapshot();
        let state = BridgeState {
            selector: DurationSelector::new(),
            snapshot,
            provisional: None,
            alerted: None,
        };
        let (view_sender, _) = watch::channel(state.view());
        Self {
            shared: Arc::new(BridgeShared {
                engine,
                haptics,
                preferences,
                state: Mutex::new(state),
                view_sender,
                sync_task: Mutex::new(None),
            }),
        }
    }

    /// Starts following the engine's snapshots.
    ///
    /// The current snapshot is applied before this returns, so a bridge
    /// attached mid-session shows the live state at once. Attaching twice is
    /// a no-op. Without a tokio runtime only the seeding happens.
    pub fn attach(&self) {
        let mut sync_task = lock(&self.shared.sync_task);
        if sync_task.is_some() {
            return;
        }

        let mut snapshots = self.shared.engine.subscribe_snapshots();
        let current = snapshots.borrow_and_update().clone();
        self.shared.on_snapshot(current);

        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime; the bridge will not follow the timer");
            return;
        };
        let shared = Arc::downgrade(&self.shared);
        *sync_task = Some(runtime.spawn(follow_snapshots(shared, snapshots)));
        debug!("Bridge attached");
    }

    /// Stops following the engine. The engine keeps running.
    pub fn detach(&self) {
        if let Some(task) = lock(&self.shared.sync_task).take() {
            task.abort();
            debug!("Bridge detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.shared.sync_task).is_some()
    }

    /// The current merged view.
    pub fn view(&self) -> ViewState {
        *self.shared.view_sender.borrow()
    }

    /// Subscribes to view changes; the current view is readable immediately.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.shared.view_sender.subscribe()
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.shared.engine
    }

    pub fn haptics(&self) -> &VibrationEngine {
        &self.shared.haptics
    }

    pub fn preferences(&self) -> &Preferences {
        &self.shared.preferences
    }

    /// Selects an exact duration. Ignored while a session is running.
    pub fn select_exact(&self, seconds: u32) -> bool {
        let mut state = self.shared.lock_state();
        let running = state.is_running();
        let changed = state.selector.select_exact(seconds, running);
        if changed {
            self.shared.republish(&state);
        } else {
            debug!(seconds, running, "Selection unchanged");
        }
        changed
    }

    /// Adds to the current selection. Ignored while a session is running.
    pub fn add_seconds(&self, delta: u32) -> bool {
        let mut state = self.shared.lock_state();
        let running = state.is_running();
        let changed = state.selector.add_seconds(delta, running);
        if changed {
            self.shared.republish(&state);
        } else {
            debug!(delta, running, "Selection unchanged");
        }
        changed
    }

    /// Starts a session with the displayed duration.
    ///
    /// When paused, the new session picks up from the paused remaining time.
    /// Does nothing when there is no duration to count down.
    pub fn start_timer(&self) {
        let mut state = self.shared.lock_state();
        let view = state.view();
        if view.total.is_zero() {
            debug!("Nothing selected; not starting");
            return;
        }
        let remaining = if view.is_paused { view.remaining } else { view.total };
        let result = self.shared.engine.start_from(view.total, remaining);
        self.shared.dispatch(
            &mut state,
            result,
            TimerPhase::Running,
            Some((view.total, remaining)),
        );
    }

    pub fn pause_timer(&self) {
        let mut state = self.shared.lock_state();
        if state.phase() != TimerPhase::Running {
            debug!(phase = ?state.phase(), "Not running; pause ignored");
            return;
        }
        let result = self.shared.engine.pause();
        self.shared.dispatch(&mut state, result, TimerPhase::Paused, None);
    }

    pub fn resume_timer(&self) {
        let mut state = self.shared.lock_state();
        if state.phase() != TimerPhase::Paused {
            debug!(phase = ?state.phase(), "Not paused; resume ignored");
            return;
        }
        let result = self.shared.engine.resume();
        self.shared.dispatch(&mut state, result, TimerPhase::Running, None);
    }

    /// Silences any alert and resets the session to idle.
    pub fn stop_timer(&self) {
        self.shared.halt("stop");
    }

    /// Dismisses a completed session: silences the alert and returns to idle.
    pub fn reset_after_completion(&self) {
        self.shared.halt("dismiss");
    }
}

impl BridgeShared {
    fn lock_state(&self) -> MutexGuard<'_, BridgeState> {
        lock(&self.state)
    }

    fn on_snapshot(&self, snapshot: TimerSnapshot) {
        let mut state = self.lock_state();
        if snapshot.revision < state.snapshot.revision {
            return;
        }

        if let Some(provisional) = state.provisional {
            if snapshot.acknowledged >= provisional.awaiting {
                state.provisional = None;
            }
        }

        let entered_completion =
            snapshot.is_completed() && state.alerted != Some(snapshot.session);
        let left_alerted_completion = state.snapshot.is_completed()
            && state.alerted == Some(state.snapshot.session)
            && !(snapshot.is_completed() && snapshot.session == state.snapshot.session);
        let session = snapshot.session;
        state.snapshot = snapshot;

        // The core may be stopped without going through this bridge.
        if left_alerted_completion {
            debug!(%session, "Completed session left; silencing alert");
            self.haptics.cancel();
        }

        if entered_completion {
            state.alerted = Some(session);
            // A stop already on its way wins over the alert.
            if state.phase() == TimerPhase::Idle {
                debug!(%session, "Completion superseded by a pending stop");
            } else {
                let pattern = self.preferences.vibration_pattern();
                info!(%session, pattern = pattern.key(), "Session complete; sounding alert");
                self.haptics.play(pattern, None);
            }
        }
        self.republish(&state);
    }

    /// Records the optimistic outcome of a command the engine accepted.
    fn dispatch(
        &self,
        state: &mut BridgeState,
        result: Result<CommandId>,
        phase: TimerPhase,
        display: Option<(Duration, Duration)>,
    ) {
        match result {
            Ok(awaiting) => {
                state.provisional = Some(Provisional {
                    phase,
                    awaiting,
                    display,
                });
                self.republish(state);
            }
            Err(e) => warn!("Timer command failed: {}", e),
        }
    }

    fn halt(&self, reason: &'static str) {
        let mut state = self.lock_state();
        self.haptics.cancel();
        if !state.phase().is_active() {
            debug!(reason, "Already idle");
            return;
        }
        info!(reason, "Resetting timer");
        let result = self.engine.stop();
        self.dispatch(&mut state, result, TimerPhase::Idle, None);
    }

    fn republish(&self, state: &BridgeState) {
        let view = state.view();
        self.view_sender.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });
    }
}

async fn follow_snapshots(shared: Weak<BridgeShared>, mut snapshots: watch::Receiver<TimerSnapshot>) {
    while snapshots.changed().await.is_ok() {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let snapshot = snapshots.borrow_and_update().clone();
        shared.on_snapshot(snapshot);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
