//! The background service that owns and drives the countdown session.

use crate::common::CommandId;
use crate::components::notification::{NoticeAction, NoticePublisher, ProgressSurface, SilentSurface};
use crate::config::StillnessConfig;
use crate::error::{Result, StillnessError};
use crate::events::{SystemEvent, TimerCommand, TimerEvent, TimerSnapshot};
use crate::session::{TimerSession, Transition};
use crate::time::Ticker;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// A command tagged with the id the sender was handed back.
#[derive(Debug)]
struct Envelope {
    id: CommandId,
    command: TimerCommand,
}

/// The countdown service.
///
/// The engine is a cloneable handle to a single background task that owns the
/// `TimerSession`. That task is the only writer: commands arrive on a channel
/// and are applied one at a time, interleaved with ticks in the same loop, so
/// no tick can ever be applied after a STOP that arrived before it.
///
/// The task is provisioned by the first START and then lives until
/// `shutdown`, independently of any UI that subscribes to it. Snapshots are
/// published on a `watch` channel, so a subscriber attaching at any time reads
/// the current state immediately.
#[derive(Clone)]
pub struct TimerEngine {
    tick_period: Duration,
    throttle_notices: bool,
    surface: Arc<dyn ProgressSurface>,
    command_sender: mpsc::UnboundedSender<Envelope>,
    command_receiver: Arc<Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>>,
    snapshot_sender: Arc<watch::Sender<TimerSnapshot>>,
    timer_event_sender: broadcast::Sender<TimerEvent>,
    system_event_sender: broadcast::Sender<SystemEvent>,
    shutdown_sender: broadcast::Sender<()>,
    next_command: Arc<AtomicU64>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    is_shut_down: Arc<AtomicBool>,
}

/// Loop-local state of the engine task.
struct Driver {
    session: TimerSession,
    ticker: Ticker,
    notices: NoticePublisher,
    acknowledged: CommandId,
    revision: u64,
}

// Core implementation block for internal logic.
impl TimerEngine {
    /// Creates an engine with no progress surface attached.
    pub fn new(config: &StillnessConfig) -> Self {
        Self::with_surface(config, Arc::new(SilentSurface))
    }

    /// Creates an engine that mirrors its state onto `surface`.
    pub fn with_surface(config: &StillnessConfig, surface: Arc<dyn ProgressSurface>) -> Self {
        let (command_sender, command_receiver) = mpsc::unbounded_channel();
        let (snapshot_sender, _) = watch::channel(TimerSnapshot::initial());
        let (timer_event_sender, _) = broadcast::channel(64);
        let (system_event_sender, _) = broadcast::channel(16);
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            tick_period: config.tick.period(),
            throttle_notices: config.notification.throttle,
            surface,
            command_sender,
            command_receiver: Arc::new(Mutex::new(Some(command_receiver))),
            snapshot_sender: Arc::new(snapshot_sender),
            timer_event_sender,
            system_event_sender,
            shutdown_sender,
            next_command: Arc::new(AtomicU64::new(1)),
            task: Arc::new(Mutex::new(None)),
            is_shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the engine task unless it is already running.
    fn provision(&self) -> Result<()> {
        let mut task = lock(&self.task);
        if task.is_some() {
            return Ok(());
        }
        let runtime = Handle::try_current().map_err(|_| StillnessError::NoRuntime)?;
        let Some(commands) = lock(&self.command_receiver).take() else {
            return Err(StillnessError::EngineStopped);
        };

        let shutdown_rx = self.shutdown_sender.subscribe();
        let engine = self.clone();
        *task = Some(runtime.spawn(async move { engine.engine_loop(commands, shutdown_rx).await }));
        Ok(())
    }

    #[doc(hidden)]
    async fn engine_loop(
        self,
        mut commands: mpsc::UnboundedReceiver<Envelope>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!(tick = ?self.tick_period, "TimerEngine starting up...");
        self.system_event_sender
            .send(SystemEvent::EngineStarted {
                timestamp: tokio::time::Instant::now(),
            })
            .ok();

        let mut driver = Driver {
            session: TimerSession::new(),
            ticker: Ticker::new(self.tick_period),
            notices: NoticePublisher::new(self.surface.clone(), self.throttle_notices),
            acknowledged: CommandId::default(),
            revision: self.snapshot_sender.borrow().revision,
        };

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                envelope = commands.recv() => match envelope {
                    Some(envelope) => self.apply_command(&mut driver, envelope),
                    None => break,
                },
                now = driver.ticker.tick() => self.apply_tick(&mut driver, now),
            }
        }

        driver.notices.clear();
        self.system_event_sender
            .send(SystemEvent::EngineShutdown)
            .ok();
        info!("TimerEngine has shut down.");
    }

    #[doc(hidden)]
    fn apply_command(&self, driver: &mut Driver, envelope: Envelope) {
        let Envelope { id, command } = envelope;
        let now = tokio::time::Instant::now();
        driver.acknowledged = id;

        let transition = match command {
            TimerCommand::Start { total, remaining } => {
                driver.session.start(total, remaining, now)
            }
            TimerCommand::Pause => driver.session.pause(now),
            TimerCommand::Resume => driver.session.resume(now),
            TimerCommand::Stop => driver.session.stop(),
        };

        let Some(transition) = transition else {
            debug!(command = %id, ?command, phase = ?driver.session.phase(), "Ignoring command");
            // Every command is acknowledged, even when it changed nothing.
            self.publish(driver);
            return;
        };

        if !driver.session.is_ticking() {
            driver.ticker.disarm();
        } else if matches!(transition, Transition::Started | Transition::Resumed) {
            // Restarts and resumes get a fresh tick stream.
            driver.ticker.arm();
        }
        info!(
            command = %id,
            session = %driver.session.id(),
            ?transition,
            remaining = ?driver.session.remaining(),
            "Timer transition"
        );
        self.publish(driver);
        self.emit(driver, transition);
    }

    #[doc(hidden)]
    fn apply_tick(&self, driver: &mut Driver, now: tokio::time::Instant) {
        match driver.session.tick(now) {
            Some(Transition::Completed) => {
                info!(session = %driver.session.id(), "Timer completed!");
                self.publish(driver);
                self.emit(driver, Transition::Completed);
                driver.ticker.disarm();
            }
            Some(_) => {
                trace!(remaining = ?driver.session.remaining(), "Tick");
                self.publish(driver);
            }
            None => driver.ticker.disarm(),
        }
    }

    #[doc(hidden)]
    fn publish(&self, driver: &mut Driver) {
        driver.revision += 1;
        let snapshot = TimerSnapshot {
            session: driver.session.id(),
            total: driver.session.total(),
            remaining: driver.session.remaining(),
            phase: driver.session.phase(),
            revision: driver.revision,
            acknowledged: driver.acknowledged,
            at: Utc::now(),
        };
        driver.notices.offer(&snapshot);
        self.snapshot_sender.send_replace(snapshot);
    }

    #[doc(hidden)]
    fn emit(&self, driver: &Driver, transition: Transition) {
        let session = driver.session.id();
        let at = Utc::now();
        let event = match transition {
            Transition::Started => TimerEvent::Started {
                session,
                total: driver.session.total(),
                remaining: driver.session.remaining(),
                at,
            },
            Transition::Paused => TimerEvent::Paused {
                session,
                remaining: driver.session.remaining(),
                at,
            },
            Transition::Resumed => TimerEvent::Resumed {
                session,
                remaining: driver.session.remaining(),
                at,
            },
            Transition::Stopped => TimerEvent::Stopped { session, at },
            Transition::Completed => TimerEvent::Completed { session, at },
            Transition::Ticked => return,
        };
        self.timer_event_sender.send(event).ok();
    }
}

// Public API implementation block.
impl TimerEngine {
    /// Sends a command to the engine and returns the id it was tagged with.
    ///
    /// A START provisions the engine task if it is not running yet. Any other
    /// command sent before the first START has nothing to act on and is
    /// dropped. Must be called from within a tokio runtime.
    pub fn send(&self, command: TimerCommand) -> Result<CommandId> {
        if self.is_shut_down.load(Ordering::Acquire) {
            return Err(StillnessError::EngineStopped);
        }
        let id = CommandId(self.next_command.fetch_add(1, Ordering::Relaxed));

        if !self.is_provisioned() {
            if !matches!(command, TimerCommand::Start { .. }) {
                debug!(command = %id, ?command, "Engine not running; ignoring command");
                return Ok(id);
            }
            self.provision()?;
        }

        self.command_sender
            .send(Envelope { id, command })
            .map_err(|_| StillnessError::EngineStopped)?;
        Ok(id)
    }

    /// Starts (or restarts) a countdown of `total`.
    pub fn start(&self, total: Duration) -> Result<CommandId> {
        self.send(TimerCommand::start(total))
    }

    /// Starts a countdown of `total` that has only `remaining` left.
    pub fn start_from(&self, total: Duration, remaining: Duration) -> Result<CommandId> {
        self.send(TimerCommand::Start {
            total,
            remaining: Some(remaining),
        })
    }

    pub fn pause(&self) -> Result<CommandId> {
        self.send(TimerCommand::Pause)
    }

    pub fn resume(&self) -> Result<CommandId> {
        self.send(TimerCommand::Resume)
    }

    pub fn stop(&self) -> Result<CommandId> {
        self.send(TimerCommand::Stop)
    }

    /// Handles a button pressed on the progress notice.
    pub fn handle_notice_action(&self, action: NoticeAction) -> Result<CommandId> {
        self.send(action.command())
    }

    /// Whether the background task has been spawned.
    pub fn is_provisioned(&self) -> bool {
        lock(&self.task).is_some()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> TimerSnapshot {
        self.snapshot_sender.borrow().clone()
    }

    /// Subscribes to snapshots. The receiver sees the current snapshot at once.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshot_sender.subscribe()
    }

    /// Subscribes to the `TimerEvent` stream.
    pub fn subscribe_timer_events(&self) -> broadcast::Receiver<TimerEvent> {
        self.timer_event_sender.subscribe()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }

    /// Stops the engine task and waits for it to exit.
    ///
    /// The last snapshot stays readable. Later commands fail with
    /// `StillnessError::EngineStopped`.
    pub async fn shutdown(&self) {
        if self.is_shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Shutdown requested. Stopping the timer engine...");
        let task = lock(&self.task).take();
        match task {
            Some(task) => {
                self.shutdown_sender.send(()).ok();
                if let Err(e) = task.await {
                    warn!("Timer engine task ended abnormally: {}", e);
                }
            }
            None => {
                lock(&self.command_receiver).take();
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
