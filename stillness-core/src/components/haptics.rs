//! Drives a haptic motor through vibration pattern waveforms.
//!
//! The motor is a single shared device, so at most one pattern plays at a
//! time: a new `play` supersedes whatever is running. Every playback gets a
//! generation number, and the motor is only ever switched while holding the
//! playback lock and only by the current generation. Once `cancel` returns,
//! a superseded driver can no longer touch the motor.

use crate::components::pattern::{RepeatMode, VibrationPattern, Waveform};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The motor the engine drives.
pub trait HapticDevice: Send + Sync + 'static {
    /// Whether the host actually has a vibrator. When false, playback is a no-op.
    fn has_vibrator(&self) -> bool;
    fn motor_on(&self);
    fn motor_off(&self);
}

/// A host without any haptic hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHaptics;

impl HapticDevice for NoHaptics {
    fn has_vibrator(&self) -> bool {
        false
    }
    fn motor_on(&self) {}
    fn motor_off(&self) {}
}

/// What the motor is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Playing {
        pattern: VibrationPattern,
        mode: RepeatMode,
    },
}

impl PlaybackStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackStatus::Playing { .. })
    }
}

#[derive(Default)]
struct Playback {
    generation: u64,
    driver: Option<JoinHandle<()>>,
}

/// Plays vibration patterns on a `HapticDevice`.
#[derive(Clone)]
pub struct VibrationEngine {
    device: Arc<dyn HapticDevice>,
    playback: Arc<Mutex<Playback>>,
    status_sender: Arc<watch::Sender<PlaybackStatus>>,
}

impl VibrationEngine {
    pub fn new(device: Arc<dyn HapticDevice>) -> Self {
        let (status_sender, _) = watch::channel(PlaybackStatus::Idle);
        Self {
            device,
            playback: Arc::new(Mutex::new(Playback::default())),
            status_sender: Arc::new(status_sender),
        }
    }

    /// Starts playing `pattern`, replacing anything already playing.
    ///
    /// Without an override the pattern's own loop flag decides: continuous
    /// patterns loop from the start until `cancel`, finite ones play once and
    /// stop by themselves. See `RepeatMode::resolve` for override semantics.
    /// Must be called from within a tokio runtime; otherwise it is a no-op.
    pub fn play(&self, pattern: VibrationPattern, repeat_override: Option<i32>) {
        let mode = RepeatMode::resolve(pattern, repeat_override);
        if !self.device.has_vibrator() {
            debug!(pattern = pattern.key(), "No vibrator available; skipping playback");
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!(pattern = pattern.key(), "No async runtime to drive the vibrator");
            return;
        };

        let mut playback = self.lock();
        playback.generation += 1;
        if let Some(previous) = playback.driver.take() {
            previous.abort();
        }
        self.device.motor_off();

        info!(
            pattern = pattern.key(),
            looping = mode.is_looping(),
            timings = ?pattern.waveform().timings(),
            "Vibrating"
        );
        let generation = playback.generation;
        playback.driver = Some(runtime.spawn(self.clone().drive(pattern, mode, generation)));
        self.status_sender
            .send_replace(PlaybackStatus::Playing { pattern, mode });
    }

    /// Plays a single pass of `pattern`, even for continuous patterns.
    pub fn preview(&self, pattern: VibrationPattern) {
        self.play(pattern, Some(-1));
    }

    /// Halts any playback immediately. Safe to call when nothing is playing.
    pub fn cancel(&self) {
        let mut playback = self.lock();
        playback.generation += 1;
        let was_playing = match playback.driver.take() {
            Some(driver) => {
                driver.abort();
                true
            }
            None => false,
        };
        if self.device.has_vibrator() {
            self.device.motor_off();
        }
        self.status_sender.send_if_modified(|status| {
            let changed = status.is_active();
            *status = PlaybackStatus::Idle;
            changed
        });
        drop(playback);

        if was_playing {
            debug!("Cancelling vibration");
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        *self.status_sender.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    /// Subscribes to playback status changes; the current status is readable immediately.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status_sender.subscribe()
    }

    async fn drive(self, pattern: VibrationPattern, mode: RepeatMode, generation: u64) {
        let timings = pattern.waveform().timings();
        let mut index = 0;
        loop {
            let millis = timings[index];
            if millis > 0 {
                if !self.switch_motor(generation, Waveform::is_vibrate_segment(index)) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(millis)).await;
            }
            index += 1;
            if index == timings.len() {
                match mode {
                    RepeatMode::Once => break,
                    RepeatMode::LoopFrom(start) => index = start,
                }
            }
        }
        self.finish(generation, pattern);
    }

    /// Applies one segment if this driver is still the current playback.
    fn switch_motor(&self, generation: u64, vibrate: bool) -> bool {
        let playback = self.lock();
        if playback.generation != generation {
            return false;
        }
        if vibrate {
            self.device.motor_on();
        } else {
            self.device.motor_off();
        }
        true
    }

    fn finish(&self, generation: u64, pattern: VibrationPattern) {
        let mut playback = self.lock();
        if playback.generation != generation {
            return;
        }
        self.device.motor_off();
        playback.driver = None;
        self.status_sender.send_replace(PlaybackStatus::Idle);
        drop(playback);

        debug!(pattern = pattern.key(), "Vibration finished");
    }

    fn lock(&self) -> MutexGuard<'_, Playback> {
        self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for VibrationEngine {
    /// An engine with no haptic hardware behind it.
    fn default() -> Self {
        Self::new(Arc::new(NoHaptics))
    }
}
