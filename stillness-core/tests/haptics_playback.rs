use std::sync::{Arc, Mutex};
use std::time::Duration;
use stillness::prelude::*;
use tokio::time::{sleep, Instant};

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motor {
    On,
    Off,
}

/// A vibrator that remembers every switch and when it happened.
struct RecordingDevice {
    present: bool,
    switches: Mutex<Vec<(Motor, Instant)>>,
}

impl RecordingDevice {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            present: true,
            switches: Mutex::new(Vec::new()),
        })
    }

    fn absent() -> Arc<Self> {
        Arc::new(Self {
            present: false,
            switches: Mutex::new(Vec::new()),
        })
    }

    fn pulses(&self) -> usize {
        self.switches
            .lock()
            .unwrap()
            .iter()
            .filter(|(motor, _)| *motor == Motor::On)
            .count()
    }

    fn switch_count(&self) -> usize {
        self.switches.lock().unwrap().len()
    }

    fn last(&self) -> Option<Motor> {
        self.switches.lock().unwrap().last().map(|(motor, _)| *motor)
    }
}

impl HapticDevice for RecordingDevice {
    fn has_vibrator(&self) -> bool {
        self.present
    }

    fn motor_on(&self) {
        self.switches.lock().unwrap().push((Motor::On, Instant::now()));
    }

    fn motor_off(&self) {
        self.switches.lock().unwrap().push((Motor::Off, Instant::now()));
    }
}

#[tokio::test(start_paused = true)]
async fn finite_pattern_stops_by_itself() {
    let device = RecordingDevice::new();
    let haptics = VibrationEngine::new(device.clone());

    haptics.play(VibrationPattern::GentleBells, None);
    assert_eq!(
        haptics.status(),
        PlaybackStatus::Playing {
            pattern: VibrationPattern::GentleBells,
            mode: RepeatMode::Once,
        }
    );

    sleep(ms(2_200)).await;
    assert!(haptics.is_active());

    sleep(ms(100)).await;
    assert!(!haptics.is_active());
    assert_eq!(device.pulses(), 6);
    assert_eq!(device.last(), Some(Motor::Off));
}

#[tokio::test(start_paused = true)]
async fn continuous_pattern_loops_until_cancelled() {
    let device = RecordingDevice::new();
    let haptics = VibrationEngine::new(device.clone());

    haptics.play(VibrationPattern::Wave, None);
    sleep(ms(5_000)).await;
    assert!(haptics.is_active());
    // One pass is 1.6s with five pulses.
    assert!(device.pulses() >= 15, "{} pulses", device.pulses());

    haptics.cancel();
    assert_eq!(haptics.status(), PlaybackStatus::Idle);
    assert_eq!(device.last(), Some(Motor::Off));

    let switches = device.switch_count();
    sleep(ms(5_000)).await;
    assert_eq!(device.switch_count(), switches);
}

#[tokio::test(start_paused = true)]
async fn a_new_pattern_supersedes_the_old_one() {
    let device = RecordingDevice::new();
    let haptics = VibrationEngine::new(device.clone());

    haptics.play(VibrationPattern::Wave, None);
    sleep(ms(120)).await;
    let before = device.pulses();

    haptics.play(VibrationPattern::FadeOut, None);
    assert_eq!(
        haptics.status(),
        PlaybackStatus::Playing {
            pattern: VibrationPattern::FadeOut,
            mode: RepeatMode::Once,
        }
    );

    let mut status = haptics.subscribe();
    status.wait_for(|status| !status.is_active()).await.unwrap();
    assert_eq!(device.pulses() - before, 4);
    assert_eq!(device.last(), Some(Motor::Off));

    // Nothing from the superseded pattern shows up later.
    let switches = device.switch_count();
    sleep(ms(5_000)).await;
    assert_eq!(device.switch_count(), switches);
}

#[tokio::test(start_paused = true)]
async fn preview_plays_a_single_pass() {
    let device = RecordingDevice::new();
    let haptics = VibrationEngine::new(device.clone());

    haptics.preview(VibrationPattern::GentlePulse);
    assert_eq!(
        haptics.status(),
        PlaybackStatus::Playing {
            pattern: VibrationPattern::GentlePulse,
            mode: RepeatMode::Once,
        }
    );

    sleep(ms(2_000)).await;
    assert!(!haptics.is_active());
    assert_eq!(device.pulses(), 3);
}

#[tokio::test(start_paused = true)]
async fn repeat_override_loops_from_its_index() {
    let device = RecordingDevice::new();
    let haptics = VibrationEngine::new(device.clone());

    haptics.play(VibrationPattern::FadeOut, Some(3));
    sleep(ms(5_000)).await;
    assert_eq!(
        haptics.status(),
        PlaybackStatus::Playing {
            pattern: VibrationPattern::FadeOut,
            mode: RepeatMode::LoopFrom(3),
        }
    );
    assert!(device.pulses() > 4);
    haptics.cancel();
    assert!(!haptics.is_active());
}

#[tokio::test(start_paused = true)]
async fn out_of_range_override_plays_once() {
    let device = RecordingDevice::new();
    let haptics = VibrationEngine::new(device.clone());

    haptics.play(VibrationPattern::Wave, Some(42));
    sleep(ms(2_000)).await;
    assert!(!haptics.is_active());
    assert_eq!(device.pulses(), 5);
}

#[tokio::test(start_paused = true)]
async fn missing_vibrator_is_a_no_op() {
    let device = RecordingDevice::absent();
    let haptics = VibrationEngine::new(device.clone());

    haptics.play(VibrationPattern::Escalating, None);
    assert!(!haptics.is_active());
    sleep(ms(1_000)).await;
    haptics.cancel();
    assert_eq!(device.switch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_is_idempotent() {
    let device = RecordingDevice::new();
    let haptics = VibrationEngine::new(device.clone());

    haptics.cancel();
    haptics.cancel();
    assert_eq!(haptics.status(), PlaybackStatus::Idle);

    haptics.play(VibrationPattern::QuickPulse, None);
    haptics.cancel();
    haptics.cancel();
    assert_eq!(haptics.status(), PlaybackStatus::Idle);
    assert_eq!(device.pulses(), 0);
}

#[test]
fn play_without_a_runtime_does_nothing() {
    let device = RecordingDevice::new();
    let haptics = VibrationEngine::new(device.clone());
    haptics.play(VibrationPattern::Wave, None);
    assert!(!haptics.is_active());
}
