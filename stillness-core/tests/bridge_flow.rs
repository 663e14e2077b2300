use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stillness::preferences::VIBRATION_PATTERN_KEY;
use stillness::prelude::*;
use tokio::time::sleep;

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

async fn settle() {
    sleep(ms(1)).await;
}

#[derive(Default)]
struct CountingDevice {
    pulses: AtomicUsize,
}

impl HapticDevice for CountingDevice {
    fn has_vibrator(&self) -> bool {
        true
    }

    fn motor_on(&self) {
        self.pulses.fetch_add(1, Ordering::Relaxed);
    }

    fn motor_off(&self) {}
}

struct Rig {
    engine: TimerEngine,
    haptics: VibrationEngine,
    bridge: TimerBridge,
}

fn rig_with(preferences: Preferences) -> Rig {
    let engine = TimerEngine::new(&StillnessConfig::default());
    let haptics = VibrationEngine::new(Arc::new(CountingDevice::default()));
    let bridge = TimerBridge::new(engine.clone(), haptics.clone(), preferences);
    bridge.attach();
    Rig {
        engine,
        haptics,
        bridge,
    }
}

fn rig(pattern: VibrationPattern) -> Rig {
    let preferences = Preferences::in_memory();
    preferences.set_vibration_pattern(pattern).unwrap();
    rig_with(preferences)
}

#[tokio::test(start_paused = true)]
async fn view_shows_the_selection_until_a_session_starts() {
    let Rig { bridge, .. } = rig(VibrationPattern::GentleBells);

    assert!(bridge.select_exact(300));
    assert!(bridge.add_seconds(30));
    let view = bridge.view();
    assert_eq!(view.selected_seconds, Some(330));
    assert_eq!(view.total, ms(330_000));
    assert_eq!(view.remaining, ms(330_000));
    assert!(!view.is_running);

    bridge.start_timer();
    let view = bridge.view();
    assert!(view.is_running);
    assert!(!view.is_paused);
    assert_eq!(view.total, ms(330_000));

    sleep(ms(1_050)).await;
    let view = bridge.view();
    assert!(view.is_running);
    assert!(view.remaining <= ms(329_000));
    assert_eq!(view.selected_seconds, Some(330));
}

#[tokio::test(start_paused = true)]
async fn start_without_a_selection_does_nothing() {
    let Rig { engine, bridge, .. } = rig(VibrationPattern::GentleBells);
    bridge.start_timer();
    settle().await;
    assert!(!engine.is_provisioned());
    assert!(!bridge.view().is_running);
}

#[tokio::test(start_paused = true)]
async fn selection_is_locked_while_running() {
    let Rig { bridge, .. } = rig(VibrationPattern::GentleBells);
    bridge.select_exact(60);
    bridge.start_timer();
    settle().await;

    assert!(!bridge.select_exact(120));
    assert!(!bridge.add_seconds(15));
    bridge.pause_timer();
    settle().await;
    assert!(!bridge.select_exact(120));

    bridge.stop_timer();
    settle().await;
    assert!(bridge.select_exact(120));
    assert_eq!(bridge.view().total, ms(120_000));
}

#[tokio::test(start_paused = true)]
async fn pause_is_shown_before_the_engine_confirms() {
    let Rig { engine, bridge, .. } = rig(VibrationPattern::GentleBells);
    bridge.select_exact(60);
    bridge.start_timer();
    sleep(ms(1_000)).await;

    bridge.pause_timer();
    assert!(bridge.view().is_paused);
    assert_eq!(engine.snapshot().phase, TimerPhase::Running);

    settle().await;
    let snapshot = engine.snapshot();
    assert!(snapshot.is_paused());
    let view = bridge.view();
    assert!(view.is_paused);
    assert_eq!(view.remaining, snapshot.remaining);

    bridge.resume_timer();
    assert!(!bridge.view().is_paused);
    settle().await;
    assert_eq!(engine.snapshot().phase, TimerPhase::Running);
}

#[tokio::test(start_paused = true)]
async fn start_while_paused_picks_up_the_remaining_time() {
    let Rig { engine, bridge, .. } = rig(VibrationPattern::GentleBells);
    bridge.select_exact(10);
    bridge.start_timer();
    sleep(ms(3_000)).await;
    bridge.pause_timer();
    settle().await;
    let paused = engine.snapshot().remaining;

    bridge.start_timer();
    settle().await;
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase, TimerPhase::Running);
    assert_eq!(snapshot.session, SessionId(2));
    assert_eq!(snapshot.total, ms(10_000));
    assert!(snapshot.remaining <= paused);
    assert!(snapshot.remaining >= paused - ms(1));
}

#[tokio::test(start_paused = true)]
async fn completion_alerts_exactly_once() {
    let Rig {
        engine,
        haptics,
        bridge,
    } = rig(VibrationPattern::GentleBells);
    bridge.select_exact(5);
    bridge.start_timer();

    sleep(ms(5_050)).await;
    let view = bridge.view();
    assert!(view.is_completed);
    assert!(!view.is_running);
    assert_eq!(view.remaining, Duration::ZERO);
    assert_eq!(
        haptics.status(),
        PlaybackStatus::Playing {
            pattern: VibrationPattern::GentleBells,
            mode: RepeatMode::Once,
        }
    );

    // The finite alert runs out by itself.
    sleep(ms(3_000)).await;
    assert!(!haptics.is_active());

    // A redundant publication of the completed state must not re-alert.
    engine.pause().unwrap();
    settle().await;
    assert!(engine.snapshot().revision > 0);
    assert!(!haptics.is_active());

    // Neither does re-attaching.
    bridge.detach();
    bridge.attach();
    settle().await;
    assert!(!haptics.is_active());
}

#[tokio::test(start_paused = true)]
async fn dismiss_silences_a_continuous_alert() {
    let Rig {
        engine,
        haptics,
        bridge,
    } = rig(VibrationPattern::Wave);
    bridge.select_exact(2);
    bridge.start_timer();
    sleep(ms(2_050)).await;
    assert!(bridge.view().is_completed);

    sleep(ms(10_000)).await;
    assert!(haptics.is_active());

    bridge.reset_after_completion();
    assert!(!haptics.is_active());
    let view = bridge.view();
    assert!(!view.is_completed);
    assert_eq!(view.total, ms(2_000));

    settle().await;
    assert_eq!(engine.snapshot().phase, TimerPhase::Idle);
    assert!(!bridge.view().is_completed);
}

#[tokio::test(start_paused = true)]
async fn stop_from_the_notice_silences_a_continuous_alert() {
    let Rig {
        engine,
        haptics,
        bridge,
    } = rig(VibrationPattern::Wave);
    bridge.select_exact(1);
    bridge.start_timer();
    sleep(ms(1_200)).await;
    assert!(bridge.view().is_completed);
    assert!(haptics.is_active());

    engine.handle_notice_action(NoticeAction::Stop).unwrap();
    settle().await;
    assert_eq!(engine.snapshot().phase, TimerPhase::Idle);
    assert!(!haptics.is_active());

    sleep(ms(30_000)).await;
    assert!(!haptics.is_active());
    assert!(!bridge.view().is_completed);
}

#[tokio::test(start_paused = true)]
async fn another_bridge_dismissing_silences_this_one() {
    let Rig {
        engine,
        haptics,
        bridge,
    } = rig(VibrationPattern::Escalating);
    let other = TimerBridge::new(
        engine.clone(),
        VibrationEngine::default(),
        Preferences::in_memory(),
    );
    other.attach();

    bridge.select_exact(2);
    bridge.start_timer();
    sleep(ms(2_050)).await;
    assert!(haptics.is_active());

    other.reset_after_completion();
    settle().await;
    assert!(!haptics.is_active());

    // A fresh session still alerts.
    bridge.start_timer();
    sleep(ms(2_050)).await;
    assert!(bridge.view().is_completed);
    assert!(haptics.is_active());
    bridge.reset_after_completion();
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_vibration_and_resets() {
    let Rig {
        engine,
        haptics,
        bridge,
    } = rig(VibrationPattern::Wave);
    bridge.select_exact(30);
    bridge.start_timer();
    sleep(ms(1_000)).await;

    haptics.preview(VibrationPattern::Wave);
    bridge.stop_timer();
    assert!(!haptics.is_active());
    settle().await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase, TimerPhase::Idle);
    assert_eq!(snapshot.remaining, snapshot.total);
    let view = bridge.view();
    assert_eq!(view.remaining, ms(30_000));
    assert!(!view.is_running && !view.is_paused && !view.is_completed);
}

#[tokio::test(start_paused = true)]
async fn late_attach_shows_the_live_session() {
    let engine = TimerEngine::new(&StillnessConfig::default());
    engine.start(ms(5_000)).unwrap();
    sleep(ms(2_050)).await;

    let bridge = TimerBridge::new(
        engine.clone(),
        VibrationEngine::default(),
        Preferences::in_memory(),
    );
    bridge.attach();
    let view = bridge.view();
    assert!(view.is_running);
    assert_eq!(view.total, ms(5_000));
    assert!(view.remaining <= ms(3_000));
    assert_eq!(view.selected_seconds, None);
}

#[tokio::test(start_paused = true)]
async fn unknown_stored_pattern_alerts_with_the_default() {
    let store = Arc::new(MemoryStore::new());
    store.set_string(VIBRATION_PATTERN_KEY, "OLD_GENTLE").unwrap();
    let Rig {
        haptics, bridge, ..
    } = rig_with(Preferences::new(store));

    assert_eq!(
        bridge.preferences().vibration_pattern(),
        VibrationPattern::GentlePulse
    );
    bridge.select_exact(1);
    bridge.start_timer();
    sleep(ms(1_050)).await;

    assert_eq!(
        haptics.status(),
        PlaybackStatus::Playing {
            pattern: VibrationPattern::GentlePulse,
            mode: RepeatMode::LoopFrom(0),
        }
    );
    bridge.reset_after_completion();
}

#[tokio::test(start_paused = true)]
async fn alert_uses_the_pattern_chosen_at_completion_time() {
    let Rig {
        haptics, bridge, ..
    } = rig(VibrationPattern::GentleBells);
    bridge.select_exact(3);
    bridge.start_timer();
    sleep(ms(1_000)).await;

    bridge
        .preferences()
        .set_vibration_pattern(VibrationPattern::Escalating)
        .unwrap();
    sleep(ms(2_050)).await;
    assert_eq!(
        haptics.status(),
        PlaybackStatus::Playing {
            pattern: VibrationPattern::Escalating,
            mode: RepeatMode::LoopFrom(0),
        }
    );
    bridge.stop_timer();
    assert!(!haptics.is_active());
}
