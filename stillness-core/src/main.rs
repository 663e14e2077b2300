use anyhow::Result;
use stillness::components::notification::ProgressNotice;
use stillness::components::selector::format_clock;
use stillness::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Logs the progress notice instead of drawing it.
struct LogSurface;

impl ProgressSurface for LogSurface {
    fn post(&self, notice: &ProgressNotice) {
        info!("[NOTICE] {} | {}", notice.title, notice.text);
    }

    fn clear(&self) {
        info!("[NOTICE] cleared");
    }
}

/// Counts motor pulses instead of vibrating.
#[derive(Default)]
struct LogHaptics {
    pulses: AtomicU32,
}

impl HapticDevice for LogHaptics {
    fn has_vibrator(&self) -> bool {
        true
    }

    fn motor_on(&self) {
        let pulse = self.pulses.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("[HAPTIC] bzz #{}", pulse);
    }

    fn motor_off(&self) {}
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load the configuration, falling back to defaults.
    let config = StillnessConfig::load(None)?;
    info!(
        "{} v{} (tick = {:?})",
        stillness::ENGINE_NAME,
        stillness::VERSION,
        config.tick.period()
    );

    // 3. Create the engine and its collaborators.
    let engine = TimerEngine::with_surface(&config, Arc::new(LogSurface));
    let device = Arc::new(LogHaptics::default());
    let haptics = VibrationEngine::new(device.clone());
    let preferences = Preferences::in_memory();
    preferences.set_vibration_pattern(VibrationPattern::GentleBells)?;

    spawn_event_listeners(&engine);

    // 4. Run a short session with no UI attached at all.
    engine.start(Duration::from_secs(5))?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    // 5. A screen shows up mid-session and sees the live state at once.
    let bridge = TimerBridge::new(engine.clone(), haptics.clone(), preferences);
    bridge.attach();
    let view = bridge.view();
    info!(
        "[VIEW] attached at {} of {} (running = {})",
        format_clock(view.remaining),
        format_clock(view.total),
        view.is_running
    );

    // 6. Wait for completion; the bridge sounds the alert.
    let mut views = bridge.subscribe();
    while views.changed().await.is_ok() {
        if views.borrow_and_update().is_completed {
            break;
        }
    }
    info!("[VIEW] completed");

    let mut playback = haptics.subscribe();
    while playback.borrow_and_update().is_active() {
        if playback.changed().await.is_err() {
            break;
        }
    }
    info!("[HAPTIC] alert finished after {} pulses", device.pulses.load(Ordering::Relaxed));

    // 7. Dismiss and shut down.
    bridge.reset_after_completion();
    tokio::time::sleep(Duration::from_millis(50)).await;
    bridge.detach();
    engine.shutdown().await;

    Ok(())
}

/// Spawns tasks that log the engine's event streams.
fn spawn_event_listeners(engine: &TimerEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut timer_rx = engine.subscribe_timer_events();
    tokio::spawn(async move {
        while let Ok(event) = timer_rx.recv().await {
            info!("[TIMER] => {:?}", event);
        }
    });
}
