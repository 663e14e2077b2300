//! The tick source that drives a running countdown.

use std::future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// A re-armable periodic ticker.
///
/// While disarmed, `tick()` never resolves, so it can sit in a `select!` loop
/// next to the command channel without a guard. Re-arming drops the previous
/// interval, which guarantees there is never more than one live tick stream.
pub(crate) struct Ticker {
    period: Duration,
    interval: Option<Interval>,
}

impl Ticker {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// Starts a fresh tick stream whose first tick is one period from now.
    pub(crate) fn arm(&mut self) {
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.interval = Some(interval);
    }

    pub(crate) fn disarm(&mut self) {
        self.interval = None;
    }

    /// Waits for the next tick and returns the instant it was observed at.
    pub(crate) async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
                Instant::now()
            }
            None => future::pending().await,
        }
    }
}
