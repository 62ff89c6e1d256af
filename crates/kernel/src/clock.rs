use std::time::Duration;

use tokio::time::Instant;

/// Virtual clock over tokio's paused time.
///
/// One virtual minute is sixty paused-clock seconds. With the runtime's
/// clock paused, a sleep never costs wall time: whenever every
/// cooperative task is parked, tokio advances the clock to the next
/// deadline, which is exactly the discrete-event contract. Virtual time
/// is monotonically non-decreasing at every suspension point.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SimClock {
    origin: Instant,
}

impl SimClock {
    pub(crate) fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Current virtual time in minutes since the run started.
    pub(crate) fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() / 60.0
    }

    /// Sleeps for `minutes` of virtual time. Non-positive durations
    /// return immediately without suspending.
    pub(crate) async fn sleep(&self, minutes: f64) {
        if minutes > 0.0 {
            tokio::time::sleep(minutes_to_duration(minutes)).await;
        }
    }

    /// Sleeps until virtual minute `deadline` since the run started.
    pub(crate) async fn sleep_until(&self, deadline: f64) {
        tokio::time::sleep_until(self.origin + minutes_to_duration(deadline)).await;
    }
}

fn minutes_to_duration(minutes: f64) -> Duration {
    Duration::from_secs_f64(minutes * 60.0)
}
