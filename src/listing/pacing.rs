/// Randomized politeness delay between page actions
use rand::Rng;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    min_seconds: f64,
    max_seconds: f64,
}

impl Pacing {
    /// Bounds are in seconds. Negative values clamp to zero and inverted bounds are swapped.
    pub fn new(min_seconds: f64, max_seconds: f64) -> Self {
        let min_seconds = min_seconds.max(0.0);
        let max_seconds = max_seconds.max(0.0);
        if min_seconds <= max_seconds {
            Self {
                min_seconds,
                max_seconds,
            }
        } else {
            Self {
                min_seconds: max_seconds,
                max_seconds: min_seconds,
            }
        }
    }

    /// No delay at all, for tests and local fixtures
    pub fn none() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min_seconds, self.max_seconds)
    }

    pub fn next_delay(&self) -> Duration {
        if self.max_seconds <= self.min_seconds {
            return Duration::from_secs_f64(self.min_seconds);
        }
        let secs = rand::rng().random_range(self.min_seconds..=self.max_seconds);
        Duration::from_secs_f64(secs)
    }

    pub async fn wait(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        debug!("⏳ Waiting {:.3}s", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}
