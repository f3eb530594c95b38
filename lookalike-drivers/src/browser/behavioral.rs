use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Default)]
/// Produces human-like pauses between page actions to reduce automation signals.
pub struct BehavioralEngine;

impl BehavioralEngine {
    pub fn new() -> Self {
        Self
    }

    /// Pick a delay between `min` and `max` milliseconds (inclusive).
    pub fn pick_delay(&self, min: u64, max: u64) -> Duration {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        Duration::from_millis(OsRng.gen_range(lo..=hi))
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    pub async fn random_delay(&self, min: u64, max: u64) {
        sleep(self.pick_delay(min, max)).await;
    }
}
