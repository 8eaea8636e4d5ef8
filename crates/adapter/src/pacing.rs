//! Frame pacing between published cascade frames

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{TICK_DECAY_DENOMINATOR, TICK_DECAY_NUMERATOR, TICK_INTERVAL_MS};

#[async_trait]
pub trait Pacing: Send + Sync {
    /// Wait after frame `index` (0-based) of a move has been published
    async fn pause(&self, index: usize);
}

/// Delays that shrink geometrically so long chains speed up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometricPacing {
    initial: Duration,
}

impl GeometricPacing {
    pub fn new(initial: Duration) -> Self {
        Self { initial }
    }

    /// Delay after frame `index`: `initial / 1.2^index`
    pub fn delay(&self, index: usize) -> Duration {
        let mut delay = self.initial;
        for _ in 0..index {
            delay = delay * TICK_DECAY_DENOMINATOR / TICK_DECAY_NUMERATOR;
            if delay.is_zero() {
                break;
            }
        }
        delay
    }
}

impl Default for GeometricPacing {
    fn default() -> Self {
        Self::new(Duration::from_millis(TICK_INTERVAL_MS))
    }
}

#[async_trait]
impl Pacing for GeometricPacing {
    async fn pause(&self, index: usize) {
        tokio::time::sleep(self.delay(index)).await;
    }
}

/// Publish frames back to back (headless runs, tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

#[async_trait]
impl Pacing for NoPacing {
    async fn pause(&self, _index: usize) {}
}
