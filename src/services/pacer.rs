// src/services/pacer.rs
use std::time::Duration;

/// Fixed-delay pacing between outbound requests. The scraping source is
/// sensitive to burst rates, so batch and bulk paths go through this
/// instead of sleeping inline.
///
/// Rule: the delay is applied before every call after the first, whether or
/// not the previous call was a cache hit.
#[derive(Debug, Clone)]
pub struct Pacer {
    delay: Duration,
}

pub const DEFAULT_PACING: Duration = Duration::from_millis(200);

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Pacer { delay }
    }

    /// No-op pacer, for tests and one-off calls.
    pub fn none() -> Self {
        Pacer {
            delay: Duration::ZERO,
        }
    }

    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Pacer::new(DEFAULT_PACING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn pause_waits_the_configured_delay() {
        let pacer = Pacer::new(Duration::from_millis(200));
        let start = Instant::now();
        pacer.pause().await;
        pacer.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn none_does_not_sleep() {
        let pacer = Pacer::none();
        let start = Instant::now();
        pacer.pause().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
