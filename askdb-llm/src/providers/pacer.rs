//! Client-side request pacing shared by the HTTP providers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, SemaphorePermit};

/// Caps in-flight requests and spaces request starts evenly across a minute.
#[derive(Debug)]
pub(crate) struct RequestPacer {
    permits: Arc<Semaphore>,
    last_request: AtomicU64,
    min_interval_ms: u64,
    start_time: Instant,
}

impl RequestPacer {
    pub(crate) fn new(requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        Self {
            permits: Arc::new(Semaphore::new(rpm as usize)),
            last_request: AtomicU64::new(0),
            min_interval_ms: (60_000 / rpm as u64).max(10),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// Wait for a permit and for the minimum interval since the last start.
    /// The permit is held for the duration of the request.
    pub(crate) async fn acquire(&self) -> Result<SemaphorePermit<'_>, String> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| format!("Rate limiter error: {}", e))?;

        let now_ms = self.start_time.elapsed().as_millis() as u64;
        let last_ms = self.last_request.load(Ordering::Relaxed);
        let elapsed = now_ms.saturating_sub(last_ms);

        if last_ms > 0 && elapsed < self.min_interval_ms {
            tokio::time::sleep(Duration::from_millis(self.min_interval_ms - elapsed)).await;
        }

        self.last_request
            .store(self.start_time.elapsed().as_millis().max(1) as u64, Ordering::Relaxed);
        Ok(permit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_rpm() {
        assert_eq!(RequestPacer::new(60).min_interval(), Duration::from_secs(1));
        assert_eq!(RequestPacer::new(0).min_interval(), Duration::from_secs(60));
        assert_eq!(RequestPacer::new(100_000).min_interval(), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_first_acquire_does_not_wait() {
        let pacer = RequestPacer::new(1);
        let started = Instant::now();
        let _permit = pacer.acquire().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
