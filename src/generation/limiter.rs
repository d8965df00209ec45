//! Request limiter
//!
//! Bounds concurrent model calls with a semaphore and spaces consecutive
//! starts by a minimum interval. Every attempt, retries included, goes
//! through [`RequestLimiter::acquire`].

use std::time::Duration;

use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;

use crate::types::{DocError, Result};

#[derive(Debug)]
pub struct RequestLimiter {
    permits: Semaphore,
    min_interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RequestLimiter {
    pub fn new(max_in_flight: usize, min_interval: Duration) -> Self {
        Self {
            permits: Semaphore::new(max_in_flight.max(1)),
            min_interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait for a free slot, then for the pacing interval.
    ///
    /// The permit is held for the duration of the call.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DocError::Config("request limiter closed".to_string()))?;

        if !self.min_interval.is_zero() {
            let start = {
                let mut next = self.next_slot.lock().await;
                let now = Instant::now();
                let start = (*next).max(now);
                *next = start + self.min_interval;
                start
            };
            tokio::time::sleep_until(start).await;
        }

        Ok(permit)
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_never_exceeds_max_in_flight() {
        let limiter = Arc::new(RequestLimiter::new(2, Duration::ZERO));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test]
    async fn test_spaces_consecutive_starts() {
        let limiter = RequestLimiter::new(4, Duration::from_millis(20));
        let begin = std::time::Instant::now();
        for _ in 0..3 {
            drop(limiter.acquire().await.unwrap());
        }
        assert!(begin.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let limiter = RequestLimiter::new(0, Duration::ZERO);
        assert_eq!(limiter.available(), 1);
        assert!(limiter.acquire().await.is_ok());
    }
}
