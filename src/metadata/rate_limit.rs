//! Outbound request throttle for the metadata service.
//!
//! Two limits apply to every call: a semaphore caps how many requests are in
//! flight at once, and a token bucket caps the sustained rate. The bucket
//! holds `capacity` tokens and refills one every `cooldown / capacity`, which
//! gives the same ceiling as holding each slot for `cooldown` after it
//! completes. Callers wait when either limit is saturated.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

use super::error::MetadataError;

/// Maximum simultaneous outbound requests.
pub const GATE_CAPACITY: u32 = 5;

/// Cool-down each slot represents; the bucket refills `GATE_CAPACITY` tokens per cool-down.
pub const GATE_COOLDOWN: Duration = Duration::from_millis(200);

pub struct RateGate {
    permits: Semaphore,
    bucket: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    capacity: u32,
    refill_interval: Duration,
}

/// Held for the duration of one outbound request.
pub struct GatePermit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl RateGate {
    pub fn new(capacity: u32, cooldown: Duration) -> Self {
        let capacity = capacity.max(1);
        let refill_interval = (cooldown / capacity).max(Duration::from_millis(1));
        let burst = NonZeroU32::new(capacity).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(refill_interval)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            permits: Semaphore::new(capacity as usize),
            bucket: RateLimiter::direct(quota),
            capacity,
            refill_interval,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a concurrency slot, then for a token.
    pub async fn acquire(&self) -> Result<GatePermit<'_>, MetadataError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| MetadataError::Network("rate gate closed".to_string()))?;
        self.bucket.until_ready().await;
        Ok(GatePermit { _permit: permit })
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(GATE_CAPACITY, GATE_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_default_gate_shape() {
        let gate = RateGate::default();
        assert_eq!(gate.capacity(), 5);
        assert_eq!(gate.refill_interval(), Duration::from_millis(40));
        assert_eq!(gate.available_permits(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_never_exceeds_capacity() {
        let gate = Arc::new(RateGate::new(3, Duration::from_millis(3)));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..12 {
            let gate = gate.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(15)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(gate.available_permits(), 3);
    }

    #[tokio::test]
    async fn test_sustained_rate_is_bounded_by_refill() {
        // 5 tokens, one back every 50ms.
        let gate = RateGate::new(5, Duration::from_millis(250));
        let start = Instant::now();
        for _ in 0..10 {
            let _permit = gate.acquire().await.unwrap();
        }
        // First five are the burst; the next five wait one refill each.
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
