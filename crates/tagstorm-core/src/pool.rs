//! Fixed-size pool of concurrency tokens.
//!
//! A [`Token`] must be held for the whole lifetime of a unit of work.
//! Dropping it (including during unwinding) returns the slot to the pool.
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{CoreError, CoreResult};

/// Counting semaphore with in-flight instrumentation.
///
/// Tracks how many tokens are currently held and the highest value ever observed,
/// so callers can check the concurrency ceiling after a run.
#[derive(Debug, Clone)]
pub struct TokenPool {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    permits: Arc<Semaphore>,
    capacity: u32,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl TokenPool {
    /// Create a pool holding `capacity` tokens.
    pub fn new(capacity: usize) -> CoreResult<Self> {
        if capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "concurrency must be greater than zero".into(),
            ));
        }
        if capacity > Semaphore::MAX_PERMITS {
            return Err(CoreError::InvalidConfig(format!(
                "concurrency {capacity} exceeds {}",
                Semaphore::MAX_PERMITS
            )));
        }
        let capacity = u32::try_from(capacity).map_err(|_| {
            CoreError::InvalidConfig(format!("concurrency {capacity} does not fit in u32"))
        })?;

        Ok(Self {
            inner: Arc::new(Inner {
                permits: Arc::new(Semaphore::new(capacity as usize)),
                capacity,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        })
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) -> CoreResult<Token> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| CoreError::PoolClosed)?;

        let now = self.inner.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.peak.fetch_max(now, Ordering::AcqRel);

        Ok(Token {
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Wait until every outstanding token has been returned.
    ///
    /// Takes the whole pool at once and releases it again, so the pool stays usable.
    pub async fn drain(&self) -> CoreResult<()> {
        let all = self
            .inner
            .permits
            .acquire_many(self.inner.capacity)
            .await
            .map_err(|_| CoreError::PoolClosed)?;
        drop(all);
        Ok(())
    }

    /// Total number of tokens.
    pub fn capacity(&self) -> usize {
        self.inner.capacity as usize
    }

    /// Tokens currently held by units of work.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Highest number of tokens held at the same time.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }
}

/// A held concurrency slot.
#[derive(Debug)]
pub struct Token {
    pool: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Token {
    fn drop(&mut self) {
        // Runs before the permit field is dropped, so the in-flight count
        // never exceeds capacity.
        self.pool.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(
            TokenPool::new(0),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn tracks_in_flight_and_peak() {
        let pool = TokenPool::new(3).unwrap();

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(pool.in_flight(), 2);
        assert_eq!(pool.peak(), 2);

        drop(a);
        assert_eq!(pool.in_flight(), 1);

        let c = pool.acquire().await.unwrap();
        let d = pool.acquire().await.unwrap();
        assert_eq!(pool.in_flight(), 3);
        assert_eq!(pool.peak(), 3);

        drop((b, c, d));
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.peak(), 3);
    }

    #[tokio::test]
    async fn acquire_blocks_when_exhausted() {
        let pool = TokenPool::new(1).unwrap();
        let held = pool.acquire().await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(20), pool.acquire()).await;
        assert!(waiting.is_err(), "second acquire must wait for a free token");

        drop(held);
        let token = tokio::time::timeout(Duration::from_millis(200), pool.acquire())
            .await
            .expect("token released")
            .unwrap();
        drop(token);
    }

    #[tokio::test]
    async fn drain_waits_for_outstanding_tokens() {
        let pool = TokenPool::new(2).unwrap();
        let token = pool.acquire().await.unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(20), pool.drain()).await;
        assert!(pending.is_err());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            drop(token);
        });
        pool.drain().await.unwrap();
        assert_eq!(pool.in_flight(), 0);

        // still usable after a drain
        let again = pool.acquire().await.unwrap();
        assert_eq!(pool.in_flight(), 1);
        drop(again);
    }

    #[tokio::test]
    async fn token_is_released_when_task_panics() {
        let pool = TokenPool::new(1).unwrap();
        let token = pool.acquire().await.unwrap();

        let res = tokio::spawn(async move {
            let _token = token;
            panic!("unit of work failed");
        })
        .await;
        assert!(res.is_err());

        assert_eq!(pool.in_flight(), 0);
        pool.drain().await.unwrap();
    }
}
