//! Bounded-concurrency load generator.
//!
//! Dispatches `ops` independent units of work. Each unit draws a [`tagstorm_model::TaggedIncrement`]
//! from the shared [`Vocabulary`], sleeps for the configured work latency, and records one
//! counter increment in the [`ScopeHandle`].
//!
//! Units are spawned fire-and-forget. The dispatch loop only blocks on the [`TokenPool`], and the
//! run finishes with a pool drain, the single barrier after which no unit is running. A unit that
//! panics still returns its token, so completions are counted separately and a shortfall fails
//! the run with [`CoreError::Incomplete`].
mod config;
pub use config::{DEFAULT_CONCURRENCY, DEFAULT_WORK_LATENCY, GeneratorConfig};

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use tagstorm_model::Vocabulary;

use crate::{
    error::{CoreError, CoreResult},
    pool::TokenPool,
    scope::ScopeHandle,
};

/// Dispatched ops between two progress lines.
const PROGRESS_EVERY: u64 = 100_000;

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Units of work dispatched and completed.
    pub ops: u64,
    /// Highest number of units in flight at once.
    pub peak_in_flight: usize,
    /// Wall time from first dispatch to drain.
    pub elapsed: Duration,
}

/// Drives tagged counter increments into a metrics scope.
pub struct LoadGenerator {
    vocab: Arc<Vocabulary>,
    scope: ScopeHandle,
    pool: TokenPool,
    cfg: GeneratorConfig,
}

impl LoadGenerator {
    /// Create a generator with its own token pool sized to `cfg.concurrency`.
    pub fn new(vocab: Arc<Vocabulary>, scope: ScopeHandle, cfg: GeneratorConfig) -> CoreResult<Self> {
        let pool = TokenPool::new(cfg.concurrency)?;
        Ok(Self {
            vocab,
            scope,
            pool,
            cfg,
        })
    }

    /// Token pool used for dispatch; exposes in-flight instrumentation.
    pub fn pool(&self) -> &TokenPool {
        &self.pool
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.cfg
    }

    /// Dispatch every unit of work and wait for all of them to complete.
    pub async fn run(&self) -> CoreResult<RunSummary> {
        let started = Instant::now();
        info!(
            ops = self.cfg.ops,
            concurrency = self.cfg.concurrency,
            latency_us = self.cfg.work_latency.as_micros() as u64,
            "dispatching"
        );

        let completed = Arc::new(AtomicU64::new(0));
        let mut dispatched = 0u64;
        while dispatched < self.cfg.ops {
            let token = self.pool.acquire().await?;
            let vocab = Arc::clone(&self.vocab);
            let scope = Arc::clone(&self.scope);
            let latency = self.cfg.work_latency;
            let completed = Arc::clone(&completed);

            tokio::spawn(async move {
                let _token = token;
                let event = {
                    let mut rng = rand::thread_rng();
                    vocab.draw(&mut rng)
                };
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                scope.inc_counter(event.counter, &event.tags(), 1);
                completed.fetch_add(1, Ordering::Relaxed);
            });

            dispatched += 1;
            if dispatched % PROGRESS_EVERY == 0 {
                debug!(dispatched, in_flight = self.pool.in_flight(), "progress");
            }
        }

        debug!(dispatched, "draining");
        self.pool.drain().await?;

        let completed = completed.load(Ordering::Relaxed);
        if completed != dispatched {
            warn!(dispatched, completed, "units did not complete");
            return Err(CoreError::Incomplete {
                dispatched,
                completed,
            });
        }

        let summary = RunSummary {
            ops: dispatched,
            peak_in_flight: self.pool.peak(),
            elapsed: started.elapsed(),
        };
        info!(
            ops = summary.ops,
            peak_in_flight = summary.peak_in_flight,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "done"
        );
        Ok(summary)
    }
}
