use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// Maximum number of units in flight.
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Simulated processing time of one unit of work.
pub const DEFAULT_WORK_LATENCY: Duration = Duration::from_micros(100);

/// Load generator parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Total units of work to dispatch.
    pub ops: u64,
    /// Size of the token pool.
    pub concurrency: usize,
    /// Pause inside each unit before the increment is recorded.
    pub work_latency: Duration,
}

impl GeneratorConfig {
    /// Build a config dispatching `thousands * 1000` ops with default concurrency and latency.
    pub fn from_thousands(thousands: u64) -> CoreResult<Self> {
        let ops = thousands.checked_mul(1000).ok_or_else(|| {
            CoreError::InvalidConfig(format!("{thousands}k ops overflows u64"))
        })?;
        Ok(Self {
            ops,
            ..Default::default()
        })
    }

    /// Replace the concurrency limit and return updated config.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Replace the per-unit latency and return updated config.
    pub fn with_work_latency(mut self, latency: Duration) -> Self {
        self.work_latency = latency;
        self
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            ops: 1_000 * 1000,
            concurrency: DEFAULT_CONCURRENCY,
            work_latency: DEFAULT_WORK_LATENCY,
        }
    }
}
