use std::time::Duration;

use serde::{Deserialize, Serialize};

use tagstorm_model::Tags;

use crate::reporter::{ReporterError, ReporterResult};

/// Reporter configuration.
///
/// The defaults point at a local collector that is usually not listening;
/// send failures are counted and otherwise ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Collector endpoints (`host:port`); every packet is sent to each of them.
    pub host_ports: Vec<String>,
    /// Value of the `env` tag attached to every counter.
    pub env: String,
    /// Value of the `service` tag attached to every counter.
    pub service: String,
    /// Capacity of the outbound packet queue.
    pub max_queue_size: usize,
    /// Upper bound for one UDP payload in bytes.
    pub max_packet_size: usize,
    /// Interval between two flushes of the scope.
    pub flush_interval_ms: u64,
    /// Series untouched for this long are dropped after a flush.
    pub expiry_period_ms: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            host_ports: vec!["localhost:8888".to_string()],
            env: "test".to_string(),
            service: "foo".to_string(),
            max_queue_size: 100_000,
            max_packet_size: 1440,
            flush_interval_ms: 1000,
            expiry_period_ms: 2000,
        }
    }
}

impl ReporterConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn expiry_period(&self) -> Duration {
        Duration::from_millis(self.expiry_period_ms)
    }

    /// Tags attached to every counter of the scope.
    pub fn common_tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert("env", self.env.as_str())
            .insert("service", self.service.as_str());
        tags
    }

    /// Reject configurations the reporter cannot run with.
    pub fn validate(&self) -> ReporterResult<()> {
        if self.host_ports.is_empty() {
            return Err(ReporterError::InvalidConfig(
                "at least one collector host:port is required".into(),
            ));
        }
        if self.max_queue_size == 0 {
            return Err(ReporterError::InvalidConfig(
                "max_queue_size must be greater than zero".into(),
            ));
        }
        if self.max_packet_size == 0 {
            return Err(ReporterError::InvalidConfig(
                "max_packet_size must be greater than zero".into(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(ReporterError::InvalidConfig(
                "flush_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
