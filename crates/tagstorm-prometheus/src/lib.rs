//! Prometheus-backed scope and UDP reporter for tagstorm.
//!
//! [`PrometheusScope`] implements [`tagstorm_core::MetricsScope`] on top of a prometheus
//! registry. A [`Reporter`] periodically encodes the scope in the text exposition format and
//! pushes it to the configured collectors.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use tagstorm_core::MetricsScope;
//! use tagstorm_prometheus::{PrometheusScope, Reporter, ReporterConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ReporterConfig::default();
//! let scope = Arc::new(PrometheusScope::new(cfg.common_tags()));
//! let reporter = Reporter::start(cfg, Arc::clone(&scope)).await?;
//!
//! let tags = [("city", "city0"), ("device", "version0")].into_iter().collect();
//! scope.inc_counter("counter0", &tags, 1);
//!
//! let stats = reporter.close().await?;
//! println!("sent {} packets", stats.packets_sent);
//! println!("{} counters", scope.snapshot().distinct_counters());
//! # Ok(())
//! # }
//! ```
//!
//! ## Wire format
//! Packets carry sample lines of the prometheus text format (comments stripped), newline
//! separated, never splitting a sample across packets.

mod config;
pub use config::ReporterConfig;

mod reporter;
pub use reporter::{ReportStats, Reporter, ReporterError, ReporterResult, packetize};

mod scope;
pub use scope::PrometheusScope;

mod snapshot;
pub use snapshot::{CounterSnapshot, ScopeSnapshot};
