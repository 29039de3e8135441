use clap::Parser;

use tagstorm_core::generator::DEFAULT_CONCURRENCY;
use tagstorm_observe::{LoggerConfig, LoggerFormat, LoggerLevel, LoggerTimeZone};

#[derive(Debug, Parser)]
#[command(
    name = "tagstorm",
    version,
    about = "Drive tagged counter increments through a Prometheus reporter and profile the heap"
)]
pub struct Cli {
    /// Number of operations, in thousands.
    #[arg(short = 'n', default_value_t = 1000)]
    pub thousands: u64,

    /// Operations allowed in flight at once.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Collector endpoints (`host:port`); defaults to the reporter config.
    #[arg(long = "collector")]
    pub collectors: Vec<String>,

    /// Log filter expression.
    #[arg(long, default_value = "info")]
    pub log_level: LoggerLevel,

    /// Log output: text, json or journald.
    #[arg(long, default_value_t = LoggerFormat::Text)]
    pub log_format: LoggerFormat,

    /// Timestamp timezone: utc or local.
    #[arg(long, default_value_t = LoggerTimeZone::Utc)]
    pub log_tz: LoggerTimeZone,
}

impl Cli {
    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            format: self.log_format,
            level: self.log_level.clone(),
            tz: self.log_tz,
            ..Default::default()
        }
    }

    /// Heap profile path for this run, e.g. `m3_1000k.mprof`.
    pub fn profile_path(&self) -> String {
        format!("m3_{}k.mprof", self.thousands)
    }
}
