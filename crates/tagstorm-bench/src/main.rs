mod cli;
mod profile;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use tagstorm_core::{GeneratorConfig, LoadGenerator};
use tagstorm_model::Vocabulary;
use tagstorm_observe::{init_local_offset, init_logger};
use tagstorm_prometheus::{PrometheusScope, ReportStats, Reporter, ReporterConfig, ReporterResult};

use crate::{cli::Cli, profile::HeapProfile};

#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Allocator options read before `main`: heap profiling available but idle until
/// [`HeapProfile::start`], sampling one allocation per 512 KiB on average.
#[allow(non_upper_case_globals)]
#[unsafe(export_name = "_rjem_malloc_conf")]
pub static malloc_conf: &[u8; 46] = b"prof:true,prof_active:false,lg_prof_sample:19\0";

fn main() -> anyhow::Result<()> {
    // local offset must be read before any thread exists
    init_local_offset();
    let cli = Cli::parse();

    // 1) logger
    init_logger(&cli.logger_config())?;

    // 2) heap profiler
    let profile = match HeapProfile::start(cli.profile_path()) {
        Ok(profile) => profile,
        Err(e) => {
            error!(error = %e, "could not start heap profiling");
            return Err(e.into());
        }
    };

    // 3) runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let scope = match runtime.block_on(run(&cli)) {
        Ok(scope) => scope,
        Err(e) => {
            error!(error = %format!("{e:#}"), "run failed");
            return Err(e);
        }
    };
    drop(runtime);

    // 4) heap profile
    if let Err(e) = write_profile(profile) {
        error!(error = %format!("{e:#}"), "could not write heap profile");
        return Err(e);
    }

    // 5) summary
    let snapshot = scope.snapshot();
    info!(
        series = snapshot.series(),
        total = snapshot.total(),
        rejected = scope.rejected(),
        "number of counters: {}",
        snapshot.distinct_counters()
    );
    Ok(())
}

/// Start the reporter, drive the load through it and close it.
async fn run(cli: &Cli) -> anyhow::Result<Arc<PrometheusScope>> {
    info!("number of ops: {}k", cli.thousands);

    let gen_cfg = GeneratorConfig::from_thousands(cli.thousands)?.with_concurrency(cli.concurrency);

    let mut reporter_cfg = ReporterConfig::default();
    if !cli.collectors.is_empty() {
        reporter_cfg.host_ports = cli.collectors.clone();
    }

    let scope = Arc::new(PrometheusScope::new(reporter_cfg.common_tags()));
    let reporter = Reporter::start(reporter_cfg, Arc::clone(&scope))
        .await
        .context("starting reporter")?;

    drive(gen_cfg, Arc::clone(&scope), reporter).await?;
    Ok(scope)
}

/// Final step of a run: push whatever is still buffered and stop reporting.
trait CloseReporter {
    async fn close(self) -> ReporterResult<ReportStats>;
}

impl CloseReporter for Reporter {
    async fn close(self) -> ReporterResult<ReportStats> {
        Reporter::close(self).await
    }
}

async fn drive<R: CloseReporter>(
    cfg: GeneratorConfig,
    scope: Arc<PrometheusScope>,
    reporter: R,
) -> anyhow::Result<()> {
    let generator = LoadGenerator::new(Arc::new(Vocabulary::default()), scope, cfg)?;
    let summary = generator.run().await?;
    info!(
        ops = summary.ops,
        peak_in_flight = summary.peak_in_flight,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "load finished"
    );

    let stats = reporter.close().await.context("closing reporter")?;
    if stats.packets_dropped > 0 {
        warn!(dropped = stats.packets_dropped, "reporter queue overflowed");
    }
    Ok(())
}

fn write_profile(profile: HeapProfile) -> anyhow::Result<()> {
    let path = profile.path().to_path_buf();
    let heap = profile
        .capture()
        .with_context(|| format!("capturing heap profile {}", path.display()))?;
    info!(
        path = %path.display(),
        allocated = heap.allocated,
        active = heap.active,
        resident = heap.resident,
        "heap profile written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use tagstorm_model::Tags;
    use tagstorm_prometheus::ReporterError;
    use tokio::net::UdpSocket;

    use super::*;
    use crate::profile::ProfileError;

    async fn run_against_local_collector(thousands: &str) -> Arc<PrometheusScope> {
        let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = collector.local_addr().unwrap().to_string();
        let cli = Cli::try_parse_from(["tagstorm", "-n", thousands, "--collector", addr.as_str()]).unwrap();
        run(&cli).await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_thousand_ops_hit_at_most_ten_counters() {
        let scope = run_against_local_collector("1").await;
        let snapshot = scope.snapshot();

        assert_eq!(snapshot.total(), 1_000);
        assert!((1..=10).contains(&snapshot.distinct_counters()));
        assert_eq!(scope.rejected(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_ops_still_closes_reporter() {
        let scope = run_against_local_collector("0").await;
        let snapshot = scope.snapshot();

        assert_eq!(snapshot.total(), 0);
        assert_eq!(snapshot.distinct_counters(), 0);
    }

    #[tokio::test]
    async fn unresolvable_collector_fails_the_run() {
        let cli = Cli::try_parse_from(["tagstorm", "-n", "0", "--collector", "no-port"]).unwrap();

        let err = run(&cli).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReporterError>(),
            Some(ReporterError::Resolve { .. })
        ));
    }

    struct ClosedQueue;

    impl CloseReporter for ClosedQueue {
        async fn close(self) -> ReporterResult<ReportStats> {
            Err(ReporterError::QueueClosed)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn close_error_fails_the_run_after_load() {
        let scope = Arc::new(PrometheusScope::new(Tags::new()));
        let cfg = GeneratorConfig::from_thousands(1).unwrap();

        let err = drive(cfg, Arc::clone(&scope), ClosedQueue).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ReporterError>(),
            Some(ReporterError::QueueClosed)
        ));
        assert!(format!("{err:#}").starts_with("closing reporter"));
        assert_eq!(scope.snapshot().total(), 1_000);
    }

    #[test]
    fn profile_error_is_reported() {
        let dir = std::env::temp_dir().join(format!("tagstorm-main-{}", std::process::id()));
        let profile = HeapProfile::start(dir.join("missing").join("m3_0k.mprof")).unwrap();

        let err = write_profile(profile).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProfileError>(),
            Some(ProfileError::Create { .. })
        ));
    }
}
