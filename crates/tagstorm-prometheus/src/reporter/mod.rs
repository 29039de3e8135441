//! Periodic push of scope state to remote collectors over UDP.
//!
//! Two tasks run for the lifetime of a [`Reporter`]:
//! - the flush task encodes the scope every `flush_interval`, splits it into packets and
//!   enqueues them on a bounded queue, then expires stale series;
//! - the sender task drains the queue and writes every packet to each collector address.
//!
//! Nothing is retried: a full queue drops the packet, a failed send is counted.
//! [`Reporter::close`] is the only barrier: it runs a last flush and returns once every queued
//! packet has been handed to the socket.
mod error;
pub use error::{ReporterError, ReporterResult};

mod packet;
pub use packet::packetize;

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use prometheus::{Encoder, TextEncoder};
use tokio::{
    net::UdpSocket,
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{config::ReporterConfig, scope::PrometheusScope};

/// Counters describing what the reporter did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub flushes: u64,
    pub packets_queued: u64,
    pub packets_dropped: u64,
    pub packets_sent: u64,
    pub send_errors: u64,
    pub oversized_lines: u64,
}

#[derive(Debug, Default)]
struct Stats {
    flushes: AtomicU64,
    packets_queued: AtomicU64,
    packets_dropped: AtomicU64,
    packets_sent: AtomicU64,
    send_errors: AtomicU64,
    oversized_lines: AtomicU64,
}

impl Stats {
    fn snapshot(&self) -> ReportStats {
        ReportStats {
            flushes: self.flushes.load(Ordering::Relaxed),
            packets_queued: self.packets_queued.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            oversized_lines: self.oversized_lines.load(Ordering::Relaxed),
        }
    }
}

/// Handle to the running flush and sender tasks.
pub struct Reporter {
    stats: Arc<Stats>,
    cancel: CancellationToken,
    flusher: JoinHandle<Flusher>,
    sender: JoinHandle<()>,
}

impl Reporter {
    /// Resolve collectors, bind the socket and start flushing `scope`.
    pub async fn start(cfg: ReporterConfig, scope: Arc<PrometheusScope>) -> ReporterResult<Self> {
        cfg.validate()?;
        let targets = resolve(&cfg.host_ports).await?;
        let bind_addr = if targets.iter().any(SocketAddr::is_ipv4) {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(ReporterError::Bind)?;

        let stats = Arc::new(Stats::default());
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(cfg.max_queue_size);

        let sender = tokio::spawn(send_loop(socket, targets.clone(), rx, Arc::clone(&stats)));
        let flusher = Flusher {
            scope,
            queue: tx,
            stats: Arc::clone(&stats),
            max_packet_size: cfg.max_packet_size,
            expiry_period: cfg.expiry_period(),
        };
        let flusher = tokio::spawn(flush_loop(flusher, cfg.flush_interval(), cancel.clone()));

        info!(
            collectors = ?targets,
            env = %cfg.env,
            service = %cfg.service,
            flush_interval_ms = cfg.flush_interval_ms,
            "reporter started"
        );
        Ok(Self {
            stats,
            cancel,
            flusher,
            sender,
        })
    }

    /// Current counters; final values are returned by [`Reporter::close`].
    pub fn stats(&self) -> ReportStats {
        self.stats.snapshot()
    }

    /// Stop the flush task, flush one last time and wait for the queue to drain.
    pub async fn close(self) -> ReporterResult<ReportStats> {
        self.cancel.cancel();
        let flusher = self.flusher.await?;
        flusher.flush()?;
        // dropping the last queue sender lets the send loop finish
        drop(flusher);
        self.sender.await?;

        let stats = self.stats.snapshot();
        info!(
            flushes = stats.flushes,
            sent = stats.packets_sent,
            dropped = stats.packets_dropped,
            send_errors = stats.send_errors,
            "reporter closed"
        );
        Ok(stats)
    }
}

struct Flusher {
    scope: Arc<PrometheusScope>,
    queue: mpsc::Sender<Vec<u8>>,
    stats: Arc<Stats>,
    max_packet_size: usize,
    expiry_period: Duration,
}

impl Flusher {
    /// Encode the scope and enqueue its packets. Returns the number of queued packets.
    fn flush(&self) -> ReporterResult<usize> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.scope.gather(), &mut buf)?;
        let text = String::from_utf8_lossy(&buf);
        let (packets, oversized) = packetize(&text, self.max_packet_size);

        self.stats.flushes.fetch_add(1, Ordering::Relaxed);
        if oversized > 0 {
            self.stats
                .oversized_lines
                .fetch_add(oversized as u64, Ordering::Relaxed);
            warn!(oversized, max_packet_size = self.max_packet_size, "samples too large for a packet");
        }

        let mut queued = 0;
        for packet in packets {
            match self.queue.try_send(packet) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(_)) => {
                    self.stats.packets_dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Closed(_)) => return Err(ReporterError::QueueClosed),
            }
        }
        self.stats
            .packets_queued
            .fetch_add(queued as u64, Ordering::Relaxed);
        debug!(queued, "flushed scope");
        Ok(queued)
    }

    fn expire(&self) {
        self.scope.expire(self.expiry_period);
    }
}

async fn flush_loop(flusher: Flusher, interval: Duration, cancel: CancellationToken) -> Flusher {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = flusher.flush() {
                    warn!(error = %e, "periodic flush failed");
                }
                flusher.expire();
            }
        }
    }
    flusher
}

async fn send_loop(
    socket: UdpSocket,
    targets: Vec<SocketAddr>,
    mut queue: mpsc::Receiver<Vec<u8>>,
    stats: Arc<Stats>,
) {
    while let Some(packet) = queue.recv().await {
        for target in &targets {
            match socket.send_to(&packet, target).await {
                Ok(_) => {
                    stats.packets_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.send_errors.fetch_add(1, Ordering::Relaxed);
                    debug!(%target, error = %e, "send failed");
                }
            }
        }
    }
}

/// Resolve every `host:port`, preferring an IPv4 address per host.
async fn resolve(host_ports: &[String]) -> ReporterResult<Vec<SocketAddr>> {
    let mut targets = Vec::with_capacity(host_ports.len());
    for host in host_ports {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(host.as_str())
            .await
            .map_err(|source| ReporterError::Resolve {
                host: host.clone(),
                source,
            })?
            .collect();
        let addr = addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| ReporterError::NoAddress(host.clone()))?;
        targets.push(addr);
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use tagstorm_core::MetricsScope;
    use tagstorm_model::Tags;

    use super::*;

    fn tags(city: &str) -> Tags {
        [("city", city), ("device", "version1")].into_iter().collect()
    }

    async fn collector() -> (UdpSocket, String) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap().to_string();
        (socket, addr)
    }

    fn config(addr: String) -> ReporterConfig {
        ReporterConfig {
            host_ports: vec![addr],
            flush_interval_ms: 60_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn close_flushes_to_collector() {
        let (collector, addr) = collector().await;
        let cfg = config(addr);
        let scope = Arc::new(PrometheusScope::new(cfg.common_tags()));
        let reporter = Reporter::start(cfg, Arc::clone(&scope)).await.unwrap();

        scope.inc_counter("counter0", &tags("city1"), 3);
        let stats = reporter.close().await.unwrap();

        assert_eq!(stats.packets_queued, 1);
        assert_eq!(stats.packets_sent, 1);
        assert_eq!(stats.packets_dropped, 0);

        let mut buf = vec![0u8; 2048];
        let n = tokio::time::timeout(Duration::from_secs(1), collector.recv(&mut buf))
            .await
            .expect("packet expected")
            .unwrap();
        let body = String::from_utf8_lossy(&buf[..n]);
        assert!(body.contains("counter0{"));
        assert!(body.contains("city=\"city1\""));
        assert!(body.contains("env=\"test\""));
        assert!(body.trim_end().ends_with(" 3"));
    }

    #[tokio::test]
    async fn packets_respect_max_size() {
        let (collector, addr) = collector().await;
        let cfg = ReporterConfig {
            max_packet_size: 200,
            ..config(addr)
        };
        let scope = Arc::new(PrometheusScope::new(cfg.common_tags()));
        let reporter = Reporter::start(cfg, Arc::clone(&scope)).await.unwrap();

        for i in 0..20 {
            scope.inc_counter("counter0", &tags(&format!("city{i}")), 1);
        }
        let stats = reporter.close().await.unwrap();
        assert!(stats.packets_sent > 1);

        let mut buf = vec![0u8; 2048];
        for _ in 0..stats.packets_sent {
            let n = tokio::time::timeout(Duration::from_secs(1), collector.recv(&mut buf))
                .await
                .expect("packet expected")
                .unwrap();
            assert!(n <= 200);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_periodically() {
        let (_collector, addr) = collector().await;
        let cfg = ReporterConfig {
            flush_interval_ms: 100,
            ..config(addr)
        };
        let scope = Arc::new(PrometheusScope::new(cfg.common_tags()));
        let reporter = Reporter::start(cfg, Arc::clone(&scope)).await.unwrap();
        scope.inc_counter("counter0", &tags("city1"), 1);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(reporter.stats().flushes, 3);

        let stats = reporter.close().await.unwrap();
        assert_eq!(stats.flushes, 4);
    }

    #[tokio::test]
    async fn empty_scope_closes_cleanly() {
        let (_collector, addr) = collector().await;
        let cfg = config(addr);
        let scope = Arc::new(PrometheusScope::new(cfg.common_tags()));
        let reporter = Reporter::start(cfg, scope).await.unwrap();

        let stats = reporter.close().await.unwrap();
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.packets_queued, 0);
    }

    #[tokio::test]
    async fn closes_without_listening_collector() {
        let addr = {
            let (socket, addr) = collector().await;
            drop(socket);
            addr
        };
        let cfg = config(addr);
        let scope = Arc::new(PrometheusScope::new(cfg.common_tags()));
        let reporter = Reporter::start(cfg, Arc::clone(&scope)).await.unwrap();
        scope.inc_counter("counter0", &tags("city1"), 1);

        assert!(reporter.close().await.is_ok());
    }

    #[tokio::test]
    async fn start_rejects_unresolvable_host() {
        let cfg = config("missing-port".to_string());
        let scope = Arc::new(PrometheusScope::new(Tags::new()));

        let res = Reporter::start(cfg, scope).await;
        assert!(matches!(res, Err(ReporterError::Resolve { .. })));
    }

    #[tokio::test]
    async fn start_rejects_invalid_config() {
        let cfg = ReporterConfig {
            host_ports: vec![],
            ..Default::default()
        };
        let scope = Arc::new(PrometheusScope::new(Tags::new()));

        let res = Reporter::start(cfg, scope).await;
        assert!(matches!(res, Err(ReporterError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn full_queue_drops_packets() {
        let scope = Arc::new(PrometheusScope::new(Tags::new()));
        for i in 0..3 {
            scope.inc_counter(&format!("counter{i}"), &tags("city1"), 1);
        }
        let (tx, _rx) = mpsc::channel(1);
        let stats = Arc::new(Stats::default());
        let flusher = Flusher {
            scope,
            queue: tx,
            stats: Arc::clone(&stats),
            max_packet_size: 60,
            expiry_period: Duration::from_secs(2),
        };

        let queued = flusher.flush().unwrap();

        assert_eq!(queued, 1);
        assert_eq!(stats.snapshot().packets_dropped, 2);
    }

    #[tokio::test]
    async fn flush_fails_when_queue_closed() {
        let scope = Arc::new(PrometheusScope::new(Tags::new()));
        scope.inc_counter("counter0", &tags("city1"), 1);
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let flusher = Flusher {
            scope,
            queue: tx,
            stats: Arc::new(Stats::default()),
            max_packet_size: 1440,
            expiry_period: Duration::from_secs(2),
        };

        assert!(matches!(flusher.flush(), Err(ReporterError::QueueClosed)));
    }
}
