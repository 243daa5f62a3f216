//! Scanner module - the concurrent SYN probing engine.
//!
//! Data flow:
//!
//! ```text
//! input --> Dispatcher --[queue: concurrency]--> Worker x N --[results]--> ResultSink --> output
//! ```
//!
//! Every worker owns its capture handle and raw sockets; the only state
//! shared between workers is the read-only configuration and source
//! addresses.

pub mod capture;
pub mod correlate;
pub mod dispatch;
pub mod filter;
pub mod packet;
pub mod resolver;
pub mod traits;
pub mod transmit;
pub mod worker;

#[cfg(test)]
pub(crate) mod fake;

use crate::config::ProbeConfig;
use crate::error::{ProbeError, ProbeResult};
use crate::interface::SourceAddresses;
use crate::output::ResultSink;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub use capture::PcapCapture;
pub use dispatch::{DispatchReport, Dispatcher};
pub use filter::FlowFilter;
pub use resolver::DnsResolver;
pub use traits::{Backend, CaptureEvent, PacketCapture, Resolver, Transmitter};
pub use transmit::RawTransmitter;
pub use worker::{WorkQueue, Worker, WorkerReport, WorkerResources};

/// libpcap capture plus raw sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBackend;

impl Backend for SystemBackend {
    type Capture = PcapCapture;
    type Transmitter = RawTransmitter;

    fn open_capture(
        &self,
        interface: &str,
        poll_interval: Duration,
        snaplen: u32,
    ) -> ProbeResult<PcapCapture> {
        PcapCapture::open(interface, poll_interval, snaplen)
    }

    fn open_transmitter(&self) -> ProbeResult<RawTransmitter> {
        RawTransmitter::open()
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Hostnames queued by the dispatcher.
    pub dispatched: u64,
    /// Hostnames taken by a worker.
    pub probed: u64,
    /// Hostnames written to the output.
    pub live: u64,
    /// Hostnames dropped because a probe step failed.
    pub abandoned: u64,
    /// Workers that acquired their resources.
    pub workers_started: usize,
    /// Workers that exited at startup (or crashed).
    pub workers_failed: usize,
    /// Whether input ended with a read error.
    pub input_error: bool,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    fn absorb(&mut self, report: &WorkerReport) {
        if report.started {
            self.workers_started += 1;
        } else {
            self.workers_failed += 1;
        }
        self.probed += report.probed;
        self.abandoned += report.abandoned;
    }
}

/// The probing engine: a dispatcher, a worker pool and a result sink.
///
/// # Example
///
/// ```rust,ignore
/// use turboprobe::config::ProbeConfig;
/// use turboprobe::interface::SourceAddresses;
/// use turboprobe::scanner::{DnsResolver, Engine, SystemBackend};
/// use tokio::io::{stdin, stdout, BufReader};
///
/// let config = ProbeConfig::default();
/// let sources = SourceAddresses::discover(&config.interface)?;
/// let engine = Engine::new(config, sources, SystemBackend, DnsResolver::from_system());
/// let summary = engine.run(BufReader::new(stdin()), stdout()).await?;
/// ```
pub struct Engine<B: Backend, R: Resolver> {
    config: Arc<ProbeConfig>,
    sources: SourceAddresses,
    backend: Arc<B>,
    resolver: Arc<R>,
}

impl<B: Backend, R: Resolver> Engine<B, R> {
    pub fn new(config: ProbeConfig, sources: SourceAddresses, backend: B, resolver: R) -> Self {
        Self {
            config: Arc::new(config),
            sources,
            backend: Arc::new(backend),
            resolver: Arc::new(resolver),
        }
    }

    /// Probe every hostname read from `input`, writing live ones to `output`.
    ///
    /// Returns once the input is exhausted and every queued hostname has
    /// been probed.
    ///
    /// # Errors
    /// Returns `ProbeError::InvalidConfig` for an unusable configuration and
    /// `ProbeError::Io` if the output cannot be written.
    pub async fn run<I, W>(&self, input: I, output: W) -> ProbeResult<RunSummary>
    where
        I: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.config.validate()?;
        let started = Instant::now();
        let concurrency = self.config.concurrency;

        info!(
            workers = concurrency,
            interface = %self.config.interface,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "starting probe engine"
        );

        let (work_tx, work_rx) = mpsc::channel(concurrency);
        let (live_tx, live_rx) = mpsc::channel(concurrency);
        let queue: WorkQueue = Arc::new(Mutex::new(work_rx));

        let sink = tokio::spawn(ResultSink::new(output).run(live_rx));

        let mut workers = JoinSet::new();
        for id in 0..concurrency {
            let worker = Worker::new(
                id,
                Arc::clone(&self.config),
                self.sources,
                Arc::clone(&self.backend),
                Arc::clone(&self.resolver),
            );
            workers.spawn(worker.run(Arc::clone(&queue), live_tx.clone()));
        }
        // Once every worker is gone, the queue and result channel close.
        drop(queue);
        drop(live_tx);

        let dispatch = Dispatcher::new(input).run(work_tx).await;

        let mut summary = RunSummary {
            dispatched: dispatch.dispatched,
            input_error: dispatch.read_error,
            ..RunSummary::default()
        };
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => summary.absorb(&report),
                Err(e) => {
                    error!("worker task panicked: {}", e);
                    summary.workers_failed += 1;
                }
            }
        }

        if summary.workers_started == 0 {
            warn!("no worker could acquire capture and raw socket resources");
        }

        summary.live = sink
            .await
            .map_err(|e| ProbeError::Worker(format!("result sink failed: {}", e)))??;
        summary.elapsed = started.elapsed();

        info!(
            dispatched = summary.dispatched,
            probed = summary.probed,
            live = summary.live,
            abandoned = summary.abandoned,
            workers_failed = summary.workers_failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "probe run complete"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::fake::{FakeBackend, FakeNetwork, FakeResolver};
    use std::collections::BTreeSet;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use tokio::io::AsyncReadExt;

    fn sources() -> SourceAddresses {
        SourceAddresses {
            v4: Some(Ipv4Addr::new(10, 0, 0, 2)),
            v6: Some("2001:db8::2".parse().unwrap()),
        }
    }

    fn config(concurrency: usize, timeout_ms: u64) -> ProbeConfig {
        ProbeConfig::default()
            .with_concurrency(concurrency)
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_poll_interval(Duration::from_millis(5))
    }

    fn v4(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, last))
    }

    async fn run_engine(
        engine: &Engine<FakeBackend, FakeResolver>,
        input: &str,
    ) -> (ProbeResult<RunSummary>, Vec<String>) {
        let (writer, mut reader) = tokio::io::duplex(64 * 1024);
        let result = engine.run(input.as_bytes(), writer).await;
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        (result, out.lines().map(String::from).collect())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_live_hosts_are_reported_once_each() {
        let network = FakeNetwork::new();
        let v6_live: IpAddr = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x443));
        for ip in [v4(1), v4(2), v6_live] {
            network.set_live(ip);
        }
        let resolver = FakeResolver::new()
            .with_host("example.org", vec![v4(1)])
            .with_host("www.example.org", vec![v4(2), v4(9)])
            .with_host("dead.example.org", vec![v4(3)])
            .with_host("v6.example.org", vec![v6_live]);
        let engine = Engine::new(
            config(3, 80),
            sources(),
            FakeBackend::new(network.clone()),
            resolver,
        );

        let (result, lines) = run_engine(
            &engine,
            "example.org\nwww.example.org\nnx-does-not-resolve.invalid\ndead.example.org\nv6.example.org\n",
        )
        .await;
        let summary = result.unwrap();

        let lines: BTreeSet<String> = lines.into_iter().collect();
        let expected: BTreeSet<String> = [
            "https://example.org",
            "https://www.example.org",
            "https://v6.example.org",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(lines, expected);
        assert_eq!(summary.dispatched, 5);
        assert_eq!(summary.probed, 5);
        assert_eq!(summary.live, 3);
        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.workers_started, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_worker_is_sequential() {
        let network = FakeNetwork::new();
        let resolver = FakeResolver::new()
            .with_host("a.example", vec![v4(10)])
            .with_host("b.example", vec![v4(11)])
            .with_host("c.example", vec![v4(12)]);
        let engine = Engine::new(config(1, 40), sources(), FakeBackend::new(network), resolver);

        let start = Instant::now();
        let (result, lines) = run_engine(&engine, "a.example\nb.example\nc.example\n").await;

        assert!(lines.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(120));
        assert_eq!(result.unwrap().probed, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failed_workers_leave_the_rest_to_drain() {
        let network = FakeNetwork::new();
        network.fail_capture_opens(2);
        let mut resolver = FakeResolver::new();
        let mut input = String::new();
        for i in 0..12u8 {
            let host = format!("h{}.example", i);
            resolver = resolver.with_host(&host, vec![v4(100 + i)]);
            if i % 2 == 0 {
                network.set_live(v4(100 + i));
            }
            input.push_str(&host);
            input.push('\n');
        }
        let engine = Engine::new(config(4, 40), sources(), FakeBackend::new(network.clone()), resolver);
        let (result, lines) = run_engine(&engine, &input).await;
        let summary = result.unwrap();

        assert_eq!(summary.workers_failed, 2);
        assert_eq!(summary.workers_started, 2);
        assert_eq!(summary.probed, 12);
        assert_eq!(lines.len(), 6);
        assert!(network.peak_captures() <= 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_resources_never_exceed_concurrency() {
        let network = FakeNetwork::new();
        let mut resolver = FakeResolver::new();
        let mut input = String::new();
        for i in 0..20u8 {
            let host = format!("n{}.example", i);
            resolver = resolver.with_host(&host, vec![v4(i)]);
            input.push_str(&host);
            input.push('\n');
        }
        let engine = Engine::new(config(5, 20), sources(), FakeBackend::new(network.clone()), resolver);
        let (result, _) = run_engine(&engine, &input).await;

        assert_eq!(result.unwrap().workers_started, 5);
        assert!(network.peak_captures() <= 5);
        assert!(network.peak_captures() >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_all_workers_failing_still_terminates() {
        let network = FakeNetwork::new();
        network.fail_capture_opens(2);
        let resolver = FakeResolver::new().with_host("a.example", vec![v4(1)]);
        network.set_live(v4(1));
        let engine = Engine::new(config(2, 40), sources(), FakeBackend::new(network.clone()), resolver);

        let (result, lines) = run_engine(&engine, "a.example\na.example\na.example\n").await;
        let summary = result.unwrap();

        assert!(lines.is_empty());
        assert_eq!(summary.workers_failed, 2);
        assert_eq!(summary.probed, 0);
        assert!(network.sent().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let engine = Engine::new(
            config(0, 40),
            sources(),
            FakeBackend::new(FakeNetwork::new()),
            FakeResolver::new(),
        );
        let (result, lines) = run_engine(&engine, "a.example\n").await;
        assert!(matches!(result, Err(ProbeError::InvalidConfig(_))));
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_pool_is_rejected_before_spawning() {
        let network = FakeNetwork::new();
        let engine = Engine::new(
            config(usize::MAX / 4, 40),
            sources(),
            FakeBackend::new(network.clone()),
            FakeResolver::new(),
        );
        let (result, lines) = run_engine(&engine, "a.example\n").await;
        assert!(matches!(result, Err(ProbeError::InvalidConfig(_))));
        assert!(lines.is_empty());
        assert_eq!(network.peak_captures(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_repeat_runs_report_the_same_set() {
        let network = FakeNetwork::new();
        network.set_live(v4(7));
        let resolver = FakeResolver::new()
            .with_host("live.example", vec![v4(7)])
            .with_host("dead.example", vec![v4(8)]);
        let engine = Engine::new(config(2, 40), sources(), FakeBackend::new(network), resolver);

        let (_, first) = run_engine(&engine, "live.example\ndead.example\n").await;
        let (_, second) = run_engine(&engine, "live.example\ndead.example\n").await;
        assert_eq!(first, vec!["https://live.example".to_string()]);
        assert_eq!(first, second);
    }
}
