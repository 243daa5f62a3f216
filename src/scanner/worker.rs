//! Probe workers.
//!
//! A worker owns one capture handle and one pair of raw send channels for
//! its whole life, and runs probes strictly one after another:
//!
//! 1. resolve the hostname (bounded by the probe timeout)
//! 2. pick the local source address of the resolved family
//! 3. allocate a source port and form the flow key
//! 4. build the SYN datagram
//! 5. narrow the capture to the flow, then send
//! 6. wait for the SYN-ACK (bounded by the probe timeout)
//!
//! Any failure abandons that hostname only. Failing to acquire the
//! resources in the first place ends the worker.

use crate::config::ProbeConfig;
use crate::error::{ProbeError, ProbeResult};
use crate::interface::SourceAddresses;
use crate::scanner::correlate;
use crate::scanner::filter::FlowFilter;
use crate::scanner::packet;
use crate::scanner::traits::{Backend, PacketCapture, Resolver, Transmitter};
use crate::types::{FlowKey, ProbeOutcome, ProbeTarget, ResolvedAddress, SourcePortAllocator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

/// Shared FIFO of hostnames waiting for a worker.
pub type WorkQueue = Arc<Mutex<mpsc::Receiver<ProbeTarget>>>;

/// The capture handle and transmitter exclusively owned by one worker.
pub struct WorkerResources<B: Backend> {
    capture: B::Capture,
    transmitter: B::Transmitter,
}

impl<B: Backend> WorkerResources<B> {
    /// Open the capture and both raw channels.
    pub fn acquire(backend: &B, config: &ProbeConfig) -> ProbeResult<Self> {
        let capture = backend.open_capture(&config.interface, config.poll_interval, config.snaplen)?;
        let transmitter = backend.open_transmitter()?;
        Ok(Self {
            capture,
            transmitter,
        })
    }

    /// Build, filter, send and correlate one probe.
    ///
    /// The filter is installed before the datagram leaves, so a fast
    /// SYN-ACK cannot be dropped by the previous probe's filter.
    pub fn exchange(&mut self, flow: &FlowKey, timeout: Duration) -> ProbeResult<ProbeOutcome> {
        let datagram = packet::build_syn(flow, rand::random())?;
        self.capture.set_filter(&FlowFilter::replies_to(flow))?;
        self.transmitter.send(flow.destination, &datagram)?;
        Ok(correlate::await_syn_ack(&mut self.capture, timeout))
    }
}

/// What one worker did before it exited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Whether the worker acquired its resources.
    pub started: bool,
    /// Hostnames taken from the queue.
    pub probed: u64,
    /// Hostnames confirmed live.
    pub live: u64,
    /// Hostnames dropped because a probe step failed.
    pub abandoned: u64,
}

/// One member of the worker pool.
pub struct Worker<B: Backend, R: Resolver> {
    id: usize,
    config: Arc<ProbeConfig>,
    sources: SourceAddresses,
    backend: Arc<B>,
    resolver: Arc<R>,
    ports: SourcePortAllocator,
}

impl<B: Backend, R: Resolver> Worker<B, R> {
    pub fn new(
        id: usize,
        config: Arc<ProbeConfig>,
        sources: SourceAddresses,
        backend: Arc<B>,
        resolver: Arc<R>,
    ) -> Self {
        let ports = SourcePortAllocator::new(config.port_strategy, id);
        Self {
            id,
            config,
            sources,
            backend,
            resolver,
            ports,
        }
    }

    /// Drain `queue` until it is closed and empty, sending live targets to
    /// `results`.
    pub async fn run(mut self, queue: WorkQueue, results: mpsc::Sender<ProbeTarget>) -> WorkerReport {
        let mut report = WorkerReport::default();

        let mut resources = match WorkerResources::acquire(self.backend.as_ref(), &self.config) {
            Ok(resources) => resources,
            Err(e) => {
                error!(worker = self.id, "worker failed to acquire probe resources: {}", e);
                return report;
            }
        };
        report.started = true;
        debug!(worker = self.id, "worker ready");

        loop {
            let next = queue.lock().await.recv().await;
            let Some(target) = next else { break };
            report.probed += 1;

            let flow = match self.plan(&target).await {
                Ok(flow) => flow,
                Err(e) => {
                    report.abandoned += 1;
                    debug!(worker = self.id, host = %target, "abandoned: {}", e);
                    continue;
                }
            };

            let timeout = self.config.timeout;
            let joined = tokio::task::spawn_blocking(move || {
                let verdict = resources.exchange(&flow, timeout);
                (resources, verdict)
            })
            .await;

            let verdict = match joined {
                Ok((returned, verdict)) => {
                    resources = returned;
                    verdict
                }
                Err(e) => {
                    // The resources went down with the blocking task.
                    report.abandoned += 1;
                    error!(worker = self.id, host = %target, "probe task failed: {}", e);
                    return report;
                }
            };

            match verdict {
                Ok(ProbeOutcome::Live) => {
                    report.live += 1;
                    debug!(worker = self.id, host = %target, flow = %flow, "SYN-ACK received");
                    if results.send(target).await.is_err() {
                        warn!(worker = self.id, "result sink closed, stopping worker");
                        break;
                    }
                }
                Ok(ProbeOutcome::NotLive) => {
                    debug!(worker = self.id, host = %target, flow = %flow, "no SYN-ACK");
                }
                Err(e) => {
                    report.abandoned += 1;
                    debug!(worker = self.id, host = %target, "abandoned: {}", e);
                }
            }
        }

        debug!(
            worker = self.id,
            probed = report.probed,
            live = report.live,
            "worker finished"
        );
        report
    }

    /// Steps 1-3: resolve, choose the source address, form the flow key.
    async fn plan(&mut self, target: &ProbeTarget) -> ProbeResult<FlowKey> {
        let answer = self
            .resolver
            .resolve(target.hostname(), self.config.timeout)
            .await?;
        let resolved = ResolvedAddress::first_of(target.clone(), &answer)
            .ok_or_else(|| ProbeError::NoAddresses(target.to_string()))?;

        let family = resolved.family();
        let source = self
            .sources
            .for_family(family)
            .ok_or(ProbeError::NoSourceAddress(family))?;

        Ok(FlowKey::https(source, self.ports.next_port(), resolved.ip))
    }
}
