//! In-memory backend for tests.
//!
//! A [`FakeNetwork`] plays the role of the wire and the remote hosts: a
//! SYN sent to a "live" address is answered with a SYN-ACK delivered to
//! every open capture, preceded by a decoy SYN-ACK for a neighbouring flow.
//! Captures apply their [`FlowFilter`] in-process, so only the right worker
//! sees the real answer.

use crate::error::{ProbeError, ProbeResult};
use crate::scanner::filter::FlowFilter;
use crate::scanner::packet::{self, SegmentKind};
use crate::scanner::traits::{Backend, CaptureEvent, PacketCapture, Resolver, Transmitter};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Inbox = Arc<Mutex<VecDeque<Vec<u8>>>>;

#[derive(Default)]
struct NetState {
    live: HashSet<IpAddr>,
    failing_sends: HashSet<IpAddr>,
    inboxes: Vec<Inbox>,
    sent: Vec<(IpAddr, Vec<u8>)>,
    events: Vec<String>,
    capture_failures: usize,
    open_captures: usize,
    peak_captures: usize,
}

/// Shared fake wire. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct FakeNetwork {
    state: Arc<Mutex<NetState>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answer SYNs to `ip` with SYN-ACKs.
    pub fn set_live(&self, ip: IpAddr) {
        self.lock().live.insert(ip);
    }

    /// Make sends to `ip` fail.
    pub fn fail_sends_to(&self, ip: IpAddr) {
        self.lock().failing_sends.insert(ip);
    }

    /// Make the next `count` capture opens fail.
    pub fn fail_capture_opens(&self, count: usize) {
        self.lock().capture_failures = count;
    }

    /// Every datagram handed to a transmitter.
    pub fn sent(&self) -> Vec<(IpAddr, Vec<u8>)> {
        self.lock().sent.clone()
    }

    /// Filter installs and sends, in order.
    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    /// Highest number of captures open at once.
    pub fn peak_captures(&self) -> usize {
        self.lock().peak_captures
    }

    fn deliver(state: &NetState, datagram: Vec<u8>) {
        for inbox in &state.inboxes {
            inbox
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push_back(datagram.clone());
        }
    }
}

/// Capture reading from a [`FakeNetwork`] inbox.
pub struct FakeCapture {
    network: FakeNetwork,
    inbox: Inbox,
    filter: Option<FlowFilter>,
    poll_interval: Duration,
}

impl PacketCapture for FakeCapture {
    fn set_filter(&mut self, filter: &FlowFilter) -> ProbeResult<()> {
        self.network.lock().events.push(format!("filter {}", filter));
        self.filter = Some(*filter);
        Ok(())
    }

    fn next_packet(&mut self) -> ProbeResult<CaptureEvent> {
        loop {
            let next = self
                .inbox
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front();
            match next {
                Some(datagram) => {
                    let wanted = self.filter.map_or(true, |f| f.matches(&datagram));
                    if wanted {
                        return Ok(CaptureEvent::Packet(datagram));
                    }
                }
                None => {
                    std::thread::sleep(self.poll_interval);
                    return Ok(CaptureEvent::PollTimeout);
                }
            }
        }
    }
}

impl Drop for FakeCapture {
    fn drop(&mut self) {
        let mut state = self.network.lock();
        state.open_captures -= 1;
        state.inboxes.retain(|inbox| !Arc::ptr_eq(inbox, &self.inbox));
    }
}

/// Transmitter writing onto a [`FakeNetwork`].
pub struct FakeTransmitter {
    network: FakeNetwork,
}

impl Transmitter for FakeTransmitter {
    fn send(&mut self, destination: IpAddr, datagram: &[u8]) -> ProbeResult<()> {
        let mut state = self.network.lock();
        state.events.push(format!("send {}", destination));
        if state.failing_sends.contains(&destination) {
            return Err(ProbeError::Send {
                destination: destination.to_string(),
                reason: "network is unreachable".to_string(),
            });
        }
        state.sent.push((destination, datagram.to_vec()));

        let Some(probe) = packet::inspect(datagram) else {
            return Ok(());
        };
        if !probe.syn || probe.ack || !state.live.contains(&destination) {
            return Ok(());
        }

        let reply = probe.flow.reversed();
        let kind = SegmentKind::SynAck {
            acknowledgement: probe.sequence.wrapping_add(1),
        };
        let mut decoy = reply;
        decoy.destination_port = reply.destination_port.wrapping_add(1);
        for flow in [decoy, reply] {
            let answer = packet::build_segment(&flow, 1000, kind)?;
            FakeNetwork::deliver(&state, answer);
        }
        Ok(())
    }
}

/// Backend handing out fake captures and transmitters.
pub struct FakeBackend {
    network: FakeNetwork,
}

impl FakeBackend {
    pub fn new(network: FakeNetwork) -> Self {
        Self { network }
    }
}

impl Backend for FakeBackend {
    type Capture = FakeCapture;
    type Transmitter = FakeTransmitter;

    fn open_capture(
        &self,
        interface: &str,
        poll_interval: Duration,
        _snaplen: u32,
    ) -> ProbeResult<FakeCapture> {
        let mut state = self.network.lock();
        if state.capture_failures > 0 {
            state.capture_failures -= 1;
            return Err(ProbeError::Capture(format!(
                "failed to open capture on {}: permission denied",
                interface
            )));
        }
        let inbox = Inbox::default();
        state.inboxes.push(Arc::clone(&inbox));
        state.open_captures += 1;
        state.peak_captures = state.peak_captures.max(state.open_captures);

        Ok(FakeCapture {
            network: self.network.clone(),
            inbox,
            filter: None,
            poll_interval,
        })
    }

    fn open_transmitter(&self) -> ProbeResult<FakeTransmitter> {
        Ok(FakeTransmitter {
            network: self.network.clone(),
        })
    }
}

/// Resolver answering from a fixed table; unknown names fail.
#[derive(Default)]
pub struct FakeResolver {
    records: HashMap<String, Vec<IpAddr>>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, hostname: &str, ips: Vec<IpAddr>) -> Self {
        self.records.insert(hostname.to_string(), ips);
        self
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve(&self, hostname: &str, _deadline: Duration) -> ProbeResult<Vec<IpAddr>> {
        self.records
            .get(hostname)
            .cloned()
            .ok_or_else(|| ProbeError::DnsResolution {
                host: hostname.to_string(),
                reason: "NXDOMAIN".to_string(),
            })
    }
}
