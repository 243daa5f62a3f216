//! Capability traits consumed by the probing core.
//!
//! Each platform concern sits behind a narrow trait so the worker logic
//! never touches libpcap, raw sockets or DNS directly. The production
//! implementations live in [`super::capture`], [`super::transmit`] and
//! [`super::resolver`]; tests substitute in-memory fakes.

use crate::error::ProbeResult;
use crate::scanner::filter::FlowFilter;
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

/// One poll of a capture handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A captured datagram, link-layer header already stripped.
    Packet(Vec<u8>),
    /// The poll interval elapsed without traffic.
    PollTimeout,
}

/// Hostname to address resolution.
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Resolve `hostname`, giving up after `deadline`.
    async fn resolve(&self, hostname: &str, deadline: Duration) -> ProbeResult<Vec<IpAddr>>;
}

/// An inbound-only live capture bound to one interface.
pub trait PacketCapture: Send + 'static {
    /// Narrow the capture to `filter`. Returns only once the filter is active.
    fn set_filter(&mut self, filter: &FlowFilter) -> ProbeResult<()>;

    /// Wait up to one poll interval for the next matching datagram.
    fn next_packet(&mut self) -> ProbeResult<CaptureEvent>;
}

/// Raw transmission of prebuilt network-layer datagrams.
pub trait Transmitter: Send + 'static {
    /// Send `datagram` to `destination` on the channel for its family.
    fn send(&mut self, destination: IpAddr, datagram: &[u8]) -> ProbeResult<()>;
}

/// Factory for the per-worker capture and transmission resources.
///
/// # Example
///
/// ```ignore
/// use turboprobe::scanner::{Backend, SystemBackend};
///
/// let backend = SystemBackend;
/// let capture = backend.open_capture("eth0", Duration::from_millis(100), 128)?;
/// ```
pub trait Backend: Send + Sync + 'static {
    type Capture: PacketCapture;
    type Transmitter: Transmitter;

    /// Open an inbound-only capture on `interface`.
    fn open_capture(
        &self,
        interface: &str,
        poll_interval: Duration,
        snaplen: u32,
    ) -> ProbeResult<Self::Capture>;

    /// Open the raw IPv4 and IPv6 send channels.
    fn open_transmitter(&self) -> ProbeResult<Self::Transmitter>;
}
