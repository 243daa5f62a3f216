//! Flow identification and ephemeral source-port selection.

use crate::types::AddressFamily;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Destination port every probe targets.
pub const HTTPS_PORT: u16 = 443;

/// First port of the ephemeral source range (inclusive).
pub const EPHEMERAL_PORT_START: u16 = 50000;

/// End of the ephemeral source range (exclusive).
pub const EPHEMERAL_PORT_END: u16 = 60000;

const EPHEMERAL_PORT_SPAN: u16 = EPHEMERAL_PORT_END - EPHEMERAL_PORT_START;

/// The 4-tuple of one in-flight TCP probe. The protocol is always TCP.
///
/// `source` and `destination` are expected to share a family; the packet
/// builder rejects a mixed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub source: IpAddr,
    pub source_port: u16,
    pub destination: IpAddr,
    pub destination_port: u16,
}

impl FlowKey {
    /// Key for a probe of `destination:443`.
    pub fn https(source: IpAddr, source_port: u16, destination: IpAddr) -> Self {
        Self {
            source,
            source_port,
            destination,
            destination_port: HTTPS_PORT,
        }
    }

    /// The same flow seen from the other end.
    pub fn reversed(&self) -> Self {
        Self {
            source: self.destination,
            source_port: self.destination_port,
            destination: self.source,
            destination_port: self.source_port,
        }
    }

    /// Family of the destination address.
    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.destination)
    }

    /// Whether both endpoints share an address family.
    pub fn is_consistent(&self) -> bool {
        self.source.is_ipv4() == self.destination.is_ipv4()
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            std::net::SocketAddr::new(self.source, self.source_port),
            std::net::SocketAddr::new(self.destination, self.destination_port)
        )
    }
}

/// How a worker picks the ephemeral source port of each probe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PortStrategy {
    /// Derive the port from a nanosecond clock reading (best effort).
    #[default]
    Clock,
    /// Walk the range with a per-worker counter (no reuse within one lap).
    Sequential,
}

impl fmt::Display for PortStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clock => write!(f, "clock"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

impl std::str::FromStr for PortStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clock" => Ok(Self::Clock),
            "sequential" | "seq" => Ok(Self::Sequential),
            _ => Err(format!("unknown port strategy: {}", s)),
        }
    }
}

/// Per-worker source port allocator.
///
/// Owned by exactly one worker; collisions between workers using the clock
/// strategy are possible and not detected.
#[derive(Debug, Clone)]
pub struct SourcePortAllocator {
    strategy: PortStrategy,
    next_offset: u16,
}

impl SourcePortAllocator {
    /// Create an allocator. `worker_id` spreads the sequential starting
    /// points of different workers across the range.
    pub fn new(strategy: PortStrategy, worker_id: usize) -> Self {
        let start = (worker_id as u64).wrapping_mul(7919) % u64::from(EPHEMERAL_PORT_SPAN);
        Self {
            strategy,
            next_offset: start as u16,
        }
    }

    /// Strategy in use.
    pub fn strategy(&self) -> PortStrategy {
        self.strategy
    }

    /// Pick the source port for the next probe.
    pub fn next_port(&mut self) -> u16 {
        match self.strategy {
            PortStrategy::Clock => clock_port(),
            PortStrategy::Sequential => {
                let port = EPHEMERAL_PORT_START + self.next_offset;
                self.next_offset = (self.next_offset + 1) % EPHEMERAL_PORT_SPAN;
                port
            }
        }
    }
}

/// Reduce the current nanosecond clock into the ephemeral range.
fn clock_port() -> u16 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    EPHEMERAL_PORT_START + (nanos % u128::from(EPHEMERAL_PORT_SPAN)) as u16
}
