//! Flow-scoped capture filters.
//!
//! A [`FlowFilter`] selects exactly the replies to one probe. It renders
//! to a BPF expression for libpcap and can also be evaluated in-process,
//! which is what capture backends without a kernel filter use.

use crate::scanner::packet;
use crate::types::{AddressFamily, FlowKey};
use std::fmt;

/// Filter matching packets travelling back along one probe's flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowFilter {
    reply: FlowKey,
}

impl FlowFilter {
    /// Filter for replies to the probe identified by `probe`.
    pub fn replies_to(probe: &FlowKey) -> Self {
        Self {
            reply: probe.reversed(),
        }
    }

    /// The flow a matching reply carries (remote -> local).
    pub fn reply_flow(&self) -> &FlowKey {
        &self.reply
    }

    /// Whether a network-layer datagram belongs to this flow.
    pub fn matches(&self, datagram: &[u8]) -> bool {
        packet::inspect(datagram).is_some_and(|segment| segment.flow == self.reply)
    }

    /// BPF expression for this filter.
    pub fn to_bpf(&self) -> String {
        let network = match self.reply.family() {
            AddressFamily::V4 => "ip",
            AddressFamily::V6 => "ip6",
        };
        format!(
            "{} and tcp and src host {} and dst host {} and src port {} and dst port {}",
            network,
            self.reply.source,
            self.reply.destination,
            self.reply.source_port,
            self.reply.destination_port
        )
    }
}

impl fmt::Display for FlowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bpf())
    }
}
