//! libpcap-backed live capture.
//!
//! Each worker opens its own handle on the probe interface, restricted to
//! inbound traffic. Filters are compiled and attached through
//! `pcap_setfilter`, which returns once the kernel filter is in place.

use crate::error::{ProbeError, ProbeResult};
use crate::scanner::filter::FlowFilter;
use crate::scanner::traits::{CaptureEvent, PacketCapture};
use pcap::{Active, Capture, Direction};
use std::time::Duration;
use tracing::trace;

/// Link-layer framing of captured packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    /// Ethernet II, optionally with one 802.1Q tag.
    Ethernet,
    /// Linux cooked capture v1 (16-byte header).
    LinuxSll,
    /// Linux cooked capture v2 (20-byte header).
    LinuxSll2,
    /// BSD loopback encapsulation (4-byte family).
    Null,
    /// Bare IP datagrams.
    Raw,
}

impl LinkLayer {
    /// Map a libpcap `DLT_*`/`LINKTYPE_*` value.
    pub fn from_linktype(linktype: i32) -> Option<Self> {
        match linktype {
            1 => Some(Self::Ethernet),
            113 => Some(Self::LinuxSll),
            276 => Some(Self::LinuxSll2),
            0 | 108 => Some(Self::Null),
            12 | 14 | 101 | 228 | 229 => Some(Self::Raw),
            _ => None,
        }
    }

    /// Strip the link header, returning the IPv4/IPv6 datagram.
    ///
    /// Returns `None` for non-IP frames or frames too short to hold the
    /// header.
    pub fn network_payload<'a>(&self, frame: &'a [u8]) -> Option<&'a [u8]> {
        match self {
            Self::Ethernet => {
                let ethertype = u16::from_be_bytes([*frame.get(12)?, *frame.get(13)?]);
                match ethertype {
                    ETHERTYPE_IPV4 | ETHERTYPE_IPV6 => frame.get(14..),
                    ETHERTYPE_VLAN => {
                        let inner = u16::from_be_bytes([*frame.get(16)?, *frame.get(17)?]);
                        is_ip(inner).then(|| frame.get(18..)).flatten()
                    }
                    _ => None,
                }
            }
            Self::LinuxSll => {
                let protocol = u16::from_be_bytes([*frame.get(14)?, *frame.get(15)?]);
                is_ip(protocol).then(|| frame.get(16..)).flatten()
            }
            Self::LinuxSll2 => {
                let protocol = u16::from_be_bytes([*frame.get(0)?, *frame.get(1)?]);
                is_ip(protocol).then(|| frame.get(20..)).flatten()
            }
            Self::Null => frame.get(4..),
            Self::Raw => Some(frame),
        }
    }
}

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86dd;
const ETHERTYPE_VLAN: u16 = 0x8100;

fn is_ip(ethertype: u16) -> bool {
    ethertype == ETHERTYPE_IPV4 || ethertype == ETHERTYPE_IPV6
}

/// An inbound-only libpcap handle.
pub struct PcapCapture {
    handle: Capture<Active>,
    link: LinkLayer,
}

impl PcapCapture {
    /// Open a capture on `interface`.
    ///
    /// `poll_interval` becomes the libpcap read timeout, so
    /// [`PacketCapture::next_packet`] returns at least that often.
    ///
    /// # Errors
    /// Returns `ProbeError::Capture` if the device cannot be opened (usually
    /// missing privileges), inbound direction cannot be set, or the link
    /// type is not one we can decode.
    pub fn open(interface: &str, poll_interval: Duration, snaplen: u32) -> ProbeResult<Self> {
        let timeout_ms = i32::try_from(poll_interval.as_millis())
            .unwrap_or(i32::MAX)
            .max(1);
        let snaplen = i32::try_from(snaplen).unwrap_or(i32::MAX);

        let handle = Capture::from_device(interface)
            .and_then(|inactive| {
                inactive
                    .promisc(true)
                    .snaplen(snaplen)
                    .timeout(timeout_ms)
                    .open()
            })
            .map_err(|e| {
                ProbeError::Capture(format!("failed to open capture on {}: {}", interface, e))
            })?;

        handle.direction(Direction::In).map_err(|e| {
            ProbeError::Capture(format!("failed to set capture direction: {}", e))
        })?;

        let linktype = handle.get_datalink();
        let link = LinkLayer::from_linktype(linktype.0).ok_or_else(|| {
            ProbeError::Capture(format!(
                "unsupported link type {} on {}",
                linktype.0, interface
            ))
        })?;

        Ok(Self { handle, link })
    }

    /// Link-layer framing of this handle.
    pub fn link_layer(&self) -> LinkLayer {
        self.link
    }
}

impl PacketCapture for PcapCapture {
    fn set_filter(&mut self, filter: &FlowFilter) -> ProbeResult<()> {
        let expression = filter.to_bpf();
        self.handle
            .filter(&expression, true)
            .map_err(|e| ProbeError::Filter {
                filter: expression,
                reason: e.to_string(),
            })
    }

    fn next_packet(&mut self) -> ProbeResult<CaptureEvent> {
        loop {
            match self.handle.next_packet() {
                Ok(packet) => match self.link.network_payload(packet.data) {
                    Some(datagram) => return Ok(CaptureEvent::Packet(datagram.to_vec())),
                    None => {
                        trace!(len = packet.data.len(), "skipping non-IP frame");
                        continue;
                    }
                },
                Err(pcap::Error::TimeoutExpired) => return Ok(CaptureEvent::PollTimeout),
                Err(e) => return Err(ProbeError::Capture(e.to_string())),
            }
        }
    }
}
