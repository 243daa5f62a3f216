//! SYN datagram construction and reply inspection.
//!
//! Probes are built at the network layer (no link header): the raw
//! sockets in [`super::transmit`] hand them to the kernel verbatim.
//!
//! Layout of an IPv4 probe:
//!
//! ```text
//! +-------------------+-------------------+
//! | IPv4 header (20)  | TCP header (20)   |
//! +-------------------+-------------------+
//! ```
//!
//! and of an IPv6 probe the same with a 40-byte fixed header. The TCP
//! checksum covers the family-specific pseudo-header.

use crate::error::{ProbeError, ProbeResult};
use crate::types::FlowKey;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{self, Ipv4Flags, Ipv4Packet, MutableIpv4Packet};
use pnet::packet::ipv6::{Ipv6Packet, MutableIpv6Packet};
use pnet::packet::tcp::{self, MutableTcpPacket, TcpFlags, TcpPacket};
use pnet::packet::Packet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

pub const IPV4_HEADER_LEN: usize = 20;
pub const IPV6_HEADER_LEN: usize = 40;
pub const TCP_HEADER_LEN: usize = 20;

/// Initial TTL / hop limit of every probe.
pub const PROBE_TTL: u8 = 64;

/// Advertised receive window of every probe.
pub const PROBE_WINDOW: u16 = 64240;

/// Which handshake segment to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Opening SYN, no ACK.
    Syn,
    /// Server answer to a SYN.
    SynAck { acknowledgement: u32 },
}

/// Build the SYN probe for `flow`.
///
/// # Errors
/// Returns `ProbeError::InvalidPacket` if the flow mixes address families.
pub fn build_syn(flow: &FlowKey, sequence: u32) -> ProbeResult<Vec<u8>> {
    build_segment(flow, sequence, SegmentKind::Syn)
}

/// Build an IPv4 or IPv6 datagram carrying a bare TCP handshake segment.
pub fn build_segment(flow: &FlowKey, sequence: u32, kind: SegmentKind) -> ProbeResult<Vec<u8>> {
    match (flow.source, flow.destination) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => build_v4(src, dst, flow, sequence, kind),
        (IpAddr::V6(src), IpAddr::V6(dst)) => build_v6(src, dst, flow, sequence, kind),
        _ => Err(ProbeError::InvalidPacket(format!(
            "address family mismatch in flow {}",
            flow
        ))),
    }
}

fn build_v4(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    flow: &FlowKey,
    sequence: u32,
    kind: SegmentKind,
) -> ProbeResult<Vec<u8>> {
    let mut buffer = vec![0u8; IPV4_HEADER_LEN + TCP_HEADER_LEN];

    {
        let mut ip_packet = MutableIpv4Packet::new(&mut buffer)
            .ok_or_else(|| ProbeError::InvalidPacket("Failed to create IPv4 packet".to_string()))?;

        ip_packet.set_version(4);
        ip_packet.set_header_length((IPV4_HEADER_LEN / 4) as u8);
        ip_packet.set_dscp(0);
        ip_packet.set_ecn(0);
        ip_packet.set_total_length((IPV4_HEADER_LEN + TCP_HEADER_LEN) as u16);
        ip_packet.set_identification(rand::random());
        ip_packet.set_flags(Ipv4Flags::DontFragment);
        ip_packet.set_fragment_offset(0);
        ip_packet.set_ttl(PROBE_TTL);
        ip_packet.set_next_level_protocol(IpNextHeaderProtocols::Tcp);
        ip_packet.set_source(src);
        ip_packet.set_destination(dst);
        ip_packet.set_checksum(ipv4::checksum(&ip_packet.to_immutable()));
    }

    {
        let mut tcp_packet = MutableTcpPacket::new(&mut buffer[IPV4_HEADER_LEN..])
            .ok_or_else(|| ProbeError::InvalidPacket("Failed to create TCP packet".to_string()))?;

        fill_tcp(&mut tcp_packet, flow, sequence, kind);
        let checksum = tcp::ipv4_checksum(&tcp_packet.to_immutable(), &src, &dst);
        tcp_packet.set_checksum(checksum);
    }

    Ok(buffer)
}

fn build_v6(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    flow: &FlowKey,
    sequence: u32,
    kind: SegmentKind,
) -> ProbeResult<Vec<u8>> {
    let mut buffer = vec![0u8; IPV6_HEADER_LEN + TCP_HEADER_LEN];

    {
        let mut ip_packet = MutableIpv6Packet::new(&mut buffer)
            .ok_or_else(|| ProbeError::InvalidPacket("Failed to create IPv6 packet".to_string()))?;

        ip_packet.set_version(6);
        ip_packet.set_traffic_class(0);
        ip_packet.set_flow_label(0);
        ip_packet.set_payload_length(TCP_HEADER_LEN as u16);
        ip_packet.set_next_header(IpNextHeaderProtocols::Tcp);
        ip_packet.set_hop_limit(PROBE_TTL);
        ip_packet.set_source(src);
        ip_packet.set_destination(dst);
    }

    {
        let mut tcp_packet = MutableTcpPacket::new(&mut buffer[IPV6_HEADER_LEN..])
            .ok_or_else(|| ProbeError::InvalidPacket("Failed to create TCP packet".to_string()))?;

        fill_tcp(&mut tcp_packet, flow, sequence, kind);
        let checksum = tcp::ipv6_checksum(&tcp_packet.to_immutable(), &src, &dst);
        tcp_packet.set_checksum(checksum);
    }

    Ok(buffer)
}

fn fill_tcp(tcp_packet: &mut MutableTcpPacket<'_>, flow: &FlowKey, sequence: u32, kind: SegmentKind) {
    tcp_packet.set_source(flow.source_port);
    tcp_packet.set_destination(flow.destination_port);
    tcp_packet.set_sequence(sequence);
    tcp_packet.set_data_offset((TCP_HEADER_LEN / 4) as u8);
    tcp_packet.set_reserved(0);
    match kind {
        SegmentKind::Syn => {
            tcp_packet.set_acknowledgement(0);
            tcp_packet.set_flags(TcpFlags::SYN);
        }
        SegmentKind::SynAck { acknowledgement } => {
            tcp_packet.set_acknowledgement(acknowledgement);
            tcp_packet.set_flags(TcpFlags::SYN | TcpFlags::ACK);
        }
    }
    tcp_packet.set_window(PROBE_WINDOW);
    tcp_packet.set_urgent_ptr(0);
}

/// What the correlator and filters need to know about a captured datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSummary {
    /// Addresses and ports as they appear on the wire.
    pub flow: FlowKey,
    pub syn: bool,
    pub ack: bool,
    pub sequence: u32,
}

impl SegmentSummary {
    pub fn is_syn_ack(&self) -> bool {
        self.syn && self.ack
    }
}

/// Parse an IPv4/IPv6 datagram carrying TCP.
///
/// Returns `None` for anything else, including truncated headers and IPv6
/// packets whose next header is not TCP.
pub fn inspect(datagram: &[u8]) -> Option<SegmentSummary> {
    let version = datagram.first()? >> 4;
    match version {
        4 => {
            let ip_packet = Ipv4Packet::new(datagram)?;
            if ip_packet.get_next_level_protocol() != IpNextHeaderProtocols::Tcp {
                return None;
            }
            let header_len = usize::from(ip_packet.get_header_length()) * 4;
            let tcp_packet = TcpPacket::new(datagram.get(header_len..)?)?;
            Some(summarize(
                IpAddr::V4(ip_packet.get_source()),
                IpAddr::V4(ip_packet.get_destination()),
                &tcp_packet,
            ))
        }
        6 => {
            let ip_packet = Ipv6Packet::new(datagram)?;
            if ip_packet.get_next_header() != IpNextHeaderProtocols::Tcp {
                return None;
            }
            let tcp_packet = TcpPacket::new(ip_packet.payload())?;
            Some(summarize(
                IpAddr::V6(ip_packet.get_source()),
                IpAddr::V6(ip_packet.get_destination()),
                &tcp_packet,
            ))
        }
        _ => None,
    }
}

fn summarize(source: IpAddr, destination: IpAddr, tcp_packet: &TcpPacket<'_>) -> SegmentSummary {
    let flags = tcp_packet.get_flags();
    SegmentSummary {
        flow: FlowKey {
            source,
            source_port: tcp_packet.get_source(),
            destination,
            destination_port: tcp_packet.get_destination(),
        },
        syn: flags & TcpFlags::SYN != 0,
        ack: flags & TcpFlags::ACK != 0,
        sequence: tcp_packet.get_sequence(),
    }
}
