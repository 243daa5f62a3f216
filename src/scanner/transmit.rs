//! Raw IPv4/IPv6 transmission.
//!
//! Both sockets are opened with `IPPROTO_RAW`, which on Linux implies
//! `IP_HDRINCL` / `IPV6_HDRINCL`: the kernel sends the datagrams built by
//! [`super::packet`] as they are, without adding its own IP header.
//!
//! Requires `CAP_NET_RAW` (root/sudo).

use crate::error::{ProbeError, ProbeResult};
use crate::scanner::traits::Transmitter;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{IpAddr, SocketAddr};

/// A pair of raw send channels, one per address family.
pub struct RawTransmitter {
    v4: Socket,
    v6: Socket,
}

impl RawTransmitter {
    /// Open both raw sockets.
    ///
    /// # Errors
    /// Returns `ProbeError::RawSocket` when either socket cannot be created.
    pub fn open() -> ProbeResult<Self> {
        let v4 = open_raw(Domain::IPV4)?;
        let v6 = open_raw(Domain::IPV6)?;
        Ok(Self { v4, v6 })
    }
}

fn open_raw(domain: Domain) -> ProbeResult<Socket> {
    Socket::new(domain, Type::RAW, Some(Protocol::from(libc::IPPROTO_RAW))).map_err(|e| {
        let family = if domain == Domain::IPV4 { "IPv4" } else { "IPv6" };
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ProbeError::RawSocket(format!(
                "{} raw socket requires root/sudo privileges: {}",
                family, e
            ))
        } else {
            ProbeError::RawSocket(format!("failed to create {} raw socket: {}", family, e))
        }
    })
}

impl Transmitter for RawTransmitter {
    fn send(&mut self, destination: IpAddr, datagram: &[u8]) -> ProbeResult<()> {
        let socket = match destination {
            IpAddr::V4(_) => &self.v4,
            IpAddr::V6(_) => &self.v6,
        };
        // Raw sockets take the port from the datagram; the address port must be 0.
        let address = SockAddr::from(SocketAddr::new(destination, 0));

        socket
            .send_to(datagram, &address)
            .map(|_| ())
            .map_err(|e| ProbeError::Send {
                destination: destination.to_string(),
                reason: e.to_string(),
            })
    }
}
