//! Local source-address discovery.
//!
//! Runs once at startup: the chosen IPv4 and IPv6 addresses are the
//! sources of every probe for the lifetime of the process.

use crate::error::{ProbeError, ProbeResult};
use crate::types::AddressFamily;
use pnet::datalink::{self, NetworkInterface};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Source addresses used for outgoing probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceAddresses {
    pub v4: Option<Ipv4Addr>,
    pub v6: Option<Ipv6Addr>,
}

impl SourceAddresses {
    /// Look up `interface_name` and pick one usable address per family.
    ///
    /// # Errors
    /// - `ProbeError::InterfaceNotFound` if no interface has that name
    /// - `ProbeError::MissingInterfaceAddress` if either family is missing
    pub fn discover(interface_name: &str) -> ProbeResult<Self> {
        let interface = find_interface(interface_name)?;
        Self::from_ips(interface.ips.iter().map(|net| net.ip())).require_both(interface_name)
    }

    /// Pick the first usable address of each family.
    ///
    /// Loopback, unspecified and link-local addresses of either family are
    /// skipped: they cannot source packets to remote hosts.
    pub fn from_ips<I: IntoIterator<Item = IpAddr>>(ips: I) -> Self {
        let mut sources = Self::default();
        for ip in ips {
            match ip {
                IpAddr::V4(addr) if sources.v4.is_none() && is_usable_v4(&addr) => {
                    sources.v4 = Some(addr);
                }
                IpAddr::V6(addr) if sources.v6.is_none() && is_usable_v6(&addr) => {
                    sources.v6 = Some(addr);
                }
                _ => {}
            }
        }
        sources
    }

    /// Fail unless both families have an address.
    pub fn require_both(self, interface_name: &str) -> ProbeResult<Self> {
        for family in [AddressFamily::V4, AddressFamily::V6] {
            if self.for_family(family).is_none() {
                return Err(ProbeError::MissingInterfaceAddress {
                    interface: interface_name.to_string(),
                    family,
                });
            }
        }
        Ok(self)
    }

    /// Source address for probes of the given family.
    pub fn for_family(&self, family: AddressFamily) -> Option<IpAddr> {
        match family {
            AddressFamily::V4 => self.v4.map(IpAddr::V4),
            AddressFamily::V6 => self.v6.map(IpAddr::V6),
        }
    }
}

fn is_usable_v4(addr: &Ipv4Addr) -> bool {
    !addr.is_loopback() && !addr.is_unspecified() && !addr.is_link_local()
}

fn is_usable_v6(addr: &Ipv6Addr) -> bool {
    let link_local = (addr.segments()[0] & 0xffc0) == 0xfe80;
    !addr.is_loopback() && !addr.is_unspecified() && !link_local
}

/// Find a network interface by name.
fn find_interface(name: &str) -> ProbeResult<NetworkInterface> {
    datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| ProbeError::InterfaceNotFound(name.to_string()))
}
