//! Probe target types.
//!
//! A hostname enters as a [`ProbeTarget`], becomes a [`ResolvedAddress`]
//! once the resolver answers, and ends as a [`ProbeOutcome`].

use std::fmt;
use std::net::IpAddr;

/// A hostname read from input, waiting to be probed.
///
/// The only validation is that it is non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeTarget(String);

impl ProbeTarget {
    /// Build a target from one input line, returning `None` for blank lines.
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The hostname as given on input.
    pub fn hostname(&self) -> &str {
        &self.0
    }

    /// The result line printed for a live target.
    pub fn https_url(&self) -> String {
        format!("https://{}", self.0)
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Family of the given address.
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
        }
    }
}

/// A target that the resolver answered for.
///
/// Only the first address of the answer is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedAddress {
    /// The original hostname.
    pub target: ProbeTarget,
    /// The resolved IP address.
    pub ip: IpAddr,
}

impl ResolvedAddress {
    /// Take the first address of a resolver answer, if any.
    pub fn first_of(target: ProbeTarget, answer: &[IpAddr]) -> Option<Self> {
        answer.first().map(|&ip| Self { target, ip })
    }

    /// Address family of the resolved IP.
    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.ip)
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.target, self.ip)
    }
}

/// Verdict for one probe.
///
/// Only `Live` is ever reported; every other cause collapses to `NotLive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A SYN-ACK came back from port 443.
    Live,
    /// No SYN-ACK within the deadline, or the probe failed.
    NotLive,
}

impl ProbeOutcome {
    pub fn is_live(self) -> bool {
        self == Self::Live
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::NotLive => write!(f, "not live"),
        }
    }
}
