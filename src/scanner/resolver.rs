//! DNS resolution with a per-lookup deadline.

use crate::error::{ProbeError, ProbeResult};
use crate::scanner::traits::Resolver;
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Resolver backed by the system DNS configuration.
pub struct DnsResolver {
    inner: TokioAsyncResolver,
}

impl DnsResolver {
    /// Build a resolver from `/etc/resolv.conf`, falling back to the
    /// library defaults if the system configuration cannot be read.
    pub fn from_system() -> Self {
        let inner = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            warn!("failed to read system DNS configuration, using defaults: {}", e);
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { inner }
    }
}

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, hostname: &str, deadline: Duration) -> ProbeResult<Vec<IpAddr>> {
        // IP literals need no lookup.
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        match timeout(deadline, self.inner.lookup_ip(hostname)).await {
            Ok(Ok(response)) => Ok(response.iter().collect()),
            Ok(Err(e)) => Err(ProbeError::DnsResolution {
                host: hostname.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ProbeError::ResolveTimeout(hostname.to_string())),
        }
    }
}
