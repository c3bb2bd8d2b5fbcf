//! Hostname resolution ahead of connecting.
//!
//! Some container networks cannot resolve `.local` names through the HTTP
//! stack while the platform resolver can, so requests are sent to a literal
//! IP address instead of the configured hostname.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::debug;
use url::{Host, Url};

/// Resolves a hostname to a single address.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `host`, returning `None` when it does not resolve.
    async fn resolve(&self, host: &str) -> Option<IpAddr>;
}

/// Resolver backed by the platform (`getaddrinfo`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Option<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip);
        }

        match tokio::net::lookup_host((host, 0)).await {
            Ok(addrs) => {
                let ip = pick_address(addrs.map(|addr| addr.ip()));
                debug!(host, ip = ?ip, "Resolved hostname");
                ip
            }
            Err(e) => {
                debug!(host, error = %e, "Hostname lookup failed");
                None
            }
        }
    }
}

/// Fixed host table, for pinned addresses and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, IpAddr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an entry.
    pub fn with_host(mut self, host: impl Into<String>, ip: IpAddr) -> Self {
        self.hosts.insert(host.into().to_ascii_lowercase(), ip);
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Option<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip);
        }
        self.hosts.get(&host.to_ascii_lowercase()).copied()
    }
}

/// Choose one address out of a lookup result, IPv4 first.
pub fn pick_address(addrs: impl IntoIterator<Item = IpAddr>) -> Option<IpAddr> {
    let mut fallback = None;
    for ip in addrs {
        if ip.is_ipv4() {
            return Some(ip);
        }
        fallback.get_or_insert(ip);
    }
    fallback
}

/// Rewrite `url` so its host is a literal IP address.
///
/// Scheme, port and path are kept. If the host is already an address or
/// does not resolve, `url` is returned unchanged.
pub async fn resolve_url(resolver: &dyn HostResolver, url: &Url) -> Url {
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain,
        _ => return url.clone(),
    };

    match resolver.resolve(host).await {
        Some(ip) => {
            let mut resolved = url.clone();
            match resolved.set_ip_host(ip) {
                Ok(()) => resolved,
                Err(()) => url.clone(),
            }
        }
        None => url.clone(),
    }
}
