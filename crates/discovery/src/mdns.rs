//! Passive discovery from mDNS/DNS-SD announcements.

use crate::types::{Announcement, DiscoveredCandidate, DiscoveryError, candidate_url};
use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace};

/// Source of service announcements.
#[async_trait]
pub trait AnnouncementSource: Send + Sync {
    /// Collect announcements for `service_type` until `window` elapses.
    async fn browse(
        &self,
        service_type: &str,
        window: Duration,
    ) -> Result<Vec<Announcement>, DiscoveryError>;
}

/// Multicast DNS browser.
///
/// A fresh daemon is started for every browse and shut down afterwards, so
/// no sockets stay open between discovery calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct MdnsBrowser;

#[async_trait]
impl AnnouncementSource for MdnsBrowser {
    async fn browse(
        &self,
        service_type: &str,
        window: Duration,
    ) -> Result<Vec<Announcement>, DiscoveryError> {
        let daemon = ServiceDaemon::new().map_err(|e| DiscoveryError::Mdns(e.to_string()))?;
        let receiver = daemon
            .browse(service_type)
            .map_err(|e| DiscoveryError::Mdns(e.to_string()))?;

        let deadline = Instant::now() + window;
        let mut found = Vec::new();

        loop {
            match timeout_at(deadline, receiver.recv_async()).await {
                Ok(Ok(ServiceEvent::ServiceResolved(info))) => {
                    debug!(name = info.get_fullname(), port = info.get_port(), "Service resolved");
                    found.push(Announcement {
                        fullname: info.get_fullname().to_string(),
                        port: info.get_port(),
                        addresses: info.get_addresses().iter().copied().collect(),
                    });
                }
                Ok(Ok(event)) => {
                    trace!(?event, "Ignoring mDNS event");
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "mDNS browse channel closed");
                    break;
                }
                // Listen window elapsed
                Err(_) => break,
            }
        }

        if let Err(e) = daemon.stop_browse(service_type) {
            debug!(error = %e, "Failed to stop mDNS browse");
        }
        if let Err(e) = daemon.shutdown() {
            debug!(error = %e, "Failed to shut down mDNS daemon");
        }

        Ok(found)
    }
}

/// Turn an announcement into a candidate.
///
/// Announcements without an address are dropped. Addresses are ordered
/// IPv4 first and the URL is built from the first one.
pub fn candidate_from_announcement(
    announcement: &Announcement,
    service_type: &str,
) -> Option<DiscoveredCandidate> {
    let mut addresses = announcement.addresses.clone();
    addresses.sort_by_key(|ip| (ip.is_ipv6(), *ip));
    addresses.dedup();

    let first = *addresses.first()?;

    let suffix = format!(".{}", service_type);
    let name = announcement
        .fullname
        .strip_suffix(&suffix)
        .unwrap_or(&announcement.fullname)
        .to_string();

    Some(DiscoveredCandidate {
        name,
        url: candidate_url(first, announcement.port),
        addresses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SERVICE_TYPE;

    fn announcement(fullname: &str, addresses: &[&str]) -> Announcement {
        Announcement {
            fullname: fullname.to_string(),
            port: 8123,
            addresses: addresses.iter().map(|a| a.parse().unwrap()).collect(),
        }
    }

    #[test]
    fn test_candidate_strips_service_suffix() {
        let candidate = candidate_from_announcement(
            &announcement("Home._home-assistant._tcp.local.", &["10.0.0.151"]),
            SERVICE_TYPE,
        )
        .unwrap();

        assert_eq!(candidate.name, "Home");
        assert_eq!(candidate.url, "http://10.0.0.151:8123");
        assert_eq!(candidate.addresses.len(), 1);
    }

    #[test]
    fn test_candidate_prefers_ipv4_address() {
        let candidate = candidate_from_announcement(
            &announcement(
                "Cabin._home-assistant._tcp.local.",
                &["fe80::1", "192.168.1.20", "fe80::1"],
            ),
            SERVICE_TYPE,
        )
        .unwrap();

        assert_eq!(candidate.url, "http://192.168.1.20:8123");
        assert_eq!(
            candidate.addresses,
            vec!["192.168.1.20".parse::<std::net::IpAddr>().unwrap(), "fe80::1".parse().unwrap()]
        );
    }

    #[test]
    fn test_candidate_without_address_is_dropped() {
        assert!(
            candidate_from_announcement(
                &announcement("Ghost._home-assistant._tcp.local.", &[]),
                SERVICE_TYPE
            )
            .is_none()
        );
    }

    #[test]
    fn test_foreign_name_kept_whole() {
        let candidate =
            candidate_from_announcement(&announcement("odd-name", &["10.0.0.2"]), SERVICE_TYPE)
                .unwrap();
        assert_eq!(candidate.name, "odd-name");
    }
}
