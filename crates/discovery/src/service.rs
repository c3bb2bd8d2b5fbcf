//! Discovery service combining the passive and active phases.

use crate::mdns::{AnnouncementSource, MdnsBrowser, candidate_from_announcement};
use crate::probe::probe_host;
use crate::types::{DiscoveredCandidate, DiscoveryError, DiscoveryOptions, MAX_LISTEN_WINDOW};
use controller::{HostResolver, SystemResolver};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Finds controllers on the local network.
pub struct DiscoveryService {
    source: Arc<dyn AnnouncementSource>,
    resolver: Arc<dyn HostResolver>,
    options: DiscoveryOptions,
    http: reqwest::Client,
}

impl DiscoveryService {
    /// Create a service using mDNS and the platform resolver.
    pub fn new(options: DiscoveryOptions) -> Result<Self, DiscoveryError> {
        let http = reqwest::Client::builder()
            .timeout(options.probe_timeout)
            // The endpoint itself must answer; a redirect is not a controller
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            source: Arc::new(MdnsBrowser),
            resolver: Arc::new(SystemResolver),
            options,
            http,
        })
    }

    /// Replace the announcement source.
    pub fn with_source(mut self, source: Arc<dyn AnnouncementSource>) -> Self {
        self.source = source;
        self
    }

    /// Replace the resolver used by the active phase.
    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Scan for controllers.
    ///
    /// Listens for announcements for `timeout`; only when that yields
    /// nothing are the well-known hosts probed. Results are deduplicated
    /// by URL, first seen wins.
    pub async fn discover(
        &self,
        timeout: Duration,
    ) -> Result<Vec<DiscoveredCandidate>, DiscoveryError> {
        validate_timeout(timeout)?;
        let start = Instant::now();

        let mut found = self.discover_passive(timeout).await;
        let phase = if found.is_empty() {
            found = self.discover_active().await;
            "probe"
        } else {
            "mdns"
        };

        let unique = dedupe_by_url(found);
        info!(
            phase,
            count = unique.len(),
            duration_ms = start.elapsed().as_millis(),
            "Discovery finished"
        );
        Ok(unique)
    }

    /// Passive phase only. Source failures count as no announcements.
    pub async fn discover_passive(&self, window: Duration) -> Vec<DiscoveredCandidate> {
        let service_type = &self.options.service_type;

        match self.source.browse(service_type, window).await {
            Ok(announcements) => announcements
                .iter()
                .filter_map(|a| candidate_from_announcement(a, service_type))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Passive discovery failed");
                Vec::new()
            }
        }
    }

    /// Active phase only. All hosts are probed concurrently; result order
    /// follows the host table.
    pub async fn discover_active(&self) -> Vec<DiscoveredCandidate> {
        debug!(hosts = self.options.hosts.len(), "Probing well-known hosts");

        let probes = self.options.hosts.iter().map(|target| {
            probe_host(
                &self.http,
                self.resolver.as_ref(),
                target,
                &self.options.probe_path,
                self.options.probe_timeout,
            )
        });

        join_all(probes).await.into_iter().flatten().collect()
    }
}

/// Keep the first candidate for each URL, preserving order.
pub fn dedupe_by_url(candidates: Vec<DiscoveredCandidate>) -> Vec<DiscoveredCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.url.clone()))
        .collect()
}

fn validate_timeout(timeout: Duration) -> Result<(), DiscoveryError> {
    if timeout.is_zero() || timeout > MAX_LISTEN_WINDOW {
        return Err(DiscoveryError::InvalidTimeout(timeout));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, url: &str) -> DiscoveredCandidate {
        DiscoveredCandidate {
            name: name.to_string(),
            url: url.to_string(),
            addresses: vec![],
        }
    }

    #[test]
    fn test_dedupe_keeps_first_seen() {
        let unique = dedupe_by_url(vec![
            candidate("Home", "http://10.0.0.5:8123"),
            candidate("Cabin", "http://10.0.0.9:8123"),
            candidate("Home (dup)", "http://10.0.0.5:8123"),
        ]);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].name, "Home");
        assert_eq!(unique[1].name, "Cabin");
    }

    #[test]
    fn test_validate_timeout() {
        tokio_test::assert_ok!(validate_timeout(Duration::from_secs(5)));
        assert!(validate_timeout(MAX_LISTEN_WINDOW).is_ok());
        assert!(matches!(
            validate_timeout(Duration::ZERO),
            Err(DiscoveryError::InvalidTimeout(_))
        ));
        assert!(matches!(
            validate_timeout(Duration::from_secs(61)),
            Err(DiscoveryError::InvalidTimeout(_))
        ));
    }
}
