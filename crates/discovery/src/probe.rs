//! Active discovery by probing well-known hostnames.

use crate::types::{DiscoveredCandidate, WellKnownHost};
use controller::HostResolver;
use reqwest::StatusCode;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

/// Probe one host for a controller.
///
/// The request goes to the resolved address while the candidate reports
/// the hostname URL. 200 and 401 both mean a controller answered; anything
/// else, including failure to resolve or connect, means absent.
pub async fn probe_host(
    http: &reqwest::Client,
    resolver: &dyn HostResolver,
    target: &WellKnownHost,
    path: &str,
    probe_timeout: Duration,
) -> Option<DiscoveredCandidate> {
    let Some(ip) = resolver.resolve(&target.host).await else {
        debug!(host = %target.host, "Probe host does not resolve");
        return None;
    };

    let endpoint = format!("http://{}{}", SocketAddr::new(ip, target.port), path);

    match http.get(&endpoint).timeout(probe_timeout).send().await {
        Ok(response) => {
            let status = response.status();
            if status == StatusCode::OK || status == StatusCode::UNAUTHORIZED {
                debug!(host = %target.host, %ip, status = status.as_u16(), "Controller found by probe");
                Some(DiscoveredCandidate {
                    name: display_name(&target.host),
                    url: format!("http://{}:{}", target.host, target.port),
                    addresses: vec![ip],
                })
            } else {
                debug!(host = %target.host, status = status.as_u16(), "Probe answered by something else");
                None
            }
        }
        Err(e) => {
            debug!(host = %target.host, error = %e, "Probe failed");
            None
        }
    }
}

/// Human-readable name from a hostname: `home-assistant.local` -> `Home Assistant`.
pub fn display_name(host: &str) -> String {
    let label = host.split('.').next().unwrap_or(host);
    label
        .split('-')
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
