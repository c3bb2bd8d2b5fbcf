//! Discovery types.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Service type controllers announce themselves under.
pub const SERVICE_TYPE: &str = "_home-assistant._tcp.local.";

/// Path probed on well-known hosts. Unauthenticated requests get a 401.
pub const PROBE_PATH: &str = "/api/";

/// Longest accepted listen window for one discovery call.
pub const MAX_LISTEN_WINDOW: Duration = Duration::from_secs(60);

/// Discovery errors
///
/// Per-host failures never show up here; an unreachable host is simply
/// missing from the result.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid discovery timeout {0:?}: must be between 1ms and 60s")]
    InvalidTimeout(Duration),

    #[error("mDNS error: {0}")]
    Mdns(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A controller found on the network but not yet registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredCandidate {
    pub name: String,
    pub url: String,
    pub addresses: Vec<IpAddr>,
}

/// A resolved service announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Full instance name, e.g. `Home._home-assistant._tcp.local.`
    pub fullname: String,
    pub port: u16,
    pub addresses: Vec<IpAddr>,
}

/// Hostname probed when nothing is announced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellKnownHost {
    pub host: String,
    pub port: u16,
}

impl WellKnownHost {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Default probe table.
pub fn default_hosts() -> Vec<WellKnownHost> {
    vec![
        WellKnownHost::new("homeassistant.local", 8123),
        WellKnownHost::new("homeassistant", 8123),
        WellKnownHost::new("home-assistant.local", 8123),
        WellKnownHost::new("hass.local", 8123),
    ]
}

/// Discovery settings
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOptions {
    /// Service type to listen for
    pub service_type: String,

    /// Timeout for each active probe
    pub probe_timeout: Duration,

    /// Path requested on probed hosts
    pub probe_path: String,

    /// Hosts probed when the passive phase finds nothing
    pub hosts: Vec<WellKnownHost>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            service_type: SERVICE_TYPE.to_string(),
            probe_timeout: Duration::from_secs(3),
            probe_path: PROBE_PATH.to_string(),
            hosts: default_hosts(),
        }
    }
}

/// `http://<ip>:<port>`, with IPv6 addresses bracketed.
pub fn candidate_url(ip: IpAddr, port: u16) -> String {
    format!("http://{}", SocketAddr::new(ip, port))
}
