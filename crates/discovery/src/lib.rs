//! Local network discovery of home-automation controllers.
//!
//! Discovery runs in two phases:
//! - a passive listen for `_home-assistant._tcp.local.` announcements for
//!   a bounded window
//! - only if that finds nothing, a concurrent probe of well-known hostnames,
//!   where a 200 or 401 from `/api/` counts as a controller
//!
//! Results are deduplicated by URL. Unreachable or unresolvable hosts are
//! simply absent; the call itself only fails on an invalid timeout.
//!
//! # Example
//!
//! ```no_run
//! use discovery::{DiscoveryOptions, DiscoveryService};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = DiscoveryService::new(DiscoveryOptions::default())?;
//! for candidate in service.discover(Duration::from_secs(5)).await? {
//!     println!("{} at {}", candidate.name, candidate.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod mdns;
pub mod probe;
pub mod service;
pub mod types;

pub use mdns::{AnnouncementSource, MdnsBrowser};
pub use service::{DiscoveryService, dedupe_by_url};
pub use types::{
    Announcement, DiscoveredCandidate, DiscoveryError, DiscoveryOptions, PROBE_PATH,
    SERVICE_TYPE, WellKnownHost, default_hosts,
};
