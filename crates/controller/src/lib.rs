//! Client for home-automation controllers reachable over HTTP.
//!
//! A controller is addressed by a base URL and a bearer credential. The
//! client offers three remote operations:
//! - connection test against `GET /api/`
//! - configuration (software version) from `GET /api/config`
//! - entity states from `GET /api/states`
//!
//! Hostnames are resolved through the platform resolver before connecting,
//! and requests go to the literal address. When resolution fails the
//! configured URL is used as-is.
//!
//! # Example
//!
//! ```no_run
//! use controller::ControllerClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ControllerClient::new("http://homeassistant.local:8123", "long-lived-token")?;
//!
//! match client.test_connection().await {
//!     Ok(()) => {
//!         let version = client.get_config().await.and_then(|c| c.version);
//!         println!("online, version {:?}", version);
//!     }
//!     Err(e) => println!("offline: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod resolve;
pub mod types;

pub use client::{ClientOptions, ControllerClient, into_pair, verify_controller};
pub use error::{ConnectionError, Error};
pub use resolve::{HostResolver, StaticResolver, SystemResolver};
pub use types::{ApiStatus, ControllerConfig, EntityState};
