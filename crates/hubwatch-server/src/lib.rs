//! Hubwatch server
//!
//! Keeps a fleet of home-automation controllers under watch: a background
//! health monitor checks every registered controller on a fixed interval,
//! writes the result back to the store and announces status transitions
//! on the `controller_status_changes` channel.
//!
//! # Components
//!
//! - **HealthMonitor**: periodic sweep, per-controller state machine
//!   (`online`, `offline`, `error`)
//! - **ControllerStore**: where records live; [`MemoryStore`] is seeded
//!   from configuration
//! - **EventBus**: where transitions go; [`BroadcastBus`] fans out
//!   in-process
//! - **ApiServer**: `/metrics`, `/healthz` and on-demand `/discover`

pub mod config;
pub mod events;
pub mod http_server;
pub mod metrics;
pub mod monitor;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod types;

pub use config::{Config, ConfigError};
pub use events::{BroadcastBus, BusMessage, EventBus, STATUS_CHANNEL};
pub use http_server::{ApiServer, ApiState};
pub use metrics::MetricsRegistry;
pub use monitor::{HealthMonitor, MonitorOptions};
pub use server::{AppContext, HubwatchServer};
pub use store::{ControllerStore, MemoryStore};
pub use telemetry::{TelemetryGuard, init_telemetry, setup_tracing};
pub use types::{
    CheckOutcome, ConnectionStatus, ControllerRecord, ControllerSummary, CredentialRef,
    StatusChange, StatusUpdate, SweepReport,
};
