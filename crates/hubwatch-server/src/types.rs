//! Controller records and status types shared by the monitor and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Controller ID
pub type ControllerId = String;

/// Connection state of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Last check reached the controller and it accepted the credential
    Online,
    /// Last check failed in an anticipated way (timeout, refused, non-200)
    Offline,
    /// Last check failed unexpectedly
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Online => "online",
            ConnectionStatus::Offline => "offline",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(ConnectionStatus::Online),
            "offline" => Ok(ConnectionStatus::Offline),
            "error" => Ok(ConnectionStatus::Error),
            other => Err(format!("unknown connection status '{}'", other)),
        }
    }
}

/// Opaque, possibly encrypted, credential as held by the store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialRef(pub String);

impl fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialRef(..)")
    }
}

/// A registered controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerRecord {
    pub id: ControllerId,
    pub url: String,
    pub credential: CredentialRef,
    pub connection_status: ConnectionStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub version: Option<String>,
    pub discovered_via: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ControllerRecord {
    /// A freshly registered controller, not yet checked.
    pub fn new(
        id: impl Into<ControllerId>,
        url: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            credential: CredentialRef(credential.into()),
            connection_status: ConnectionStatus::Offline,
            last_seen: None,
            last_error: None,
            version: None,
            discovered_via: None,
            updated_at: Utc::now(),
        }
    }

    /// The subset the monitor needs for one check.
    pub fn summary(&self) -> ControllerSummary {
        ControllerSummary {
            id: self.id.clone(),
            url: self.url.clone(),
            credential: self.credential.clone(),
            status: self.connection_status,
        }
    }
}

/// What the monitor reads per controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSummary {
    pub id: ControllerId,
    pub url: String,
    pub credential: CredentialRef,
    pub status: ConnectionStatus,
}

/// Result of one check, as written back to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: ConnectionStatus,

    /// Cleared on success
    pub last_error: Option<String>,

    /// `None` keeps the stored version
    pub version: Option<String>,

    /// `None` keeps the stored timestamp
    pub last_seen: Option<DateTime<Utc>>,

    pub checked_at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn online(version: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: ConnectionStatus::Online,
            last_error: None,
            version,
            last_seen: Some(now),
            checked_at: now,
        }
    }

    pub fn offline(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: ConnectionStatus::Offline,
            last_error: Some(error.into()),
            version: None,
            last_seen: None,
            checked_at: now,
        }
    }

    pub fn error(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: ConnectionStatus::Error,
            last_error: Some(error.into()),
            version: None,
            last_seen: None,
            checked_at: now,
        }
    }
}

/// A status transition, published as `id:old:new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub controller_id: ControllerId,
    pub old: ConnectionStatus,
    pub new: ConnectionStatus,
}

impl StatusChange {
    pub fn to_message(&self) -> String {
        format!("{}:{}:{}", self.controller_id, self.old, self.new)
    }

    /// Parse a published message. Ids may themselves contain `:`.
    pub fn parse(message: &str) -> Option<Self> {
        let mut parts = message.rsplitn(3, ':');
        let new = parts.next()?.parse().ok()?;
        let old = parts.next()?.parse().ok()?;
        let controller_id = parts.next()?;
        if controller_id.is_empty() {
            return None;
        }

        Some(Self {
            controller_id: controller_id.to_string(),
            old,
            new,
        })
    }
}

/// Outcome of checking one controller.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub controller_id: ControllerId,
    pub previous: ConnectionStatus,
    pub status: ConnectionStatus,
    pub last_error: Option<String>,
    /// Whether the store accepted the update
    pub persisted: bool,
    /// Whether a status change event was published
    pub published: bool,
}

/// Tally of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub online: usize,
    pub offline: usize,
    pub error: usize,
    pub transitions: usize,
}

impl SweepReport {
    /// Count an outcome; an unpersisted check counts as an error.
    pub fn record(&mut self, outcome: &CheckOutcome) {
        self.checked += 1;

        let status = if outcome.persisted {
            outcome.status
        } else {
            ConnectionStatus::Error
        };
        match status {
            ConnectionStatus::Online => self.online += 1,
            ConnectionStatus::Offline => self.offline += 1,
            ConnectionStatus::Error => self.error += 1,
        }

        if outcome.published {
            self.transitions += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            ConnectionStatus::Online,
            ConnectionStatus::Offline,
            ConnectionStatus::Error,
        ] {
            assert_eq!(status.to_string().parse::<ConnectionStatus>(), Ok(status));
        }
        assert!("degraded".parse::<ConnectionStatus>().is_err());
    }

    #[test]
    fn test_status_change_message() {
        let change = StatusChange {
            controller_id: "ctrl-1".into(),
            old: ConnectionStatus::Offline,
            new: ConnectionStatus::Online,
        };
        assert_eq!(change.to_message(), "ctrl-1:offline:online");
        assert_eq!(StatusChange::parse("ctrl-1:offline:online"), Some(change));
    }

    #[test]
    fn test_status_change_parse_id_with_colon() {
        let change = StatusChange::parse("urn:hub:7:online:error").unwrap();
        assert_eq!(change.controller_id, "urn:hub:7");
        assert_eq!(change.new, ConnectionStatus::Error);

        assert!(StatusChange::parse("online:error").is_none());
        assert!(StatusChange::parse("x:up:down").is_none());
    }

    #[test]
    fn test_updates_keep_error_invariant() {
        let now = Utc::now();
        assert!(StatusUpdate::online(None, now).last_error.is_none());
        assert!(StatusUpdate::offline("Connection timeout", now).last_error.is_some());
        assert!(StatusUpdate::error("bad credential", now).last_error.is_some());
        assert!(StatusUpdate::offline("Connection timeout", now).last_seen.is_none());
    }

    #[test]
    fn test_sweep_report_counts() {
        let mut report = SweepReport::default();
        let outcome = |status, persisted, published| CheckOutcome {
            controller_id: "a".into(),
            previous: ConnectionStatus::Offline,
            status,
            last_error: None,
            persisted,
            published,
        };

        report.record(&outcome(ConnectionStatus::Online, true, true));
        report.record(&outcome(ConnectionStatus::Offline, true, false));
        report.record(&outcome(ConnectionStatus::Online, false, false));

        assert_eq!(
            report,
            SweepReport {
                checked: 3,
                online: 1,
                offline: 1,
                error: 1,
                transitions: 1,
            }
        );
    }
}
