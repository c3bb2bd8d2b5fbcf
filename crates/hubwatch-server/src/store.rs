//! Controller record storage.
//!
//! The monitor only needs three things from storage: list what to check,
//! write back the result, and decrypt a credential at check time.

use crate::types::{ControllerId, ControllerRecord, ControllerSummary, CredentialRef, StatusUpdate};
use async_trait::async_trait;
use common::{Error, Result};
use dashmap::DashMap;
use tracing::debug;

/// Storage seam consumed by the health monitor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControllerStore: Send + Sync {
    /// All registered controllers.
    async fn list_controllers(&self) -> Result<Vec<ControllerSummary>>;

    /// Persist the result of a check. Last writer wins.
    async fn update_status(&self, id: &str, update: StatusUpdate) -> Result<()>;

    /// Turn a stored credential into the bearer token.
    async fn decrypt_credential(&self, credential: &CredentialRef) -> Result<String>;
}

/// In-process store backed by a concurrent map.
///
/// Credentials are held as given; an empty credential cannot be decrypted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<ControllerId, ControllerRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `records`.
    pub fn with_records(records: impl IntoIterator<Item = ControllerRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Add or replace a record.
    pub fn insert(&self, record: ControllerRecord) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<ControllerRecord> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ControllerStore for MemoryStore {
    async fn list_controllers(&self) -> Result<Vec<ControllerSummary>> {
        let mut summaries: Vec<_> = self
            .records
            .iter()
            .map(|entry| entry.value().summary())
            .collect();
        // Stable sweep order
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    async fn update_status(&self, id: &str, update: StatusUpdate) -> Result<()> {
        let mut record = self
            .records
            .get_mut(id)
            .ok_or_else(|| Error::store(format!("unknown controller {}", id)))?;

        record.connection_status = update.status;
        record.last_error = update.last_error;
        if let Some(version) = update.version {
            record.version = Some(version);
        }
        if let Some(last_seen) = update.last_seen {
            record.last_seen = Some(last_seen);
        }
        record.updated_at = update.checked_at;

        debug!(id, status = %record.connection_status, "Stored controller status");
        Ok(())
    }

    async fn decrypt_credential(&self, credential: &CredentialRef) -> Result<String> {
        if credential.0.trim().is_empty() {
            return Err(Error::credential("no credential stored"));
        }
        Ok(credential.0.clone())
    }
}
