use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::record::OtpRecord;

/// Storage for outstanding codes, keyed by identifier.
///
/// Implementations are plain key-value CRUD; all sequencing and attempt
/// accounting lives in `OtpManager`, which serializes calls per
/// identifier. A networked cache can back this without changing any
/// verification logic.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn get(&self, identifier: &str) -> anyhow::Result<Option<OtpRecord>>;

    /// Inserts or replaces the record for its identifier.
    async fn put(&self, record: OtpRecord) -> anyhow::Result<()>;

    /// Removes and returns the record, if one was present.
    async fn remove(&self, identifier: &str) -> anyhow::Result<Option<OtpRecord>>;

    /// Drops every record expired as of `now`; returns how many went.
    async fn purge_expired(&self, now: OffsetDateTime) -> anyhow::Result<usize>;
}

/// Process-local store used by tests and single-node deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOtpStore {
    records: Arc<RwLock<HashMap<String, OtpRecord>>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn get(&self, identifier: &str) -> anyhow::Result<Option<OtpRecord>> {
        Ok(self.records.read().await.get(identifier).cloned())
    }

    async fn put(&self, record: OtpRecord) -> anyhow::Result<()> {
        self.records
            .write()
            .await
            .insert(record.identifier.clone(), record);
        Ok(())
    }

    async fn remove(&self, identifier: &str) -> anyhow::Result<Option<OtpRecord>> {
        Ok(self.records.write().await.remove(identifier))
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> anyhow::Result<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok(before - records.len())
    }
}
