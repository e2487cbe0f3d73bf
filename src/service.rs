//! Async service interface over the ledger.
//!
//! The request layer talks to the ledger through [`LedgerService`].
//! [`SharedLedger`] serialises writers behind a `tokio` read-write lock and
//! runs proof-of-work on the blocking pool while it holds the write guard,
//! so an append is complete before any other operation observes the chain.
//! Mining stops when the caller's future is dropped or the configured
//! mining timeout elapses; the registry is left as it was.

use crate::core::{EntityId, Error, Result, Tier};
use crate::ledger::{
    AttendanceStatus, ChainValidation, EntityInfo, EntityRecord, EntityState, Fields,
    LedgerValidation, MutationOutcome, Registry, Visibility,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockReadGuard};

/// Operations the ledger exposes to its callers.
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Create a department, class or student.
    async fn create_entity(&self, info: EntityInfo) -> Result<EntityRecord>;

    /// Append an UPDATE.
    async fn update_entity(&self, id: &EntityId, fields: Fields) -> Result<MutationOutcome>;

    /// Append a DELETION tombstone.
    async fn delete_entity(&self, id: &EntityId) -> Result<MutationOutcome>;

    /// Append an ATTENDANCE mark to a student chain.
    async fn record_attendance(
        &self,
        student_id: &EntityId,
        status: AttendanceStatus,
        date: NaiveDate,
    ) -> Result<MutationOutcome>;

    /// Projected state of one entity.
    async fn query_entity(&self, id: &EntityId) -> Result<EntityState>;

    /// Projected state plus full chain.
    async fn entity_record(&self, id: &EntityId) -> Result<EntityRecord>;

    /// Children of a parent entity.
    async fn query_by_parent(&self, parent_id: &EntityId, visibility: Visibility)
        -> Vec<EntityState>;

    /// Every entity in a tier.
    async fn query_all(&self, tier: Tier, visibility: Visibility) -> Vec<EntityState>;

    /// Validate one chain and its ancestors.
    async fn validate_one(&self, id: &EntityId) -> Result<ChainValidation>;

    /// Validate all chains.
    async fn validate_all(&self) -> LedgerValidation;
}

/// Raises the cancel flag when dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Cloneable handle to a registry shared between tasks.
#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<RwLock<Registry>>,
    mining_timeout: Option<Duration>,
}

impl SharedLedger {
    /// Wrap a registry. The mining timeout is taken from its configuration.
    pub fn new(registry: Registry) -> Self {
        Self {
            mining_timeout: registry.config().mining_timeout(),
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Read access for reports not covered by [`LedgerService`].
    pub async fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner.read().await
    }

    /// Run a mutation on the blocking pool under the write lock.
    ///
    /// The worker holds the guard until it returns, so the lock is released
    /// only once mining has either sealed the block or seen the cancel flag.
    async fn mutate<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Registry, &AtomicBool) -> Result<T> + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let _armed = CancelOnDrop(Arc::clone(&cancel));

        let run = async {
            let mut guard = Arc::clone(&self.inner).write_owned().await;
            tokio::task::spawn_blocking(move || op(&mut *guard, &*cancel))
                .await
                .unwrap_or_else(|err| Err(err.into()))
        };

        match self.mining_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(timeout_ms = limit.as_millis() as u64, "mining timed out");
                    Err(Error::MiningCancelled)
                }
            },
            None => run.await,
        }
    }
}

#[async_trait]
impl LedgerService for SharedLedger {
    async fn create_entity(&self, info: EntityInfo) -> Result<EntityRecord> {
        self.mutate(move |reg, cancel| reg.create_entity_cancellable(info, cancel))
            .await
    }

    async fn update_entity(&self, id: &EntityId, fields: Fields) -> Result<MutationOutcome> {
        let id = id.clone();
        self.mutate(move |reg, cancel| reg.update_entity_cancellable(&id, fields, cancel))
            .await
    }

    async fn delete_entity(&self, id: &EntityId) -> Result<MutationOutcome> {
        let id = id.clone();
        self.mutate(move |reg, cancel| reg.delete_entity_cancellable(&id, cancel))
            .await
    }

    async fn record_attendance(
        &self,
        student_id: &EntityId,
        status: AttendanceStatus,
        date: NaiveDate,
    ) -> Result<MutationOutcome> {
        let student_id = student_id.clone();
        self.mutate(move |reg, cancel| {
            reg.record_attendance_cancellable(&student_id, status, date, cancel)
        })
        .await
    }

    async fn query_entity(&self, id: &EntityId) -> Result<EntityState> {
        self.inner.read().await.query_entity(id)
    }

    async fn entity_record(&self, id: &EntityId) -> Result<EntityRecord> {
        self.inner.read().await.entity_record(id)
    }

    async fn query_by_parent(
        &self,
        parent_id: &EntityId,
        visibility: Visibility,
    ) -> Vec<EntityState> {
        self.inner.read().await.query_by_parent(parent_id, visibility)
    }

    async fn query_all(&self, tier: Tier, visibility: Visibility) -> Vec<EntityState> {
        self.inner.read().await.query_all(tier, visibility)
    }

    async fn validate_one(&self, id: &EntityId) -> Result<ChainValidation> {
        self.inner.read().await.validate_one(id)
    }

    async fn validate_all(&self) -> LedgerValidation {
        self.inner.read().await.validate_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::core::Error;
    use crate::ledger::entity::FIELD_NAME;

    fn ledger() -> SharedLedger {
        SharedLedger::new(Registry::new(LedgerConfig::default().with_difficulty(2)).unwrap())
    }

    #[tokio::test]
    async fn test_create_and_query() {
        let ledger = ledger();
        let dept = ledger
            .create_entity(EntityInfo::department("Computing"))
            .await
            .unwrap();

        let state = ledger.query_entity(&dept.state.entity_id).await.unwrap();
        assert_eq!(state.name(), Some("Computing"));
        assert_eq!(ledger.query_all(Tier::Department, Visibility::ActiveOnly).await.len(), 1);
    }

    #[tokio::test]
    async fn test_attendance_on_deleted_student() {
        let ledger = ledger();
        let dept = ledger
            .create_entity(EntityInfo::department("D"))
            .await
            .unwrap()
            .state
            .entity_id;
        let class = ledger
            .create_entity(EntityInfo::class("C", &dept))
            .await
            .unwrap()
            .state
            .entity_id;
        let student = ledger
            .create_entity(EntityInfo::student("S", "R1", &class))
            .await
            .unwrap()
            .state
            .entity_id;
        ledger.delete_entity(&student).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let result = ledger
            .record_attendance(&student, AttendanceStatus::Present, date)
            .await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert_eq!(ledger.query_by_parent(&class, Visibility::ActiveOnly).await.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_stay_linked() {
        let ledger = ledger();
        let dept = ledger
            .create_entity(EntityInfo::department("Computing"))
            .await
            .unwrap()
            .state
            .entity_id;

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            let dept = dept.clone();
            handles.push(tokio::spawn(async move {
                let mut fields = Fields::new();
                fields.insert(FIELD_NAME.into(), format!("Computing {}", i).into());
                ledger.update_entity(&dept, fields).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let record = ledger.entity_record(&dept).await.unwrap();
        assert_eq!(record.chain.len(), 9);
        for (i, block) in record.chain.iter().enumerate() {
            assert_eq!(block.index, i as u64);
        }
        assert!(ledger.validate_one(&dept).await.unwrap().valid);
        assert!(ledger.validate_all().await.valid);
    }

    #[tokio::test]
    async fn test_mining_timeout_cancels_and_releases_lock() {
        let config = LedgerConfig::default()
            .with_difficulty(64)
            .with_mining_timeout(Some(Duration::from_millis(50)));
        let ledger = SharedLedger::new(Registry::new(config).unwrap());

        let result = ledger.create_entity(EntityInfo::department("D1")).await;
        assert!(matches!(result, Err(Error::MiningCancelled)));

        let registry = tokio::time::timeout(Duration::from_secs(10), ledger.registry())
            .await
            .expect("write lock released after cancellation");
        assert_eq!(registry.chain_count(Tier::Department), 0);
    }

    #[tokio::test]
    async fn test_dropped_mutation_cancels_append() {
        let config = LedgerConfig::default().with_mining_timeout(None);
        let mut registry = Registry::new(config.with_difficulty(1)).unwrap();
        let dept = registry
            .create_entity(EntityInfo::department("D1"))
            .unwrap()
            .state
            .entity_id;
        registry.chain_mut(&dept).unwrap().set_difficulty(64);
        let ledger = SharedLedger::new(registry);

        let mut fields = Fields::new();
        fields.insert(FIELD_NAME.into(), "never sealed".into());
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), ledger.update_entity(&dept, fields))
                .await;
        assert!(abandoned.is_err());

        let record = tokio::time::timeout(Duration::from_secs(10), ledger.entity_record(&dept))
            .await
            .expect("write lock released after cancellation")
            .unwrap();
        assert_eq!(record.chain.len(), 1);
        assert_eq!(record.state.name(), Some("D1"));
    }

    #[tokio::test]
    async fn test_registry_reports() {
        let ledger = ledger();
        ledger
            .create_entity(EntityInfo::department("Software Engineering"))
            .await
            .unwrap();

        let registry = ledger.registry().await;
        assert_eq!(registry.search(Tier::Department, "software").len(), 1);
    }
}
