//! Site persistence.
//!
//! Every backend implements [`StorageAdapter`] with the same observable
//! behaviour; [`open_store`] picks one from [`Settings`].
//!
//! - [`MemoryStore`]: process-lifetime `Vec` behind a lock.
//! - [`SqliteStore`]: embedded SQLite file, one connection per operation.
//! - [`KvStore`]: one JSON value per site plus an id index, over any [`KvClient`].

pub mod kv;
pub mod memory;
pub mod rest;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, DeploymentMode, Settings};
use crate::model::{Site, SiteId, SitePatch, SiteRecord};

pub use kv::{KvClient, KvError, KvStore};
pub use memory::MemoryStore;
pub use rest::RestKvClient;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid site record: {0}")]
    InvalidRecord(String),

    #[error("sqlite {op} failed{}: {source}", fmt_id(.id))]
    Sqlite {
        op: &'static str,
        id: Option<SiteId>,
        #[source]
        source: rusqlite::Error,
    },

    #[error("sqlite {op} task did not complete: {source}")]
    Blocking {
        op: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("kv {op} failed for key {key}: {source}")]
    Kv {
        op: &'static str,
        key: String,
        #[source]
        source: KvError,
    },

    #[error("kv value under {key} is not valid JSON: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

fn fmt_id(id: &Option<SiteId>) -> String {
    id.map(|id| format!(" for site {}", id)).unwrap_or_default()
}

/// Uniform CRUD plus bulk import over a site collection.
///
/// `Ok(None)` / `Ok(false)` mean "no such id"; any failure of the backend
/// itself is an `Err`.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Idempotent setup: safe to call any number of times.
    async fn initialize(&self) -> Result<(), StorageError>;

    async fn get_all(&self) -> Result<Vec<Site>, StorageError>;

    async fn get_by_id(&self, id: SiteId) -> Result<Option<Site>, StorageError>;

    /// Store a new site under a freshly allocated id.
    async fn add(&self, record: SiteRecord) -> Result<SiteId, StorageError>;

    /// Merge the supplied fields. `false` if the id does not exist.
    async fn update(&self, id: SiteId, patch: &SitePatch) -> Result<bool, StorageError>;

    /// `false` if the id does not exist.
    async fn delete(&self, id: SiteId) -> Result<bool, StorageError>;

    /// Replace everything with `records`, numbered `1..=n` in input order.
    async fn import_sites(&self, records: &[SiteRecord]) -> Result<usize, StorageError>;
}

/// Build the backend selected by `settings.mode`. Fails fast on missing
/// hosted-kv credentials.
pub fn open_store(settings: &Settings) -> Result<Box<dyn StorageAdapter>, StorageError> {
    let store: Box<dyn StorageAdapter> = match settings.mode {
        DeploymentMode::Ephemeral => Box::new(MemoryStore::new()),
        DeploymentMode::Local => Box::new(SqliteStore::new(&settings.db_path)),
        DeploymentMode::HostedKv => {
            let (url, token) = settings.kv.credentials()?;
            let client = RestKvClient::new(url, token).map_err(|source| StorageError::Kv {
                op: "connect",
                key: url.to_string(),
                source,
            })?;
            Box::new(KvStore::new(client, &settings.kv.prefix))
        }
    };
    info!("Using {} storage backend", store.backend());
    Ok(store)
}

pub(crate) fn validate_record(record: &SiteRecord) -> Result<(), StorageError> {
    record.validate().map_err(StorageError::InvalidRecord)
}

pub(crate) fn validate_patch(patch: &SitePatch) -> Result<(), StorageError> {
    patch.validate().map_err(StorageError::InvalidRecord)
}

// ── Tests ──

/// Behaviour every backend must share. Each backend module runs this suite
/// against its own store.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use crate::model::sample;

    fn three() -> Vec<SiteRecord> {
        vec![
            sample("SF-88", "Fort Barry", "California"),
            sample("NY-49", "Brookhaven", "New York"),
            sample("C-41", "Jackson Park", "Illinois"),
        ]
    }

    pub async fn run_all(store: &dyn StorageAdapter) {
        initialize_is_idempotent(store).await;
        import_assigns_sequential_ids(store).await;
        import_replaces_previous_data(store).await;
        update_touches_only_patch(store).await;
        update_missing_and_invalid(store).await;
        delete_then_get(store).await;
        add_allocates_fresh_ids(store).await;
        add_rejects_bad_coordinates(store).await;
    }

    async fn initialize_is_idempotent(store: &dyn StorageAdapter) {
        store.initialize().await.unwrap();
        store.import_sites(&three()).await.unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.get_all().await.unwrap().len(), 3);
    }

    async fn import_assigns_sequential_ids(store: &dyn StorageAdapter) {
        let records = three();
        assert_eq!(store.import_sites(&records).await.unwrap(), 3);

        let all = store.get_all().await.unwrap();
        let ids: Vec<SiteId> = all.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        for (site, record) in all.iter().zip(&records) {
            assert_eq!(&site.record, record);
        }

        let second = store.get_by_id(2).await.unwrap().unwrap();
        assert_eq!(second.id, 2);
        assert_eq!(second.record, records[1]);
        assert!(store.get_by_id(4).await.unwrap().is_none());
    }

    async fn import_replaces_previous_data(store: &dyn StorageAdapter) {
        store.import_sites(&three()).await.unwrap();
        store.add(sample("X-1", "Extra", "Texas")).await.unwrap();

        let fresh = vec![sample("W-25", "Davidsonville", "Maryland")];
        assert_eq!(store.import_sites(&fresh).await.unwrap(), 1);
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, 1);
        assert_eq!(all[0].record.site_code, "W-25");

        assert_eq!(store.import_sites(&[]).await.unwrap(), 0);
        assert!(store.get_all().await.unwrap().is_empty());
    }

    async fn update_touches_only_patch(store: &dyn StorageAdapter) {
        store.import_sites(&three()).await.unwrap();
        let before = store.get_by_id(2).await.unwrap().unwrap();

        let patch = SitePatch {
            status: Some("X".to_string()),
            ..Default::default()
        };
        assert!(store.update(2, &patch).await.unwrap());

        let after = store.get_by_id(2).await.unwrap().unwrap();
        assert_eq!(after.record.status, "X");
        let mut expected = before.clone();
        expected.record.status = "X".to_string();
        assert_eq!(after, expected);

        // Neighbours untouched.
        let first = store.get_by_id(1).await.unwrap().unwrap();
        assert_eq!(first.record, three()[0]);
    }

    async fn update_missing_and_invalid(store: &dyn StorageAdapter) {
        store.import_sites(&three()).await.unwrap();
        let patch = SitePatch {
            name: Some("Nowhere".to_string()),
            ..Default::default()
        };
        assert!(!store.update(99, &patch).await.unwrap());
        assert!(store.update(1, &SitePatch::default()).await.unwrap());
        assert!(!store.update(99, &SitePatch::default()).await.unwrap());

        let bad = SitePatch {
            latitude: Some(123.0),
            ..Default::default()
        };
        assert!(matches!(
            store.update(1, &bad).await,
            Err(StorageError::InvalidRecord(_))
        ));
        assert_eq!(store.get_by_id(1).await.unwrap().unwrap().record, three()[0]);
    }

    async fn delete_then_get(store: &dyn StorageAdapter) {
        store.import_sites(&three()).await.unwrap();
        assert!(store.delete(2).await.unwrap());
        assert!(store.get_by_id(2).await.unwrap().is_none());
        assert!(!store.delete(2).await.unwrap());
        assert!(!store.delete(42).await.unwrap());

        let ids: Vec<SiteId> = store.get_all().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    async fn add_allocates_fresh_ids(store: &dyn StorageAdapter) {
        store.import_sites(&three()).await.unwrap();
        let id = store.add(sample("KC-10", "Fort Leavenworth", "Kansas")).await.unwrap();
        assert!(id > 3);
        let next = store.add(sample("KC-30", "Pleasant Hill", "Missouri")).await.unwrap();
        assert!(next > id);

        let stored = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.record.site_code, "KC-10");
        let ids: Vec<SiteId> = store.get_all().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3, id, next]);

        store.import_sites(&[]).await.unwrap();
        assert_eq!(store.add(sample("A", "B", "Ohio")).await.unwrap(), 1);
    }

    async fn add_rejects_bad_coordinates(store: &dyn StorageAdapter) {
        store.import_sites(&[]).await.unwrap();
        let mut bad = sample("A", "B", "Ohio");
        bad.longitude = -200.0;
        assert!(matches!(
            store.add(bad).await,
            Err(StorageError::InvalidRecord(_))
        ));
        assert!(store.get_all().await.unwrap().is_empty());
    }
}
