use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::info;

use super::{validate_patch, validate_record, StorageAdapter, StorageError};
use crate::model::{Site, SiteId, SitePatch, SiteRecord};

/// Sites held for the lifetime of the owning process. Single writer, many readers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    initialized: bool,
    sites: Vec<Site>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves the Vec structurally intact.
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageAdapter for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        let mut state = self.write();
        if !state.initialized {
            state.sites.clear();
            state.initialized = true;
            info!("In-memory store initialized");
        }
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Site>, StorageError> {
        Ok(self.read().sites.clone())
    }

    async fn get_by_id(&self, id: SiteId) -> Result<Option<Site>, StorageError> {
        Ok(self.read().sites.iter().find(|s| s.id == id).cloned())
    }

    async fn add(&self, record: SiteRecord) -> Result<SiteId, StorageError> {
        validate_record(&record)?;
        let mut state = self.write();
        let id = state.sites.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        state.sites.push(Site::new(id, record));
        Ok(id)
    }

    async fn update(&self, id: SiteId, patch: &SitePatch) -> Result<bool, StorageError> {
        validate_patch(patch)?;
        let mut state = self.write();
        match state.sites.iter_mut().find(|s| s.id == id) {
            Some(site) => {
                patch.apply(&mut site.record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: SiteId) -> Result<bool, StorageError> {
        let mut state = self.write();
        match state.sites.iter().position(|s| s.id == id) {
            Some(i) => {
                state.sites.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn import_sites(&self, records: &[SiteRecord]) -> Result<usize, StorageError> {
        for r in records {
            validate_record(r)?;
        }
        let sites: Vec<Site> = records
            .iter()
            .zip(1..)
            .map(|(r, id)| Site::new(id, r.clone()))
            .collect();

        self.write().sites = sites;
        info!("Imported {} sites into in-memory store", records.len());
        Ok(records.len())
    }
}
