use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::{validate_patch, validate_record, StorageAdapter, StorageError};
use crate::model::{Site, SiteId, SitePatch, SiteRecord};

#[derive(Debug, Error)]
pub enum KvError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Minimal string key-value surface the remote store needs.
#[async_trait]
pub trait KvClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;
    /// `true` if a key was removed.
    async fn del(&self, key: &str) -> Result<bool, KvError>;
}

/// Sites in a remote key-value store.
///
/// Layout: each site as JSON under `{prefix}:{id}`, plus the ordered list of
/// live ids as a JSON array under `{prefix}_ids`. There is no cross-key
/// transaction; the index is always written last so it only ever names ids
/// whose values have been stored, and a value whose id is not in the index is
/// treated as absent.
pub struct KvStore<C> {
    client: C,
    prefix: String,
}

impl<C: KvClient> KvStore<C> {
    pub fn new(client: C, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
        }
    }

    pub fn site_key(&self, id: SiteId) -> String {
        format!("{}:{}", self.prefix, id)
    }

    pub fn index_key(&self) -> String {
        format!("{}_ids", self.prefix)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        op: &'static str,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        let raw = self.client.get(key).await.map_err(|source| StorageError::Kv {
            op,
            key: key.to_string(),
            source,
        })?;
        raw.map(|s| {
            serde_json::from_str(&s).map_err(|source| StorageError::Codec {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
    }

    async fn set_json<T: Serialize + ?Sized>(
        &self,
        op: &'static str,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let body = serde_json::to_string(value).map_err(|source| StorageError::Codec {
            key: key.to_string(),
            source,
        })?;
        self.client
            .set(key, &body)
            .await
            .map_err(|source| StorageError::Kv {
                op,
                key: key.to_string(),
                source,
            })
    }

    async fn del_key(&self, op: &'static str, key: &str) -> Result<bool, StorageError> {
        self.client.del(key).await.map_err(|source| StorageError::Kv {
            op,
            key: key.to_string(),
            source,
        })
    }

    async fn load_index(&self, op: &'static str) -> Result<Vec<SiteId>, StorageError> {
        Ok(self
            .get_json::<Vec<SiteId>>(op, &self.index_key())
            .await?
            .unwrap_or_default())
    }

    async fn load_site(&self, op: &'static str, id: SiteId) -> Result<Option<Site>, StorageError> {
        self.get_json(op, &self.site_key(id)).await
    }

    /// Like `load_site`, but only for ids the index lists.
    async fn load_indexed_site(
        &self,
        op: &'static str,
        id: SiteId,
    ) -> Result<Option<Site>, StorageError> {
        if !self.load_index(op).await?.contains(&id) {
            return Ok(None);
        }
        self.load_site(op, id).await
    }
}

#[async_trait]
impl<C: KvClient> StorageAdapter for KvStore<C> {
    fn backend(&self) -> &'static str {
        "kv"
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        // One round trip so bad credentials or an unreachable host fail here.
        let ids = self.load_index("initialize").await?;
        info!("KV store ready (prefix {}, {} sites indexed)", self.prefix, ids.len());
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Site>, StorageError> {
        let ids = self.load_index("get_all").await?;
        let mut sites = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load_site("get_all", id).await? {
                Some(site) => sites.push(site),
                None => warn!("Index lists site {} but {} is missing", id, self.site_key(id)),
            }
        }
        Ok(sites)
    }

    async fn get_by_id(&self, id: SiteId) -> Result<Option<Site>, StorageError> {
        self.load_indexed_site("get_by_id", id).await
    }

    async fn add(&self, record: SiteRecord) -> Result<SiteId, StorageError> {
        validate_record(&record)?;
        let mut ids = self.load_index("add").await?;
        let id = ids.iter().copied().max().unwrap_or(0) + 1;

        let site = Site::new(id, record);
        self.set_json("add", &self.site_key(id), &site).await?;
        ids.push(id);
        self.set_json("add", &self.index_key(), &ids).await?;
        Ok(id)
    }

    async fn update(&self, id: SiteId, patch: &SitePatch) -> Result<bool, StorageError> {
        validate_patch(patch)?;
        let Some(mut site) = self.load_indexed_site("update", id).await? else {
            return Ok(false);
        };
        patch.apply(&mut site.record);
        self.set_json("update", &self.site_key(id), &site).await?;
        Ok(true)
    }

    async fn delete(&self, id: SiteId) -> Result<bool, StorageError> {
        let key = self.site_key(id);
        let mut ids = self.load_index("delete").await?;
        let Some(pos) = ids.iter().position(|&x| x == id) else {
            // Sweep a value left behind by an interrupted write.
            self.del_key("delete", &key).await?;
            return Ok(false);
        };

        // Index first: a failure after this leaves an orphan value, never a dangling id.
        ids.remove(pos);
        self.set_json("delete", &self.index_key(), &ids).await?;
        self.del_key("delete", &key).await?;
        Ok(true)
    }

    async fn import_sites(&self, records: &[SiteRecord]) -> Result<usize, StorageError> {
        for r in records {
            validate_record(r)?;
        }
        let old_ids = self.load_index("import_sites").await?;

        // Drop the index before touching values: until the new index lands,
        // readers see an empty store rather than a mix of old and new sites.
        self.del_key("import_sites", &self.index_key()).await?;
        for id in &old_ids {
            self.del_key("import_sites", &self.site_key(*id)).await?;
        }

        let mut new_ids = Vec::with_capacity(records.len());
        for (record, id) in records.iter().zip(1..) {
            self.set_json("import_sites", &self.site_key(id), &Site::new(id, record.clone()))
                .await?;
            new_ids.push(id);
        }
        self.set_json("import_sites", &self.index_key(), &new_ids).await?;

        info!("Imported {} sites into KV store", records.len());
        Ok(records.len())
    }
}

// ── Test client ──

#[cfg(test)]
pub(crate) mod memory_kv {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-process [`KvClient`] that can be told to fail the nth `set`.
    #[derive(Default)]
    pub struct MemoryKv {
        pub data: Mutex<HashMap<String, String>>,
        fail_set_at: Mutex<Option<usize>>,
        sets: Mutex<usize>,
    }

    impl MemoryKv {
        pub fn fail_on_set(&self, nth: usize) {
            *self.sets.lock().unwrap() = 0;
            *self.fail_set_at.lock().unwrap() = Some(nth);
        }

        pub fn raw(&self, key: &str) -> Option<String> {
            self.data.lock().unwrap().get(key).cloned()
        }
    }

    #[async_trait]
    impl KvClient for MemoryKv {
        async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
            Ok(self.raw(key))
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
            let mut sets = self.sets.lock().unwrap();
            *sets += 1;
            if *self.fail_set_at.lock().unwrap() == Some(*sets) {
                return Err(KvError::Remote("injected failure".into()));
            }
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn del(&self, key: &str) -> Result<bool, KvError> {
            Ok(self.data.lock().unwrap().remove(key).is_some())
        }
    }

    #[async_trait]
    impl<T: KvClient> KvClient for std::sync::Arc<T> {
        async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
            (**self).get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
            (**self).set(key, value).await
        }

        async fn del(&self, key: &str) -> Result<bool, KvError> {
            (**self).del(key).await
        }
    }
}
