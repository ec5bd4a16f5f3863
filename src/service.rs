use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{info, warn};

use crate::fetch::{self, FetchConfig, FetchError};
use crate::model::Site;
use crate::parser::HarvestReport;
use crate::store::{StorageAdapter, StorageError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Listing filter. `state` matches case-insensitively anywhere in the
/// jurisdiction name; `site_type` must match exactly.
#[derive(Debug, Clone, Default)]
pub struct SiteFilter {
    pub state: Option<String>,
    pub site_type: Option<String>,
}

impl SiteFilter {
    pub fn matches(&self, site: &Site) -> bool {
        let state_ok = self.state.as_deref().map_or(true, |needle| {
            site.record
                .state
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });
        let type_ok = self
            .site_type
            .as_deref()
            .map_or(true, |t| site.record.site_type == t);
        state_ok && type_ok
    }

    pub fn apply(&self, sites: Vec<Site>) -> Vec<Site> {
        sites.into_iter().filter(|s| self.matches(s)).collect()
    }
}

/// Site counts per jurisdiction, alphabetical.
pub fn count_by_state(sites: &[Site]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for site in sites {
        *counts.entry(site.record.state.clone()).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The store already had data; nothing was fetched.
    AlreadyLoaded { existing: usize },
    Imported { count: usize, report: HarvestReport },
    /// The page was fetched but yielded no sites; the store was left empty.
    NothingHarvested { report: HarvestReport },
}

/// Startup bootstrap: initialize the store and populate it from the source
/// page only if it is empty.
pub async fn ensure_loaded(
    store: &dyn StorageAdapter,
    config: &FetchConfig,
) -> Result<LoadOutcome, LoadError> {
    store.initialize().await?;

    let existing = store.get_all().await?.len();
    if existing > 0 {
        info!("{} store already holds {} sites, skipping import", store.backend(), existing);
        return Ok(LoadOutcome::AlreadyLoaded { existing });
    }

    let harvest = fetch::fetch_and_harvest(config).await?;
    if harvest.sites.is_empty() {
        warn!(
            "No sites extracted from {} ({} tables, {} rows seen)",
            config.url, harvest.report.tables_seen, harvest.report.rows_seen
        );
        return Ok(LoadOutcome::NothingHarvested {
            report: harvest.report,
        });
    }

    let count = store.import_sites(&harvest.sites).await?;
    Ok(LoadOutcome::Imported {
        count,
        report: harvest.report,
    })
}

/// Delete every site one at a time. Returns how many were removed.
pub async fn clear_all(store: &dyn StorageAdapter) -> Result<usize, StorageError> {
    let mut removed = 0;
    for site in store.get_all().await? {
        if store.delete(site.id).await? {
            removed += 1;
        }
    }
    info!("Cleared {} sites from {} store", removed, store.backend());
    Ok(removed)
}
