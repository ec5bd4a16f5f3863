use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{validate_patch, validate_record, StorageAdapter, StorageError};
use crate::model::{Site, SiteId, SitePatch, SiteRecord};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS nike_sites (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        site_code   TEXT NOT NULL,
        name        TEXT NOT NULL,
        state       TEXT NOT NULL,
        latitude    REAL NOT NULL,
        longitude   REAL NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        site_type   TEXT NOT NULL DEFAULT 'Unknown',
        status      TEXT NOT NULL DEFAULT 'Unknown',
        wiki_url    TEXT NOT NULL DEFAULT '',
        created_at  TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_nike_sites_state ON nike_sites(state);
";

const COLUMNS: &str =
    "id, site_code, name, state, latitude, longitude, description, site_type, status, wiki_url";

/// Sites in an SQLite file. Each operation opens its own connection on the
/// blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against a fresh connection without blocking the async runtime.
    async fn with_conn<T, F>(&self, op: &'static str, id: Option<SiteId>, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = connect(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|source| StorageError::Blocking { op, source })?
        .map_err(|source| StorageError::Sqlite { op, id, source })
    }
}

fn connect(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

fn row_to_site(row: &Row) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get(0)?,
        record: SiteRecord {
            site_code: row.get(1)?,
            name: row.get(2)?,
            state: row.get(3)?,
            latitude: row.get(4)?,
            longitude: row.get(5)?,
            description: row.get(6)?,
            site_type: row.get(7)?,
            status: row.get(8)?,
            wiki_url: row.get(9)?,
        },
    })
}

/// `(column, value)` pairs for the fields a patch supplies.
fn patch_assignments(patch: &SitePatch) -> Vec<(&'static str, Value)> {
    let text = |col, v: &Option<String>| v.as_ref().map(|s| (col, Value::Text(s.clone())));
    let real = |col, v: Option<f64>| v.map(|x| (col, Value::Real(x)));
    [
        text("site_code", &patch.site_code),
        text("name", &patch.name),
        text("state", &patch.state),
        real("latitude", patch.latitude),
        real("longitude", patch.longitude),
        text("description", &patch.description),
        text("site_type", &patch.site_type),
        text("status", &patch.status),
        text("wiki_url", &patch.wiki_url),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[async_trait]
impl StorageAdapter for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!("Could not create {}: {}", dir.display(), e);
            }
        }
        self.with_conn("initialize", None, |conn| conn.execute_batch(SCHEMA))
            .await?;
        info!("SQLite store initialized at {}", self.path.display());
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Site>, StorageError> {
        self.with_conn("get_all", None, |conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM nike_sites ORDER BY id", COLUMNS))?;
            let rows = stmt
                .query_map([], row_to_site)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn get_by_id(&self, id: SiteId) -> Result<Option<Site>, StorageError> {
        self.with_conn("get_by_id", Some(id), move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM nike_sites WHERE id = ?1", COLUMNS),
                [id],
                row_to_site,
            )
            .optional()
        })
        .await
    }

    async fn add(&self, record: SiteRecord) -> Result<SiteId, StorageError> {
        validate_record(&record)?;
        self.with_conn("add", None, move |conn| {
            conn.execute(
                "INSERT INTO nike_sites
                 (site_code, name, state, latitude, longitude, description, site_type, status, wiki_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.site_code, record.name, record.state, record.latitude, record.longitude,
                    record.description, record.site_type, record.status, record.wiki_url,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn update(&self, id: SiteId, patch: &SitePatch) -> Result<bool, StorageError> {
        validate_patch(patch)?;
        let assignments = patch_assignments(patch);
        self.with_conn("update", Some(id), move |conn| {
            if assignments.is_empty() {
                let exists: Option<i64> = conn
                    .query_row("SELECT 1 FROM nike_sites WHERE id = ?1", [id], |r| r.get(0))
                    .optional()?;
                return Ok(exists.is_some());
            }

            let set_clause = assignments
                .iter()
                .enumerate()
                .map(|(i, (col, _))| format!("{} = ?{}", col, i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE nike_sites SET {}, updated_at = datetime('now') WHERE id = ?{}",
                set_clause,
                assignments.len() + 1
            );
            let values = assignments
                .into_iter()
                .map(|(_, v)| v)
                .chain(std::iter::once(Value::Integer(id)));
            let changed = conn.execute(&sql, rusqlite::params_from_iter(values))?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete(&self, id: SiteId) -> Result<bool, StorageError> {
        self.with_conn("delete", Some(id), move |conn| {
            let changed = conn.execute("DELETE FROM nike_sites WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
        .await
    }

    async fn import_sites(&self, records: &[SiteRecord]) -> Result<usize, StorageError> {
        for r in records {
            validate_record(r)?;
        }
        let records = records.to_vec();
        let count = self
            .with_conn("import_sites", None, move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM nike_sites", [])?;
                tx.execute("DELETE FROM sqlite_sequence WHERE name = 'nike_sites'", [])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO nike_sites
                         (id, site_code, name, state, latitude, longitude, description, site_type, status, wiki_url)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    )?;
                    for (r, id) in records.iter().zip(1i64..) {
                        stmt.execute(params![
                            id, r.site_code, r.name, r.state, r.latitude, r.longitude,
                            r.description, r.site_type, r.status, r.wiki_url,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(records.len())
            })
            .await?;
        info!("Imported {} sites into SQLite store", count);
        Ok(count)
    }
}
