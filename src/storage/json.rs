//! JSON file-based storage backend.
//!
//! Each database lives in its own human-readable file, `<data_dir>/<name>.json`.
//! Writes go to a temporary file that is then renamed over the target, so a
//! crash never leaves a half-written database behind.
//!
//! # Performance Characteristics
//!
//! - **Read**: O(n) - every operation loads the database file
//! - **Write**: O(n) - serializes and writes the entire database
//! - **Best for**: small key-value sets with infrequent writes
//!
//! Operations against the same database are serialized by a per-database
//! async lock held by the provider. Connections opened from one provider
//! therefore never interleave their read-modify-write cycles.

use crate::domain::error::{ProxyError, Result};
use crate::storage::backend::{StoreConnection, StoreProvider};
use crate::storage::models::{DatabaseRecord, StoreSchema};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::Instrument;

/// JSON file storage provider.
///
/// # Examples
///
/// ```no_run
/// use storeproxy::storage::JsonFileProvider;
///
/// let provider = JsonFileProvider::new("/tmp/storeproxy");
/// assert!(provider.database_path("sqflite_ffi_web").ends_with("sqflite_ffi_web.json"));
/// ```
#[derive(Debug)]
pub struct JsonFileProvider {
    /// Directory holding one file per database.
    data_dir: PathBuf,

    /// Per-database locks, created on first open.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl JsonFileProvider {
    /// Creates a provider rooted at `data_dir`. The directory is created on
    /// first open, not here.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the file backing database `db_name`.
    ///
    /// Characters outside `[A-Za-z0-9._-]` are replaced with `_` so a database
    /// name can never escape the data directory.
    #[must_use]
    pub fn database_path(&self, db_name: &str) -> PathBuf {
        let file_stem: String = db_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let file_stem = file_stem.trim_start_matches('.');
        let file_stem = if file_stem.is_empty() { "_" } else { file_stem };

        self.data_dir.join(format!("{file_stem}.json"))
    }

    async fn lock_for(&self, db_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(db_name.to_string()).or_default())
    }
}

#[async_trait]
impl StoreProvider for JsonFileProvider {
    async fn open(&self, schema: &StoreSchema) -> Result<Box<dyn StoreConnection>> {
        let span = tracing::debug_span!("json_open",
            db_name = %schema.db_name,
            version = schema.version
        );

        async {
            tokio::fs::create_dir_all(&self.data_dir).await?;

            let path = self.database_path(&schema.db_name);
            let lock = self.lock_for(&schema.db_name).await;

            {
                let _guard = lock.lock().await;

                let mut db = if tokio::fs::try_exists(&path).await? {
                    load_from_file(&path).await?
                } else {
                    tracing::debug!(path = ?path, "initializing new database");
                    DatabaseRecord::new(schema.db_name.clone())
                };

                if db.apply_schema(schema)? {
                    save_to_file(&path, &db).await?;
                }
            }

            tracing::debug!("database opened");
            Ok::<Box<dyn StoreConnection>, ProxyError>(Box::new(JsonFileConnection {
                db_name: schema.db_name.clone(),
                path,
                lock,
                closed: false,
            }))
        }
        .instrument(span)
        .await
    }
}

/// Loads a database from its JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains invalid JSON.
async fn load_from_file(path: &Path) -> Result<DatabaseRecord> {
    let contents = tokio::fs::read(path).await?;
    let db: DatabaseRecord = serde_json::from_slice(&contents)
        .map_err(|e| ProxyError::Storage(format!("failed to parse {}: {e}", path.display())))?;

    tracing::trace!(
        db_name = %db.name,
        version = db.version,
        stores = db.stores.len(),
        "loaded database"
    );

    Ok(db)
}

/// Saves a database using write-to-temp then rename.
///
/// # Errors
///
/// Returns an error if serialization, the temporary write or the rename fails.
async fn save_to_file(path: &Path, db: &DatabaseRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(db)?;
    let tmp_path = path.with_extension("json.tmp");

    tracing::trace!(tmp_path = ?tmp_path, "writing to temporary file");
    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, path).await?;

    tracing::trace!(path = ?path, "database saved");
    Ok(())
}

/// Connection to a JSON-file database.
///
/// Holds no data of its own: each operation takes the database lock, loads
/// the file, applies the change and writes it back.
struct JsonFileConnection {
    db_name: String,
    path: PathBuf,
    lock: Arc<Mutex<()>>,
    closed: bool,
}

impl JsonFileConnection {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ProxyError::Storage(format!(
                "connection to {} is closed",
                self.db_name
            )));
        }
        Ok(())
    }

    async fn load(&self) -> Result<DatabaseRecord> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Err(ProxyError::Storage(format!(
                "database not found: {}",
                self.db_name
            )));
        }
        load_from_file(&self.path).await
    }
}

#[async_trait]
impl StoreConnection for JsonFileConnection {
    async fn put(&mut self, store: &str, key: &str, value: Option<Value>) -> Result<()> {
        self.ensure_open()?;
        let span = tracing::debug_span!("json_put", store = %store, key = %key);

        async {
            let _guard = self.lock.lock().await;
            let mut db = self.load().await?;
            db.put(store, key, value)?;
            save_to_file(&self.path, &db).await
        }
        .instrument(span)
        .await
    }

    async fn get(&mut self, store: &str, key: &str) -> Result<Option<Value>> {
        self.ensure_open()?;
        let span = tracing::debug_span!("json_get", store = %store, key = %key);

        async {
            let _guard = self.lock.lock().await;
            let value = self.load().await?.get(store, key)?;
            tracing::debug!(found = value.is_some(), "lookup complete");
            Ok::<_, ProxyError>(value)
        }
        .instrument(span)
        .await
    }

    async fn delete(&mut self, store: &str, key: &str) -> Result<()> {
        self.ensure_open()?;
        let span = tracing::debug_span!("json_delete", store = %store, key = %key);

        async {
            let _guard = self.lock.lock().await;
            let mut db = self.load().await?;
            if db.delete(store, key)? {
                save_to_file(&self.path, &db).await?;
            } else {
                tracing::debug!("key absent, nothing to delete");
            }
            Ok::<_, ProxyError>(())
        }
        .instrument(span)
        .await
    }

    async fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;
        tracing::trace!(db_name = %self.db_name, "database closed");
        Ok(())
    }
}
