//! Storage backend abstraction.
//!
//! The worker never holds on to a database: for every message it asks a
//! [`StoreProvider`] for a fresh [`StoreConnection`], runs one operation and
//! closes it again. Providers are injected into the worker, which is how tests
//! swap the on-disk engine for an in-memory one or for a failing double.

use crate::domain::error::Result;
use crate::storage::models::StoreSchema;
use async_trait::async_trait;
use serde_json::Value;

/// Opens connections to named databases.
///
/// # Implementations
///
/// - [`JsonFileProvider`](crate::storage::JsonFileProvider): one JSON file per database (default)
/// - [`MemoryProvider`](crate::storage::MemoryProvider): process memory, used by tests
///
/// # Examples
///
/// ```no_run
/// use storeproxy::storage::{JsonFileProvider, StoreProvider, StoreSchema};
/// use serde_json::json;
///
/// # async fn demo() -> storeproxy::Result<()> {
/// let provider = JsonFileProvider::new("/tmp/storeproxy");
/// let mut conn = provider.open(&StoreSchema::single("db", "kv", 1)).await?;
/// conn.put("kv", "a", Some(json!("x"))).await?;
/// conn.close().await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// Opens the database described by `schema`, upgrading it first when the
    /// requested version is newer than the stored one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be loaded or its stored
    /// version is newer than `schema.version`.
    async fn open(&self, schema: &StoreSchema) -> Result<Box<dyn StoreConnection>>;
}

/// An open handle on one database.
///
/// Every method fails once [`close`](StoreConnection::close) has been called.
#[async_trait]
pub trait StoreConnection: Send {
    /// Writes `value` under `key` in `store`, overwriting any existing entry.
    /// `None` keeps the key without a value, which reads back as undefined.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not exist or the write fails.
    async fn put(&mut self, store: &str, key: &str, value: Option<Value>) -> Result<()>;

    /// Reads the value under `key` in `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not exist or the read fails.
    async fn get(&mut self, store: &str, key: &str) -> Result<Option<Value>>;

    /// Removes the entry under `key` in `store`. Absent keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not exist or the write fails.
    async fn delete(&mut self, store: &str, key: &str) -> Result<()>;

    /// Releases the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection was already closed.
    async fn close(&mut self) -> Result<()>;
}
