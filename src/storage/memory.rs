//! In-memory storage backend.
//!
//! Keeps every database in a shared map guarded by an async mutex. Clones of a
//! [`MemoryProvider`] share the same databases, so a test can hand one clone
//! to the worker and inspect state through another.

use crate::domain::error::{ProxyError, Result};
use crate::storage::backend::{StoreConnection, StoreProvider};
use crate::storage::models::{DatabaseRecord, StoreSchema};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

type Databases = Arc<Mutex<HashMap<String, DatabaseRecord>>>;

/// Process-local storage provider.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    databases: Databases,
    open_connections: Arc<AtomicUsize>,
}

impl MemoryProvider {
    /// Creates a provider with no databases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connections opened and not yet closed or dropped.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// Returns a copy of a database's current state.
    pub async fn snapshot(&self, db_name: &str) -> Option<DatabaseRecord> {
        self.databases.lock().await.get(db_name).cloned()
    }
}

#[async_trait]
impl StoreProvider for MemoryProvider {
    async fn open(&self, schema: &StoreSchema) -> Result<Box<dyn StoreConnection>> {
        {
            let mut databases = self.databases.lock().await;
            let db = databases
                .entry(schema.db_name.clone())
                .or_insert_with(|| DatabaseRecord::new(schema.db_name.clone()));
            db.apply_schema(schema)?;
        }

        let open = self.open_connections.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(db_name = %schema.db_name, open_connections = open, "memory database opened");
        Ok(Box::new(MemoryConnection {
            db_name: schema.db_name.clone(),
            databases: Arc::clone(&self.databases),
            open_connections: Arc::clone(&self.open_connections),
            closed: false,
        }))
    }
}

struct MemoryConnection {
    db_name: String,
    databases: Databases,
    open_connections: Arc<AtomicUsize>,
    closed: bool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ProxyError::Storage(format!(
                "connection to {} is closed",
                self.db_name
            )));
        }
        Ok(())
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_connections.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn put(&mut self, store: &str, key: &str, value: Option<Value>) -> Result<()> {
        self.ensure_open()?;
        let mut databases = self.databases.lock().await;
        let db = databases
            .get_mut(&self.db_name)
            .ok_or_else(|| ProxyError::Storage(format!("database not found: {}", self.db_name)))?;
        db.put(store, key, value)
    }

    async fn get(&mut self, store: &str, key: &str) -> Result<Option<Value>> {
        self.ensure_open()?;
        let databases = self.databases.lock().await;
        let db = databases
            .get(&self.db_name)
            .ok_or_else(|| ProxyError::Storage(format!("database not found: {}", self.db_name)))?;
        db.get(store, key)
    }

    async fn delete(&mut self, store: &str, key: &str) -> Result<()> {
        self.ensure_open()?;
        let mut databases = self.databases.lock().await;
        let db = databases
            .get_mut(&self.db_name)
            .ok_or_else(|| ProxyError::Storage(format!("database not found: {}", self.db_name)))?;
        db.delete(store, key).map(|_| ())
    }

    async fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.release();
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> StoreSchema {
        StoreSchema::single("db", "kv", 1)
    }

    #[tokio::test]
    async fn clones_share_databases() {
        let provider = MemoryProvider::new();
        let observer = provider.clone();

        let mut conn = provider.open(&schema()).await.unwrap();
        conn.put("kv", "a", Some(json!({"n": 1}))).await.unwrap();
        conn.close().await.unwrap();

        let db = observer.snapshot("db").await.unwrap();
        assert_eq!(db.get("kv", "a").unwrap(), Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn tracks_open_connections() {
        let provider = MemoryProvider::new();
        let mut first = provider.open(&schema()).await.unwrap();
        let second = provider.open(&schema()).await.unwrap();
        assert_eq!(provider.open_connections(), 2);

        first.close().await.unwrap();
        assert_eq!(provider.open_connections(), 1);

        drop(second);
        assert_eq!(provider.open_connections(), 0);
    }

    #[tokio::test]
    async fn closed_connection_rejects_operations() {
        let provider = MemoryProvider::new();
        let mut conn = provider.open(&schema()).await.unwrap();
        conn.close().await.unwrap();

        assert!(conn.get("kv", "a").await.is_err());
        assert!(conn.close().await.is_err());
        assert_eq!(provider.open_connections(), 0);
    }
}
