//! Storage record models shared by the storage engines.
//!
//! A [`DatabaseRecord`] is the complete state of one named database: its schema
//! version and its object stores. Engines differ only in where the record
//! lives (a JSON file, or process memory); the record itself enforces the
//! versioning and object store rules.

use crate::domain::error::{ProxyError, Result};
use crate::domain::present;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Entries of a single object store, keyed by record key.
pub type ObjectStoreRecord = BTreeMap<String, StoredEntry>;

/// One stored record.
///
/// A key written without a value is kept with `value: None`. It reads back
/// as undefined, unlike a stored JSON `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Stored value, `None` when the key was written without one.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Desired shape of a database, passed to `StoreProvider::open`.
///
/// Opening with a version higher than the stored one runs the upgrade, which
/// creates every listed object store that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSchema {
    /// Database name.
    pub db_name: String,

    /// Schema version to open with. Must be greater than zero.
    pub version: u32,

    /// Object stores the upgrade creates.
    pub stores: Vec<String>,
}

impl StoreSchema {
    /// Schema for a database containing exactly one object store.
    ///
    /// # Examples
    ///
    /// ```
    /// use storeproxy::storage::StoreSchema;
    ///
    /// let schema = StoreSchema::single("sqflite_ffi_web", "sqflite", 1);
    /// assert_eq!(schema.stores, vec!["sqflite".to_string()]);
    /// ```
    pub fn single(db_name: impl Into<String>, store_name: impl Into<String>, version: u32) -> Self {
        Self {
            db_name: db_name.into(),
            version,
            stores: vec![store_name.into()],
        }
    }
}

/// Persisted state of one database.
///
/// # File Format
///
/// ```json
/// {
///   "name": "sqflite_ffi_web",
///   "version": 1,
///   "updated_at": 1700000000,
///   "stores": {
///     "sqflite": {
///       "a": { "value": "x" },
///       "b": { "value": null },
///       "c": {}
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    /// Database name.
    pub name: String,

    /// Schema version, 0 for a database that has never been upgraded.
    pub version: u32,

    /// Unix timestamp of the last schema change or write.
    #[serde(default)]
    pub updated_at: i64,

    /// Object stores by name.
    #[serde(default)]
    pub stores: BTreeMap<String, ObjectStoreRecord>,
}

impl DatabaseRecord {
    /// Creates an empty, never-upgraded database.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            updated_at: chrono::Utc::now().timestamp(),
            stores: BTreeMap::new(),
        }
    }

    /// Brings the database up to `schema`, returning whether an upgrade ran.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::Storage`] if the requested version is zero
    /// - [`ProxyError::VersionMismatch`] if the stored version is newer
    pub fn apply_schema(&mut self, schema: &StoreSchema) -> Result<bool> {
        if schema.version == 0 {
            return Err(ProxyError::Storage(
                "database version must be greater than zero".to_string(),
            ));
        }

        if schema.version < self.version {
            return Err(ProxyError::VersionMismatch {
                requested: schema.version,
                stored: self.version,
            });
        }

        if schema.version == self.version {
            return Ok(false);
        }

        let old_version = self.version;
        for store in &schema.stores {
            // Upgrades only add stores; existing entries survive.
            self.stores.entry(store.clone()).or_default();
        }
        self.version = schema.version;
        self.touch();

        tracing::debug!(
            db_name = %self.name,
            old_version = old_version,
            new_version = self.version,
            store_count = self.stores.len(),
            "database upgraded"
        );

        Ok(true)
    }

    /// Writes `value` under `key`, overwriting any existing entry. `None`
    /// stores the key without a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the object store does not exist.
    pub fn put(&mut self, store: &str, key: &str, value: Option<Value>) -> Result<()> {
        self.store_mut(store)?
            .insert(key.to_string(), StoredEntry { value });
        self.touch();
        Ok(())
    }

    /// Reads the value under `key`, `None` when absent or stored without
    /// a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the object store does not exist.
    pub fn get(&self, store: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .store(store)?
            .get(key)
            .and_then(|entry| entry.value.clone()))
    }

    /// Removes the entry under `key`, returning whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the object store does not exist.
    pub fn delete(&mut self, store: &str, key: &str) -> Result<bool> {
        let existed = self.store_mut(store)?.remove(key).is_some();
        if existed {
            self.touch();
        }
        Ok(existed)
    }

    fn store(&self, name: &str) -> Result<&ObjectStoreRecord> {
        self.stores
            .get(name)
            .ok_or_else(|| ProxyError::Storage(format!("object store not found: {name}")))
    }

    fn store_mut(&mut self, name: &str) -> Result<&mut ObjectStoreRecord> {
        self.stores
            .get_mut(name)
            .ok_or_else(|| ProxyError::Storage(format!("object store not found: {name}")))
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upgraded() -> DatabaseRecord {
        let mut db = DatabaseRecord::new("db");
        db.apply_schema(&StoreSchema::single("db", "kv", 1)).unwrap();
        db
    }

    #[test]
    fn first_open_creates_store() {
        let mut db = DatabaseRecord::new("db");
        assert!(db.apply_schema(&StoreSchema::single("db", "kv", 1)).unwrap());
        assert_eq!(db.version, 1);
        assert!(db.stores.contains_key("kv"));
    }

    #[test]
    fn reopening_same_version_is_idempotent() {
        let mut db = upgraded();
        db.put("kv", "a", Some(json!("x"))).unwrap();

        assert!(!db.apply_schema(&StoreSchema::single("db", "kv", 1)).unwrap());
        assert_eq!(db.get("kv", "a").unwrap(), Some(json!("x")));
    }

    #[test]
    fn higher_version_keeps_existing_entries() {
        let mut db = upgraded();
        db.put("kv", "a", Some(json!(1))).unwrap();

        let schema = StoreSchema {
            db_name: "db".to_string(),
            version: 2,
            stores: vec!["kv".to_string(), "other".to_string()],
        };
        assert!(db.apply_schema(&schema).unwrap());
        assert_eq!(db.get("kv", "a").unwrap(), Some(json!(1)));
        assert!(db.stores.contains_key("other"));
    }

    #[test]
    fn lower_version_is_rejected() {
        let mut db = DatabaseRecord::new("db");
        db.apply_schema(&StoreSchema::single("db", "kv", 3)).unwrap();

        let err = db.apply_schema(&StoreSchema::single("db", "kv", 2)).unwrap_err();
        assert!(matches!(err, ProxyError::VersionMismatch { requested: 2, stored: 3 }));
    }

    #[test]
    fn version_zero_is_rejected() {
        let mut db = DatabaseRecord::new("db");
        assert!(db.apply_schema(&StoreSchema::single("db", "kv", 0)).is_err());
    }

    #[test]
    fn put_overwrites_without_touching_other_keys() {
        let mut db = upgraded();
        db.put("kv", "a", Some(json!("x"))).unwrap();
        db.put("kv", "b", Some(json!("y"))).unwrap();
        db.put("kv", "a", Some(json!("z"))).unwrap();

        assert_eq!(db.get("kv", "a").unwrap(), Some(json!("z")));
        assert_eq!(db.get("kv", "b").unwrap(), Some(json!("y")));
    }

    #[test]
    fn delete_reports_presence() {
        let mut db = upgraded();
        db.put("kv", "a", None).unwrap();

        assert!(db.delete("kv", "a").unwrap());
        assert!(!db.delete("kv", "a").unwrap());
        assert_eq!(db.get("kv", "a").unwrap(), None);
    }

    #[test]
    fn valueless_entry_differs_from_stored_null_on_disk() {
        let mut db = upgraded();
        db.put("kv", "none", None).unwrap();
        db.put("kv", "null", Some(Value::Null)).unwrap();

        let json = serde_json::to_value(&db).unwrap();
        assert_eq!(json["stores"]["kv"]["none"], json!({}));
        assert_eq!(json["stores"]["kv"]["null"], json!({"value": null}));

        let reloaded: DatabaseRecord = serde_json::from_value(json).unwrap();
        assert_eq!(reloaded.get("kv", "none").unwrap(), None);
        assert_eq!(reloaded.get("kv", "null").unwrap(), Some(Value::Null));
        assert!(reloaded.stores["kv"].contains_key("none"));
    }

    #[test]
    fn missing_store_is_an_error() {
        let db = upgraded();
        assert!(matches!(db.get("nope", "a"), Err(ProxyError::Storage(_))));
    }
}
