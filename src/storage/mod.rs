//! Storage layer behind the proxy worker.
//!
//! The worker talks to storage only through the [`StoreProvider`] and
//! [`StoreConnection`] traits, opening a connection per message. Two engines
//! implement them.
//!
//! # Modules
//!
//! - `backend`: Provider and connection traits
//! - `models`: Database record and schema shared by the engines
//! - `json`: One JSON file per database, written atomically
//! - `memory`: Shared in-process map, used by tests and `--memory` runs

pub mod backend;
pub mod json;
pub mod memory;
pub mod models;

pub use backend::{StoreConnection, StoreProvider};
pub use json::JsonFileProvider;
pub use memory::MemoryProvider;
pub use models::{DatabaseRecord, ObjectStoreRecord, StoreSchema, StoredEntry};
