//! Domain layer for the storage proxy.
//!
//! Holds the types every other layer agrees on, independent of the storage
//! engine and of the transport used to reach the worker.
//!
//! # Organization
//!
//! - [`error`]: Error type and result alias
//! - [`command`]: The `put` / `get` / `delete` command set

pub mod command;
pub mod error;
mod value;

pub use command::Command;
pub use error::{ProxyError, Result};
pub(crate) use value::present;
