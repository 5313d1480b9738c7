//! Foreground-side client for the storage proxy worker.
//!
//! The worker never reports failures back, and it ignores commands it does
//! not know. A caller awaiting a reply must therefore bound the wait itself.
//! [`StorageClient`] does that, failing with [`ProxyError::Timeout`] when no
//! reply arrives in time or [`ProxyError::ChannelClosed`] when the worker
//! dropped the reply port without answering.

use crate::domain::error::{ProxyError, Result};
use crate::worker::{OneshotPort, Request, Response, WorkerHandle};
use serde_json::Value;
use std::time::Duration;

/// Typed client posting requests to a running worker.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use storeproxy::client::StorageClient;
/// use storeproxy::storage::MemoryProvider;
/// use storeproxy::worker::{StorageProxyWorker, WorkerRuntime};
/// use storeproxy::Config;
/// use serde_json::json;
///
/// # async fn demo() -> storeproxy::Result<()> {
/// let config = Config::default();
/// let worker = StorageProxyWorker::new(Arc::new(MemoryProvider::new()), &config);
/// let runtime = WorkerRuntime::spawn(Arc::new(worker));
/// let client = StorageClient::new(runtime.handle(), config.reply_timeout());
///
/// client.put("a", json!("x")).await?;
/// assert_eq!(client.get("a").await?, Some(json!("x")));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StorageClient {
    handle: WorkerHandle,
    timeout: Duration,
}

impl StorageClient {
    /// Creates a client waiting at most `timeout` for each reply.
    #[must_use]
    pub const fn new(handle: WorkerHandle, timeout: Duration) -> Self {
        Self { handle, timeout }
    }

    /// Sends a raw request and waits for its reply.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::Worker`] if the worker has stopped
    /// - [`ProxyError::ChannelClosed`] if the worker dropped the port unanswered
    /// - [`ProxyError::Timeout`] if no reply arrived in time
    pub async fn send(&self, request: Request) -> Result<Response> {
        let command = request.command.clone();
        let (port, receiver) = OneshotPort::channel();
        self.handle.post_message(request, vec![Box::new(port)])?;

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                tracing::debug!(command = %command, "reply port dropped without a response");
                Err(ProxyError::ChannelClosed)
            }
            Err(_) => {
                tracing::warn!(command = %command, timeout = ?self.timeout, "no reply from worker");
                Err(ProxyError::Timeout(self.timeout))
            }
        }
    }

    /// Stores `value` under `key`, returning the worker's `result` flag.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn put(&self, key: impl Into<String>, value: Value) -> Result<bool> {
        let response = self.send(Request::put(key, value)).await?;
        Ok(response.result == Some(Value::Bool(true)))
    }

    /// Reads the value under `key`, `None` when nothing is stored.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get(&self, key: impl Into<String>) -> Result<Option<Value>> {
        Ok(self.send(Request::get(key)).await?.result)
    }

    /// Removes the entry under `key`, returning the worker's `result` flag.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete(&self, key: impl Into<String>) -> Result<bool> {
        let response = self.send(Request::delete(key)).await?;
        Ok(response.result == Some(Value::Bool(true)))
    }
}
