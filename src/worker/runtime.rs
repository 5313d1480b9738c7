//! Runs a worker on its own task.
//!
//! Messages are queued on an unbounded channel and each one is handled on a
//! separate task, so the open/operate/close phases of concurrent requests can
//! interleave. No ordering is imposed between requests.

use crate::domain::error::{ProxyError, Result};
use crate::worker::handler::{MessageEvent, StorageProxyWorker};
use crate::worker::messages::Request;
use crate::worker::port::ReplyPort;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// A running worker.
///
/// Dropping every [`WorkerHandle`] and calling [`shutdown`](Self::shutdown)
/// stops intake; in-flight messages are allowed to finish.
#[derive(Debug)]
pub struct WorkerRuntime {
    sender: mpsc::UnboundedSender<MessageEvent>,
    task: JoinHandle<()>,
}

impl WorkerRuntime {
    /// Spawns the message loop for `worker` on the current tokio runtime.
    #[must_use]
    pub fn spawn(worker: Arc<StorageProxyWorker>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_message_loop(worker, receiver));
        Self { sender, task }
    }

    /// Returns a handle for posting messages to the worker.
    #[must_use]
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            sender: self.sender.clone(),
        }
    }

    /// Stops accepting messages from this runtime's own sender and waits for
    /// the loop to drain. Outstanding handles keep the loop alive.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "worker message loop panicked");
        }
    }
}

async fn run_message_loop(
    worker: Arc<StorageProxyWorker>,
    mut receiver: mpsc::UnboundedReceiver<MessageEvent>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            event = receiver.recv() => {
                let Some(event) = event else { break };
                let worker = Arc::clone(&worker);
                in_flight.spawn(async move { worker.on_message(event).await });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "message handler panicked");
                }
            }
        }
    }

    tracing::debug!(in_flight = in_flight.len(), "intake closed, draining in-flight messages");
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "message handler panicked");
        }
    }
    tracing::debug!("worker message loop stopped");
}

/// Cloneable handle for posting messages to a running worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    sender: mpsc::UnboundedSender<MessageEvent>,
}

impl WorkerHandle {
    /// Posts `data` to the worker with the given reply ports.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Worker`] if the worker has stopped.
    pub fn post_message(&self, data: Request, ports: Vec<Box<dyn ReplyPort>>) -> Result<()> {
        self.sender
            .send(MessageEvent { data, ports })
            .map_err(|_| ProxyError::Worker("worker is not running".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryProvider;
    use crate::worker::messages::Response;
    use crate::worker::port::OneshotPort;
    use crate::Config;
    use serde_json::json;

    fn spawn_memory_worker() -> (WorkerRuntime, MemoryProvider) {
        let provider = MemoryProvider::new();
        let worker = StorageProxyWorker::new(Arc::new(provider.clone()), &Config::default());
        (WorkerRuntime::spawn(Arc::new(worker)), provider)
    }

    #[tokio::test]
    async fn replies_arrive_through_posted_ports() {
        let (runtime, _provider) = spawn_memory_worker();
        let handle = runtime.handle();

        let (port, receiver) = OneshotPort::channel();
        handle.post_message(Request::put("a", json!("x")), vec![Box::new(port)]).unwrap();
        assert_eq!(receiver.await.unwrap(), Response::ok());

        drop(handle);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_messages() {
        let (runtime, provider) = spawn_memory_worker();
        let handle = runtime.handle();

        let mut receivers = Vec::new();
        for i in 0..16 {
            let (port, receiver) = OneshotPort::channel();
            handle
                .post_message(Request::put(format!("k{i}"), json!(i)), vec![Box::new(port)])
                .unwrap();
            receivers.push(receiver);
        }
        drop(handle);
        runtime.shutdown().await;

        for receiver in receivers {
            assert_eq!(receiver.await.unwrap(), Response::ok());
        }
        assert_eq!(provider.open_connections(), 0);
    }

    #[tokio::test]
    async fn posting_after_stop_fails() {
        let (runtime, _provider) = spawn_memory_worker();
        let WorkerRuntime { sender, task } = runtime;
        let handle = WorkerHandle { sender };
        task.abort();
        let _ = task.await;

        let err = handle.post_message(Request::get("a"), Vec::new()).unwrap_err();
        assert!(matches!(err, ProxyError::Worker(_)));
    }
}
