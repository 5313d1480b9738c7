//! Storage proxy worker: turns request messages into store operations.
//!
//! For every message the worker opens the configured database, performs
//! exactly one operation, closes the database and posts exactly one response
//! on the message's first reply port. Nothing is cached between messages.
//!
//! Two cases produce no response. Unrecognised commands are ignored with a
//! warning. Storage failures are logged at error level with no retry. In both
//! cases the reply port is dropped unposted.

use crate::domain::error::{ProxyError, Result};
use crate::domain::Command;
use crate::storage::{JsonFileProvider, StoreProvider, StoreSchema};
use crate::worker::lifecycle::{Lifecycle, LifecycleAction};
use crate::worker::messages::{Request, Response};
use crate::worker::port::ReplyPort;
use crate::Config;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// A request together with the reply ports transferred alongside it.
///
/// Only the first port is used; a message without ports is still handled but
/// its response is discarded.
pub struct MessageEvent {
    /// Request payload.
    pub data: Request,

    /// Transferred reply ports.
    pub ports: Vec<Box<dyn ReplyPort>>,
}

impl MessageEvent {
    /// Creates an event with a single reply port.
    pub fn new(data: Request, port: impl ReplyPort + 'static) -> Self {
        Self {
            data,
            ports: vec![Box::new(port)],
        }
    }
}

impl std::fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageEvent")
            .field("data", &self.data)
            .field("ports", &self.ports.len())
            .finish()
    }
}

/// The storage proxy worker.
///
/// The database name, version and object store come from [`Config`]; the
/// `dbName` and `storeName` carried by requests are ignored.
pub struct StorageProxyWorker {
    /// Opens a fresh connection for every message.
    provider: Arc<dyn StoreProvider>,

    /// Database the worker operates on.
    schema: StoreSchema,

    /// Object store within the database.
    store_name: String,

    lifecycle: Mutex<Lifecycle>,
}

impl StorageProxyWorker {
    /// Creates a worker over `provider` using the database described by `config`.
    pub fn new(provider: Arc<dyn StoreProvider>, config: &Config) -> Self {
        Self {
            provider,
            schema: StoreSchema::single(&config.db_name, &config.store_name, config.db_version),
            store_name: config.store_name.clone(),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// Creates a worker persisting to JSON files under `config.data_dir`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let provider: Arc<dyn StoreProvider> = Arc::new(JsonFileProvider::new(&config.data_dir));
        Self::new(provider, config)
    }

    /// Handles the `install` lifecycle event.
    pub fn on_install(&self) -> LifecycleAction {
        self.lifecycle().on_install()
    }

    /// Handles the `activate` lifecycle event.
    pub fn on_activate(&self) -> LifecycleAction {
        self.lifecycle().on_activate()
    }

    /// Handles a `fetch` event, which is never intercepted.
    pub fn on_fetch(&self, url: Option<&str>) -> LifecycleAction {
        self.lifecycle().on_fetch(url)
    }

    /// Whether the worker has claimed its clients.
    pub fn is_active(&self) -> bool {
        self.lifecycle().clients_claimed()
    }

    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one request against the store.
    ///
    /// Returns `Ok(None)` for an unrecognised command, which gets no reply.
    ///
    /// # Errors
    ///
    /// Returns an error if opening the database, the operation itself or
    /// closing the connection fails.
    pub async fn handle_request(&self, request: &Request) -> Result<Option<Response>> {
        let Some(command) = request.command() else {
            tracing::warn!(command = %request.command, "ignoring unrecognized command");
            return Ok(None);
        };

        let mut conn = self.provider.open(&self.schema).await?;

        let store = self.store_name.as_str();
        let outcome = match request.key.as_deref() {
            None => Err(ProxyError::Storage(format!("{command} request has no key"))),
            Some(key) => match command {
                Command::Put => conn
                    .put(store, key, request.value.clone())
                    .await
                    .map(|()| Response::ok()),
                Command::Get => conn.get(store, key).await.map(Response::value),
                Command::Delete => conn.delete(store, key).await.map(|()| Response::ok()),
            },
        };

        let closed = conn.close().await;
        let response = outcome?;
        closed?;

        tracing::debug!(command = %command, "storage operation successful");
        Ok(Some(response))
    }

    /// Handles a message event end to end, posting the response on the first
    /// reply port.
    ///
    /// Failures never reach the caller: they are logged and the port is
    /// dropped without a message.
    pub async fn on_message(&self, event: MessageEvent) {
        let MessageEvent { data, ports } = event;
        let span = Self::handling_span(&data);

        async {
            match self.handle_request(&data).await {
                Ok(Some(response)) => Self::reply(ports, response),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        command = %data.command,
                        key = ?data.key,
                        error = %e,
                        "storage operation failed, no reply sent"
                    );
                }
            }
        }
        .instrument(span)
        .await;
    }

    fn reply(ports: Vec<Box<dyn ReplyPort>>, response: Response) {
        let Some(port) = ports.into_iter().next() else {
            tracing::warn!("message carried no reply port, response discarded");
            return;
        };

        if let Err(e) = port.post_message(response) {
            tracing::debug!(error = %e, "caller stopped listening before the reply");
        }
    }

    /// Creates the span a message is handled in, parented on the caller's
    /// trace when the request carries one.
    fn handling_span(request: &Request) -> tracing::Span {
        let span = tracing::debug_span!(
            "worker_handle_message",
            command = %request.command,
            key = ?request.key
        );

        if let Some(parent) = Self::parent_trace_context(request) {
            span.set_parent(parent);
        }

        span
    }

    /// Rebuilds the caller's OpenTelemetry context from the request.
    fn parent_trace_context(request: &Request) -> Option<opentelemetry::Context> {
        use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};

        let trace_context = request.trace_context.as_ref()?;
        let trace_id = TraceId::from_hex(&trace_context.trace_id).ok()?;
        let span_id = SpanId::from_hex(&trace_context.parent_span_id).ok()?;

        let span_context = SpanContext::new(
            trace_id,
            span_id,
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );

        Some(opentelemetry::Context::new().with_remote_span_context(span_context))
    }
}

impl std::fmt::Debug for StorageProxyWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageProxyWorker")
            .field("schema", &self.schema)
            .field("store_name", &self.store_name)
            .finish_non_exhaustive()
    }
}
