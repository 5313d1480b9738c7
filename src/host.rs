//! Line-delimited JSON host for the worker.
//!
//! [`serve`] reads one [`HostEvent`] per input line and writes one
//! [`HostOutput`] per output line. Lifecycle events are answered inline;
//! messages are posted to a [`WorkerRuntime`] and their replies are written
//! in completion order. Blank and malformed lines are skipped.

use crate::domain::error::{ProxyError, Result};
use crate::worker::{
    ChannelPort, HostEvent, HostOutput, LifecycleAction, StorageProxyWorker, WorkerHandle,
    WorkerRuntime,
};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Serves the line protocol until `input` is exhausted.
///
/// In-flight messages are drained before returning, so every reply the
/// worker posts has been written to `output` by then. The writer is handed
/// back once flushed.
///
/// # Errors
///
/// Returns an error if reading `input` or writing `output` fails.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use storeproxy::host::serve;
/// use storeproxy::storage::MemoryProvider;
/// use storeproxy::worker::StorageProxyWorker;
/// use storeproxy::Config;
///
/// # async fn demo() -> storeproxy::Result<()> {
/// let worker = StorageProxyWorker::new(Arc::new(MemoryProvider::new()), &Config::default());
/// let input: &[u8] = b"{\"type\":\"install\"}\n";
/// let output = serve(Arc::new(worker), input, Vec::new()).await?;
/// assert_eq!(output, b"{\"type\":\"lifecycle\",\"action\":\"skipWaiting\"}\n");
/// # Ok(())
/// # }
/// ```
pub async fn serve<R, W>(worker: Arc<StorageProxyWorker>, input: R, output: W) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let runtime = WorkerRuntime::spawn(Arc::clone(&worker));
    let handle = runtime.handle();

    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outputs(output_rx, output));

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: HostEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed host event");
                continue;
            }
        };

        if let Some(action) = dispatch(&worker, &handle, &output_tx, event)? {
            output_tx
                .send(HostOutput::Lifecycle { action })
                .map_err(|_| ProxyError::Worker("output writer stopped".to_string()))?;
        }
    }

    tracing::info!("input closed, draining in-flight messages");
    drop(handle);
    runtime.shutdown().await;
    drop(output_tx);

    writer
        .await
        .map_err(|e| ProxyError::Worker(format!("output writer panicked: {e}")))?
}

/// Routes one event, returning the lifecycle action to report, if any.
fn dispatch(
    worker: &StorageProxyWorker,
    handle: &WorkerHandle,
    output_tx: &mpsc::UnboundedSender<HostOutput>,
    event: HostEvent,
) -> Result<Option<LifecycleAction>> {
    match event {
        HostEvent::Install => Ok(Some(worker.on_install())),
        HostEvent::Activate => Ok(Some(worker.on_activate())),
        HostEvent::Fetch { url } => Ok(Some(worker.on_fetch(url.as_deref()))),
        HostEvent::Message { port, data } => {
            let reply_port = ChannelPort::new(port, output_tx.clone());
            handle.post_message(data, vec![Box::new(reply_port)])?;
            Ok(None)
        }
    }
}

async fn write_outputs<W>(mut outputs: mpsc::UnboundedReceiver<HostOutput>, mut output: W) -> Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = outputs.recv().await {
        let mut line = serde_json::to_vec(&item)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(output)
}
