use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use storeproxy::client::StorageClient;
use storeproxy::storage::{JsonFileProvider, MemoryProvider, StoreProvider};
use storeproxy::worker::{
    ChannelPort, HostOutput, Request, Response, StorageProxyWorker, WorkerRuntime,
};
use storeproxy::{Config, ProxyError};
use tokio::sync::mpsc;

fn spawn(provider: Arc<dyn StoreProvider>, config: &Config) -> (WorkerRuntime, StorageClient) {
    let worker = StorageProxyWorker::new(provider, config);
    let runtime = WorkerRuntime::spawn(Arc::new(worker));
    let client = StorageClient::new(runtime.handle(), Duration::from_millis(500));
    (runtime, client)
}

fn memory_client() -> (WorkerRuntime, StorageClient, MemoryProvider) {
    let provider = MemoryProvider::new();
    let (runtime, client) = spawn(Arc::new(provider.clone()), &Config::default());
    (runtime, client, provider)
}

#[tokio::test]
async fn documented_example_sequence() {
    let (_runtime, client, _provider) = memory_client();

    assert_eq!(client.send(Request::put("a", json!("x"))).await.unwrap(), Response::ok());
    assert_eq!(
        client.send(Request::get("a")).await.unwrap(),
        Response::value(Some(json!("x")))
    );
    assert_eq!(client.send(Request::delete("a")).await.unwrap(), Response::ok());
    assert_eq!(client.send(Request::get("a")).await.unwrap(), Response::value(None));
}

#[tokio::test]
async fn get_returns_most_recent_put() {
    let (_runtime, client, _provider) = memory_client();

    assert!(client.put("k", json!(1)).await.unwrap());
    assert!(client.put("k", json!({"v": 2})).await.unwrap());

    assert_eq!(client.get("k").await.unwrap(), Some(json!({"v": 2})));
}

#[tokio::test]
async fn overwrite_leaves_other_keys_alone() {
    let (_runtime, client, _provider) = memory_client();

    client.put("a", json!("first")).await.unwrap();
    client.put("b", json!("other")).await.unwrap();
    client.put("a", json!("second")).await.unwrap();

    assert_eq!(client.get("a").await.unwrap(), Some(json!("second")));
    assert_eq!(client.get("b").await.unwrap(), Some(json!("other")));
}

#[tokio::test]
async fn never_written_key_is_undefined() {
    let (_runtime, client, _provider) = memory_client();
    assert_eq!(client.get("ghost").await.unwrap(), None);
}

#[tokio::test]
async fn delete_of_absent_key_succeeds() {
    let (_runtime, client, _provider) = memory_client();
    assert!(client.delete("ghost").await.unwrap());
    assert_eq!(client.get("ghost").await.unwrap(), None);
}

#[tokio::test]
async fn stored_null_is_not_undefined() {
    let (_runtime, client, _provider) = memory_client();

    client.put("n", Value::Null).await.unwrap();
    assert_eq!(
        client.send(Request::get("n")).await.unwrap(),
        Response::value(Some(Value::Null))
    );
}

#[tokio::test]
async fn put_without_value_reads_back_undefined_not_null() {
    let (_runtime, client, _provider) = memory_client();

    let put: Request = serde_json::from_value(json!({"command": "put", "key": "a"})).unwrap();
    assert_eq!(client.send(put).await.unwrap(), Response::ok());
    assert_eq!(client.send(Request::get("a")).await.unwrap(), Response::value(None));
}

#[tokio::test]
async fn request_without_key_gets_no_reply() {
    let (_runtime, client, provider) = memory_client();

    let put: Request = serde_json::from_value(json!({"command": "put", "value": "x"})).unwrap();
    let err = client.send(put).await.unwrap_err();
    assert!(matches!(err, ProxyError::ChannelClosed | ProxyError::Timeout(_)));

    assert_eq!(client.get("").await.unwrap(), None);
    assert_eq!(provider.open_connections(), 0);
}

#[tokio::test]
async fn unrecognized_command_gets_no_reply() {
    let (_runtime, client, provider) = memory_client();

    let err = client.send(Request::new("clear", "a")).await.unwrap_err();
    assert!(matches!(err, ProxyError::ChannelClosed | ProxyError::Timeout(_)));
    assert_eq!(provider.open_connections(), 0);
}

#[tokio::test]
async fn unrecognized_command_writes_no_reply_line() {
    let provider = MemoryProvider::new();
    let (runtime, _client) = spawn(Arc::new(provider), &Config::default());
    let handle = runtime.handle();

    let (output_tx, mut output_rx) = mpsc::unbounded_channel();
    handle
        .post_message(
            Request::new("frobnicate", "a"),
            vec![Box::new(ChannelPort::new(1, output_tx.clone()))],
        )
        .unwrap();
    handle
        .post_message(
            Request::get("a"),
            vec![Box::new(ChannelPort::new(2, output_tx))],
        )
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(1), output_rx.recv())
        .await
        .unwrap();
    assert_eq!(
        first,
        Some(HostOutput::Reply {
            port: 2,
            data: Response::value(None),
        })
    );

    // Every port is gone once both messages are handled.
    let rest = tokio::time::timeout(Duration::from_secs(1), output_rx.recv())
        .await
        .unwrap();
    assert_eq!(rest, None);
}

#[tokio::test]
async fn concurrent_requests_all_complete_and_close() {
    let (_runtime, client, provider) = memory_client();

    let writes: Vec<_> = (0..32)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.put(format!("key-{i}"), json!(i)).await })
        })
        .collect();
    for write in writes {
        assert!(write.await.unwrap().unwrap());
    }

    for i in 0..32 {
        assert_eq!(client.get(format!("key-{i}")).await.unwrap(), Some(json!(i)));
    }
    assert_eq!(provider.open_connections(), 0);
}

#[tokio::test]
async fn json_store_persists_across_workers() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };

    {
        let (runtime, client) = spawn(Arc::new(JsonFileProvider::new(dir.path())), &config);
        client.put("a", json!({"rows": [[1, "x"]]})).await.unwrap();
        client.put("b", json!("gone soon")).await.unwrap();
        client.delete("b").await.unwrap();
        drop(client);
        runtime.shutdown().await;
    }

    let (_runtime, client) = spawn(Arc::new(JsonFileProvider::new(dir.path())), &config);
    assert_eq!(client.get("a").await.unwrap(), Some(json!({"rows": [[1, "x"]]})));
    assert_eq!(client.get("b").await.unwrap(), None);
    assert!(dir.path().join("sqflite_ffi_web.json").exists());
}

#[tokio::test]
async fn version_conflict_produces_no_reply() {
    let dir = tempfile::tempdir().unwrap();
    let newer = Config {
        data_dir: dir.path().to_path_buf(),
        db_version: 2,
        ..Config::default()
    };
    let older = Config {
        db_version: 1,
        ..newer.clone()
    };

    let (_runtime, client) = spawn(Arc::new(JsonFileProvider::new(dir.path())), &newer);
    client.put("a", json!(1)).await.unwrap();

    let (_runtime, client) = spawn(Arc::new(JsonFileProvider::new(dir.path())), &older);
    let err = client.get("a").await.unwrap_err();
    assert!(matches!(err, ProxyError::ChannelClosed | ProxyError::Timeout(_)));
}
