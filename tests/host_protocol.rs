use serde_json::json;
use std::sync::Arc;
use storeproxy::host::serve;
use storeproxy::storage::MemoryProvider;
use storeproxy::worker::{HostOutput, LifecycleAction, Response, StorageProxyWorker};
use storeproxy::Config;

async fn run_lines(provider: &MemoryProvider, input: &str) -> Vec<HostOutput> {
    let worker = StorageProxyWorker::new(Arc::new(provider.clone()), &Config::default());
    let output = serve(Arc::new(worker), input.as_bytes(), Vec::new())
        .await
        .unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn lifecycle_events_are_answered_in_order() {
    let input = r#"{"type":"install"}
{"type":"activate"}
{"type":"fetch","url":"https://example.test/"}
"#;
    let outputs = run_lines(&MemoryProvider::new(), input).await;

    assert_eq!(
        outputs,
        vec![
            HostOutput::Lifecycle { action: LifecycleAction::SkipWaiting },
            HostOutput::Lifecycle { action: LifecycleAction::ClaimClients },
            HostOutput::Lifecycle { action: LifecycleAction::Passthrough },
        ]
    );
}

#[tokio::test]
async fn malformed_and_blank_lines_are_skipped() {
    let input = r#"
not json at all
{"type":"reboot"}
{"type":"message","data":{"command":"get","key":"a"}}
{"type":"install"}
"#;
    let outputs = run_lines(&MemoryProvider::new(), input).await;

    assert_eq!(
        outputs,
        vec![HostOutput::Lifecycle { action: LifecycleAction::SkipWaiting }]
    );
}

#[tokio::test]
async fn message_reply_carries_its_port() {
    let input = r#"{"type":"activate"}
{"type":"message","port":9,"data":{"command":"put","key":"a","value":{"n":1}}}
"#;
    let provider = MemoryProvider::new();
    let outputs = run_lines(&provider, input).await;

    assert_eq!(
        outputs,
        vec![
            HostOutput::Lifecycle { action: LifecycleAction::ClaimClients },
            HostOutput::Reply { port: 9, data: Response::ok() },
        ]
    );

    let config = Config::default();
    let db = provider.snapshot(&config.db_name).await.unwrap();
    assert_eq!(db.get(&config.store_name, "a").unwrap(), Some(json!({"n": 1})));
}

#[tokio::test]
async fn unanswered_messages_write_no_line() {
    let input = r#"{"type":"message","port":1,"data":{"command":"clear","key":"a"}}
{"type":"message","port":2,"data":{"command":"put","value":"x"}}
{"type":"message","port":3,"data":{"command":"get","key":"ghost"}}
"#;
    let provider = MemoryProvider::new();
    let outputs = run_lines(&provider, input).await;

    assert_eq!(
        outputs,
        vec![HostOutput::Reply { port: 3, data: Response::value(None) }]
    );
    assert_eq!(provider.open_connections(), 0);
}

#[tokio::test]
async fn replies_are_written_as_camel_case_json_lines() {
    let provider = MemoryProvider::new();
    let worker = StorageProxyWorker::new(Arc::new(provider), &Config::default());
    let input = r#"{"type":"message","port":4,"data":{"command":"delete","key":"a"}}"#;

    let output = serve(Arc::new(worker), input.as_bytes(), Vec::new())
        .await
        .unwrap();

    assert_eq!(
        String::from_utf8(output).unwrap(),
        "{\"type\":\"reply\",\"port\":4,\"data\":{\"result\":true}}\n"
    );
}
