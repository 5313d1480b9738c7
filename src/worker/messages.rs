//! Message types exchanged with the storage proxy worker.
//!
//! A [`Request`] mirrors the payload a foreground context posts to the worker:
//! `{command, dbName, storeName, key, value}`. A [`Response`] is the single
//! `{result}` message posted back on the request's reply port. Requests can
//! carry a [`TraceContext`] so the worker's spans join the caller's trace.

use crate::domain::{present, Command};
use crate::worker::lifecycle::LifecycleAction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Distributed tracing context for cross-context span propagation.
///
/// Captures the current trace and span IDs from OpenTelemetry so the worker
/// can parent its handling span on the caller's span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    /// OpenTelemetry trace ID as a hex string.
    pub trace_id: String,

    /// Parent span ID for linking spans across contexts.
    pub parent_span_id: String,
}

impl TraceContext {
    /// Creates a trace context from the current tracing span.
    ///
    /// Returns `None` when the current span has no valid OpenTelemetry
    /// context, e.g. when tracing was never initialised.
    pub fn from_current() -> Option<Self> {
        use opentelemetry::trace::TraceContextExt;
        use tracing_opentelemetry::OpenTelemetrySpanExt;

        let otel_context = tracing::Span::current().context();
        let span_ref = otel_context.span();
        let span_context = span_ref.span_context();

        if !span_context.is_valid() {
            return None;
        }

        Some(Self {
            trace_id: format!("{:032x}", span_context.trace_id()),
            parent_span_id: format!("{:016x}", span_context.span_id()),
        })
    }
}

/// A storage request posted to the worker.
///
/// `command` is kept as a string so unrecognised commands survive decoding;
/// see [`Request::command`]. `db_name` and `store_name` are accepted for wire
/// compatibility but the worker always uses its configured database.
///
/// # Examples
///
/// ```
/// use storeproxy::worker::Request;
/// use serde_json::json;
///
/// let request: Request = serde_json::from_value(json!({
///     "command": "put",
///     "dbName": "ignored",
///     "storeName": "ignored",
///     "key": "a",
///     "value": "x"
/// })).unwrap();
///
/// assert_eq!(request.key.as_deref(), Some("a"));
/// assert_eq!(request.value, Some(json!("x")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Command name: `put`, `get` or `delete`.
    pub command: String,

    /// Database name supplied by the caller (unused).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    /// Object store name supplied by the caller (unused).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,

    /// Record key. A request without one fails in the store and gets no reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Value to store, only meaningful for `put`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Trace context for linking spans across contexts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_context: Option<TraceContext>,
}

impl Request {
    /// Creates a request for an arbitrary command string.
    ///
    /// Mostly useful for sending commands the worker does not understand.
    pub fn new(command: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            db_name: None,
            store_name: None,
            key: Some(key.into()),
            value: None,
            trace_context: TraceContext::from_current(),
        }
    }

    /// Parses the command, `None` when it is not one the worker handles.
    #[must_use]
    pub fn command(&self) -> Option<Command> {
        self.command.parse().ok()
    }
}

/// Generates typed constructors for each [`Command`].
macro_rules! request_builders {
    (
        $(
            $builder_name:ident($command:expr $(, $value:ident)?)
        ),* $(,)?
    ) => {
        impl Request {
            $(
                #[doc = concat!("Create a `", stringify!($builder_name), "` request with current trace context")]
                pub fn $builder_name(key: impl Into<String> $(, $value: Value)?) -> Self {
                    #[allow(unused_mut)]
                    let mut request = Self::new($command.as_str(), key);
                    $( request.value = Some($value); )?
                    request
                }
            )*
        }
    };
}

request_builders! {
    put(Command::Put, value),
    get(Command::Get),
    delete(Command::Delete),
}

/// The single message posted back for a handled request.
///
/// `result` is `None` for "undefined" (a `get` on a missing key) and is then
/// omitted from the JSON form. A stored JSON `null` is `Some(Value::Null)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Operation result: `true` for writes, the stored value for reads.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Response {
    /// `{result: true}`, the reply to a successful `put` or `delete`.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            result: Some(Value::Bool(true)),
        }
    }

    /// `{result: value}`, the reply to a `get`.
    #[must_use]
    pub const fn value(value: Option<Value>) -> Self {
        Self { result: value }
    }
}

/// An event delivered to the worker by its host.
///
/// This is the line protocol read by the `storeproxy` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    /// The worker has been installed.
    Install,

    /// The worker is being activated.
    Activate,

    /// A fetch the worker could intercept. Never handled.
    Fetch {
        /// Requested URL, informational only.
        #[serde(default)]
        url: Option<String>,
    },

    /// A storage request whose reply goes to `port`.
    Message {
        /// Identifier of the reply port transferred with the message.
        port: u64,

        /// Request payload.
        data: Request,
    },
}

/// Output written by the host on behalf of the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostOutput {
    /// A response posted on reply port `port`.
    Reply {
        /// Port the originating message was sent with.
        port: u64,

        /// Posted response.
        data: Response,
    },

    /// The action taken for a lifecycle event.
    Lifecycle {
        /// Action the worker performed.
        action: LifecycleAction,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_value_and_null_value_differ() {
        let missing: Request = serde_json::from_value(json!({"command": "put", "key": "k"})).unwrap();
        let null: Request =
            serde_json::from_value(json!({"command": "put", "key": "k", "value": null})).unwrap();

        assert_eq!(missing.value, None);
        assert_eq!(null.value, Some(Value::Null));
    }

    #[test]
    fn unknown_command_still_decodes() {
        let request: Request = serde_json::from_value(json!({"command": "clear"})).unwrap();
        assert_eq!(request.command(), None);
        assert_eq!(request.key, None);
    }

    #[test]
    fn missing_key_is_not_an_empty_key() {
        let missing: Request = serde_json::from_value(json!({"command": "put", "value": "x"})).unwrap();
        let empty: Request =
            serde_json::from_value(json!({"command": "put", "key": "", "value": "x"})).unwrap();

        assert_eq!(missing.key, None);
        assert_eq!(empty.key.as_deref(), Some(""));
    }

    #[test]
    fn builders_set_command_and_value() {
        let put = Request::put("a", json!("x"));
        assert_eq!(put.command(), Some(Command::Put));
        assert_eq!(put.value, Some(json!("x")));

        let get = Request::get("a");
        assert_eq!(get.command(), Some(Command::Get));
        assert_eq!(get.value, None);
    }

    #[test]
    fn request_serializes_camel_case_without_empty_fields() {
        let mut request = Request::delete("a");
        request.trace_context = None;
        request.db_name = Some("db".to_string());

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"command": "delete", "dbName": "db", "key": "a"})
        );
    }

    #[test]
    fn undefined_result_is_omitted() {
        assert_eq!(serde_json::to_string(&Response::value(None)).unwrap(), "{}");
        assert_eq!(
            serde_json::to_string(&Response::value(Some(Value::Null))).unwrap(),
            r#"{"result":null}"#
        );
        assert_eq!(serde_json::to_string(&Response::ok()).unwrap(), r#"{"result":true}"#);
    }

    #[test]
    fn null_result_round_trips_as_present() {
        let response: Response = serde_json::from_str(r#"{"result":null}"#).unwrap();
        assert_eq!(response.result, Some(Value::Null));

        let response: Response = serde_json::from_str("{}").unwrap();
        assert_eq!(response.result, None);
    }

    #[test]
    fn host_events_use_type_tag() {
        let event: HostEvent = serde_json::from_value(json!({
            "type": "message",
            "port": 7,
            "data": {"command": "get", "key": "a"}
        }))
        .unwrap();

        match event {
            HostEvent::Message { port, data } => {
                assert_eq!(port, 7);
                assert_eq!(data.command(), Some(Command::Get));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let install: HostEvent = serde_json::from_str(r#"{"type":"install"}"#).unwrap();
        assert_eq!(install, HostEvent::Install);
    }

    #[test]
    fn host_output_reply_shape() {
        let output = HostOutput::Reply {
            port: 3,
            data: Response::ok(),
        };
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({"type": "reply", "port": 3, "data": {"result": true}})
        );
    }
}
