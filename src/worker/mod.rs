//! Background storage proxy worker.
//!
//! The worker receives request messages, runs each against the persistent
//! store and posts the result back on the reply port that came with the
//! message. Callers never touch storage directly.
//!
//! # Architecture
//!
//! - `messages`: Request/response and host line-protocol types, with trace context propagation
//! - `port`: One-shot reply ports
//! - `lifecycle`: Install/activate/fetch handling
//! - `handler`: Worker implementation and message processing logic
//! - `runtime`: Task-per-message dispatch loop

pub mod handler;
pub mod lifecycle;
pub mod messages;
pub mod port;
pub mod runtime;

pub use handler::{MessageEvent, StorageProxyWorker};
pub use lifecycle::{Lifecycle, LifecycleAction, LifecyclePhase};
pub use messages::{HostEvent, HostOutput, Request, Response, TraceContext};
pub use port::{ChannelPort, OneshotPort, ReplyPort};
pub use runtime::{WorkerHandle, WorkerRuntime};
