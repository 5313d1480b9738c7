//! Reply ports: the one-shot channels a caller transfers with each message.

use crate::domain::error::{ProxyError, Result};
use crate::worker::messages::{HostOutput, Response};
use tokio::sync::{mpsc, oneshot};

/// A one-shot handle for delivering the response to a single request.
///
/// Posting consumes the port, so at most one response can be sent through it.
pub trait ReplyPort: Send {
    /// Posts `response` to whoever holds the other end.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ChannelClosed`] if the receiving side is gone.
    fn post_message(self: Box<Self>, response: Response) -> Result<()>;
}

/// Reply port backed by a tokio oneshot channel, for in-process callers.
#[derive(Debug)]
pub struct OneshotPort {
    sender: oneshot::Sender<Response>,
}

impl OneshotPort {
    /// Creates a port and the receiver its response arrives on.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<Response>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }
}

impl ReplyPort for OneshotPort {
    fn post_message(self: Box<Self>, response: Response) -> Result<()> {
        self.sender
            .send(response)
            .map_err(|_| ProxyError::ChannelClosed)
    }
}

/// Reply port that tags responses with a numeric port id and forwards them to
/// a shared output stream, as the line-protocol host does.
#[derive(Debug, Clone)]
pub struct ChannelPort {
    id: u64,
    output: mpsc::UnboundedSender<HostOutput>,
}

impl ChannelPort {
    /// Creates port `id` writing to `output`.
    #[must_use]
    pub const fn new(id: u64, output: mpsc::UnboundedSender<HostOutput>) -> Self {
        Self { id, output }
    }
}

impl ReplyPort for ChannelPort {
    fn post_message(self: Box<Self>, response: Response) -> Result<()> {
        self.output
            .send(HostOutput::Reply {
                port: self.id,
                data: response,
            })
            .map_err(|_| ProxyError::ChannelClosed)
    }
}
