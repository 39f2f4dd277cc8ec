//! Channel endpoints and their transports.

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;

use chattray_protocol::Envelope;

use crate::MAX_LINE_LENGTH;
use crate::error::ChannelError;
use crate::router::Router;

/// Cloneable fire-and-forget sending half of an endpoint.
#[derive(Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<Envelope>,
    closed: CancellationToken,
}

impl ChannelSender {
    /// Queues `name(payload...)` for delivery to the peer.
    pub fn send(&self, name: &str, payload: Vec<Value>) -> Result<(), ChannelError> {
        if self.closed.is_cancelled() {
            return Err(ChannelError::Closed);
        }
        self.tx
            .send(Envelope::new(name, payload))
            .map_err(|_| ChannelError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// One side of a message link.
///
/// Dropping the endpoint closes the link.
pub struct Endpoint {
    sender: ChannelSender,
    router: Router,
    closed: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Creates two linked in-process endpoints.
///
/// Closing either side closes both, the way destroying the execution
/// window takes the whole link down.
pub fn pair() -> (Endpoint, Endpoint) {
    let link = CancellationToken::new();
    let (to_a, a_inbox) = mpsc::unbounded_channel();
    let (to_b, b_inbox) = mpsc::unbounded_channel();
    let a = Endpoint::from_parts(to_b, a_inbox, link.clone(), Router::new(), Vec::new());
    let b = Endpoint::from_parts(to_a, b_inbox, link, Router::new(), Vec::new());
    (a, b)
}

impl Endpoint {
    /// Runs the channel over a byte stream pair, one JSON envelope per line.
    pub fn over_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::over_io_with_router(reader, writer, Router::new())
    }

    /// Like [`Endpoint::over_io`], dispatching into a router whose
    /// listeners were registered before the first line can arrive.
    pub fn over_io_with_router<R, W>(reader: R, writer: W, router: Router) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let closed = CancellationToken::new();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let read = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let write = FramedWrite::new(writer, LinesCodec::new());

        let read_handle = tokio::spawn(crate::pumps::read::read_pump(
            read,
            in_tx,
            closed.clone(),
        ));
        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            write,
            out_rx,
            closed.clone(),
        ));

        Self::from_parts(out_tx, in_rx, closed, router, vec![read_handle, write_handle])
    }

    fn from_parts(
        tx: mpsc::UnboundedSender<Envelope>,
        inbox: mpsc::UnboundedReceiver<Envelope>,
        closed: CancellationToken,
        router: Router,
        mut tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        tasks.push(tokio::spawn(crate::pumps::dispatch::dispatch_pump(
            inbox,
            router.clone(),
            closed.clone(),
        )));
        Self {
            sender: ChannelSender {
                tx,
                closed: closed.clone(),
            },
            router,
            closed,
            tasks,
        }
    }

    /// Queues `name(payload...)` for delivery to the peer.
    pub fn send(&self, name: &str, payload: Vec<Value>) -> Result<(), ChannelError> {
        self.sender.send(name, payload)
    }

    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Token cancelled when the link goes down, from either side.
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the link is down.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Takes the link down and releases every listener on this side.
    pub fn close(&self) {
        self.closed.cancel();
        self.router.close();
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
        for task in &self.tasks {
            task.abort();
        }
    }
}
