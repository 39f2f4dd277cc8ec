//! Request/response correlation over the message channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use chattray_channel::{ChannelSender, Endpoint, ListenerId, Router};
use chattray_protocol::constants::{REQUEST_ID_MAX, REQUEST_ID_MIN, response_name};
use chattray_protocol::messages::RequestPayload;
use chattray_protocol::{Envelope, Method};

use crate::error::ProxyError;

/// Turns fire-and-forget messages into calls with a single outcome.
///
/// Ids come from a counter seeded at a random point of the id range, so
/// two calls on the same correlator never share an id.
pub struct Correlator {
    sender: ChannelSender,
    router: Router,
    timeout: Duration,
    next_id: AtomicU64,
}

/// Removes the one-shot response listener however the call ends.
struct PendingResponse {
    router: Router,
    listener: ListenerId,
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.router.remove(self.listener);
    }
}

impl Correlator {
    pub fn new(endpoint: &Endpoint, timeout: Duration) -> Self {
        let first = rand::thread_rng().gen_range(REQUEST_ID_MIN..=REQUEST_ID_MAX);
        Self::with_first_id(endpoint, timeout, first)
    }

    fn with_first_id(endpoint: &Endpoint, timeout: Duration, first: u64) -> Self {
        Self {
            sender: endpoint.sender(),
            router: endpoint.router().clone(),
            timeout,
            next_id: AtomicU64::new(first),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `method({id, args})` and waits for `{method}-{id}-response`.
    ///
    /// Exactly one outcome is produced: the result, the remote error, a
    /// timeout, or [`ProxyError::SessionAbort`] when the link closes first.
    /// A response arriving after the timeout finds no listener.
    pub async fn call(&self, method: Method, args: Vec<Value>) -> Result<Value, ProxyError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::to_value(RequestPayload { id, args })?;

        let (tx, rx) = oneshot::channel();
        let _pending = PendingResponse {
            router: self.router.clone(),
            listener: self.router.once(response_name(method, id), move |payload| {
                let _ = tx.send(payload);
            }),
        };

        self.sender.send(method.as_str(), vec![request])?;
        trace!(method = %method, id, "request sent");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(payload)) => {
                trace!(method = %method, id, "response received");
                Envelope::parse_response(payload).map_err(|error| ProxyError::Remote { method, error })
            }
            Ok(Err(_)) => Err(ProxyError::SessionAbort),
            Err(_) => {
                debug!(method = %method, id, "request timed out");
                Err(ProxyError::Timeout { method, id })
            }
        }
    }
}
