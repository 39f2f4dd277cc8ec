//! Dispatch pump: routes inbound envelopes to the router in order.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use chattray_protocol::Envelope;

use crate::router::Router;

/// Delivers inbound envelopes one at a time until the link closes.
///
/// On exit the link is marked closed and the router released, so pending
/// one-shot listeners observe the closure.
pub(crate) async fn dispatch_pump(
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
    router: Router,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = inbox.recv() => {
                match msg {
                    Some(env) => {
                        if !router.dispatch(&env.name, env.payload) {
                            trace!(name = %env.name, "no listener for message");
                        }
                    }
                    None => break,
                }
            }
        }
    }

    cancel.cancel();
    router.close();
}
