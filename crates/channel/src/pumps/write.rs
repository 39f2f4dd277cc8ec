//! Stream write pump: serialises outbound envelopes as JSON lines.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_util::codec::LinesCodecError;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use chattray_protocol::Envelope;

/// Writes queued envelopes to the peer until the link closes.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut outbox: mpsc::UnboundedReceiver<Envelope>,
    cancel: CancellationToken,
) where
    S: SinkExt<String, Error = LinesCodecError> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = outbox.recv() => {
                let Some(env) = msg else { break };
                let line = match serde_json::to_string(&env) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(name = %env.name, "failed to encode message: {e}");
                        continue;
                    }
                };
                if let Err(e) = write.send(line).await {
                    error!("channel write error: {e}");
                    break;
                }
            }
        }
    }

    let _ = write.close().await;
    cancel.cancel();
}
