//! Stream read pump: decodes newline-delimited envelopes.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::codec::LinesCodecError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use chattray_protocol::Envelope;

/// Reads lines from the peer, parses them and queues them for dispatch.
///
/// Malformed lines are dropped. End of stream or a read error closes the
/// link.
pub(crate) async fn read_pump<S>(
    mut read: S,
    inbox: mpsc::UnboundedSender<Envelope>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<String, LinesCodecError>> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = read.next() => {
                match line {
                    Some(Ok(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Envelope>(&line) {
                            Ok(env) => {
                                trace!(name = %env.name, "received message");
                                if inbox.send(env).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("failed to parse message: {e}"),
                        }
                    }
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!("message too large, dropping");
                    }
                    Some(Err(e)) => {
                        warn!("channel read error: {e}");
                        break;
                    }
                    None => {
                        debug!("channel stream ended");
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
}
