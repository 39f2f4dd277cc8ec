//! Execution-process side of the session.
//!
//! [`RemoteSessionClient`] owns the real SDK client (behind the
//! [`SdkClient`] seam). It answers the logon instruction, executes
//! forwarded calls and relays SDK events back over the channel.
//! [`run_stdio`] is the entry point of the execution process.

mod audio;
mod client;
mod sdk;

pub use audio::{AudioSink, NullAudio};
pub use client::RemoteSessionClient;
pub use sdk::{EventSink, SdkClient, SdkFactory, SdkFuture};

use std::sync::Arc;

use tracing::info;

use chattray_channel::{ChannelError, Endpoint};
use chattray_protocol::constants::READY;

/// Serves the session over this process's stdin/stdout until the control
/// process goes away.
pub async fn run_stdio(
    factory: Arc<dyn SdkFactory>,
    audio: Arc<dyn AudioSink>,
) -> Result<(), ChannelError> {
    let endpoint = Endpoint::over_io(tokio::io::stdin(), tokio::io::stdout());
    let client = RemoteSessionClient::new(factory, audio);
    client.serve(&endpoint);
    endpoint.send(READY, Vec::new())?;
    info!("execution side ready");
    endpoint.closed().await;
    info!("control process disconnected");
    Ok(())
}
