use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use chattray_protocol::messages::CallEvent;

/// `callStatus` reason announcing a new remote media stream.
pub const REMOTE_STREAM_UPDATED: &str = "remoteStreamUpdated";

/// Local playback of a call's remote audio.
pub trait AudioSink: Send + Sync {
    /// Plays `stream`, the opaque `call.remoteAudioStream` handle.
    fn attach(&self, call_id: &str, stream: &Value);
}

/// Discards audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn attach(&self, call_id: &str, _stream: &Value) {
        debug!(call_id, "no audio sink, dropping remote stream");
    }
}

/// Follows one call at a time and routes its remote stream to the sink.
pub(crate) struct CallAudio {
    sink: Arc<dyn AudioSink>,
    call_id: Mutex<Option<String>>,
}

impl CallAudio {
    pub(crate) fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            call_id: Mutex::new(None),
        }
    }

    pub(crate) fn on_call_status(&self, payload: &Value) {
        let event = match CallEvent::deserialize(payload) {
            Ok(event) => event,
            Err(e) => {
                debug!("callStatus without call: {e}");
                return;
            }
        };

        let mut current = self.call_id.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_deref().is_some_and(|id| id != event.call.call_id) {
            return;
        }
        *current = Some(event.call.call_id.clone());
        drop(current);

        let stream = payload.pointer("/call/remoteAudioStream");
        if let (Some(REMOTE_STREAM_UPDATED), Some(stream)) = (event.reason.as_deref(), stream) {
            self.sink.attach(&event.call.call_id, stream);
        }
    }

    pub(crate) fn on_call_ended(&self, payload: &Value) {
        let ended = payload.pointer("/call/callId").and_then(Value::as_str);
        let mut current = self.call_id.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_some() && current.as_deref() == ended {
            *current = None;
        }
    }
}
