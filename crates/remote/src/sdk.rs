//! The SDK seam.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::Value;
use tracing::trace;

use chattray_channel::{ChannelError, ChannelSender};
use chattray_protocol::types::{
    Call, Conversation, Item, ItemsOptions, OAuthConfig, Presence, User,
};
use chattray_protocol::{EventKind, RemoteError};

use crate::audio::CallAudio;

/// A boxed future returned by SDK operations.
pub type SdkFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// The real session client, one per logon.
///
/// One method per forwardable operation. The two batch lookups default
/// to fanning out over the single-item calls.
pub trait SdkClient: Send + Sync {
    fn logon(&self, access_token: &str) -> SdkFuture<'_, User>;
    fn logout(&self) -> SdkFuture<'_, ()>;
    fn get_logged_on_user(&self) -> SdkFuture<'_, User>;

    fn get_conversations_by_ids(&self, conv_ids: Vec<String>) -> SdkFuture<'_, Vec<Conversation>> {
        Box::pin(async move {
            try_join_all(conv_ids.into_iter().map(|id| self.get_conversation_by_id(id))).await
        })
    }

    fn get_conversation_items(
        &self,
        conv_id: String,
        options: Option<ItemsOptions>,
    ) -> SdkFuture<'_, Vec<Item>>;

    fn get_users_by_id(&self, user_ids: Vec<String>) -> SdkFuture<'_, Vec<User>> {
        Box::pin(async move {
            try_join_all(user_ids.into_iter().map(|id| self.get_user_by_id(id))).await
        })
    }

    fn get_user_by_id(&self, user_id: String) -> SdkFuture<'_, User>;
    fn get_favorite_conversation_ids(&self) -> SdkFuture<'_, Vec<String>>;
    fn get_presence(&self, user_ids: Vec<String>) -> SdkFuture<'_, Vec<Presence>>;
    fn subscribe_presence(&self, user_ids: Vec<String>) -> SdkFuture<'_, ()>;
    fn get_conversation_by_id(&self, conv_id: String) -> SdkFuture<'_, Conversation>;
    fn add_text_item(&self, conv_id: String, content: String) -> SdkFuture<'_, Item>;
    fn make_call(&self, user_id: String) -> SdkFuture<'_, Call>;
    fn end_call(&self, call_id: String) -> SdkFuture<'_, ()>;
}

/// Builds SDK clients for a logon instruction.
pub trait SdkFactory: Send + Sync {
    /// Creates a client for `config`. The client reports every event of
    /// the forwarded set to `events`.
    fn create(
        &self,
        config: &OAuthConfig,
        events: EventSink,
    ) -> Result<Arc<dyn SdkClient>, RemoteError>;
}

/// Where the SDK client reports its events.
///
/// Payloads are relayed unchanged. Call-status events also feed the
/// local audio routing first.
#[derive(Clone)]
pub struct EventSink {
    sender: ChannelSender,
    audio: Arc<CallAudio>,
}

impl EventSink {
    pub(crate) fn new(sender: ChannelSender, audio: Arc<CallAudio>) -> Self {
        Self { sender, audio }
    }

    pub fn emit(&self, kind: EventKind, payload: Value) -> Result<(), ChannelError> {
        match kind {
            EventKind::CallStatus => self.audio.on_call_status(&payload),
            EventKind::CallEnded => self.audio.on_call_ended(&payload),
            _ => {}
        }
        trace!(event = %kind, "relaying event");
        self.sender.send(kind.as_str(), vec![payload])
    }
}
