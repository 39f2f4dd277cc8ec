use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use chattray_channel::{ChannelSender, Endpoint};
use chattray_protocol::constants::{LOGON_REQUEST, LOGON_RESPONSE, response_name};
use chattray_protocol::messages::{LogonRequest, RequestPayload};
use chattray_protocol::types::User;
use chattray_protocol::{Envelope, Method, RemoteError};

use crate::audio::{AudioSink, CallAudio};
use crate::sdk::{EventSink, SdkClient, SdkFactory};

type ClientSlot = Arc<Mutex<Option<Arc<dyn SdkClient>>>>;

/// Serves the session protocol on the execution side of a channel.
pub struct RemoteSessionClient {
    factory: Arc<dyn SdkFactory>,
    audio: Arc<CallAudio>,
    client: ClientSlot,
}

impl RemoteSessionClient {
    pub fn new(factory: Arc<dyn SdkFactory>, audio: Arc<dyn AudioSink>) -> Self {
        Self {
            factory,
            audio: Arc::new(CallAudio::new(audio)),
            client: Arc::new(Mutex::new(None)),
        }
    }

    /// Registers the logon and forwarded-call handlers on `endpoint`.
    pub fn serve(&self, endpoint: &Endpoint) {
        let router = endpoint.router();

        {
            let factory = self.factory.clone();
            let audio = self.audio.clone();
            let slot = self.client.clone();
            let sender = endpoint.sender();
            router.on(LOGON_REQUEST, move |payload| {
                let factory = factory.clone();
                let audio = audio.clone();
                let slot = slot.clone();
                let sender = sender.clone();
                tokio::spawn(async move {
                    let result = logon(factory.as_ref(), audio, &slot, &sender, &payload).await;
                    let response = match result {
                        Ok(user) => serde_json::to_value(user)
                            .map_err(|e| RemoteError::new(e.to_string())),
                        Err(e) => Err(e),
                    };
                    if let Err(e) = sender.send(LOGON_RESPONSE, Envelope::response_payload(response)) {
                        debug!("logon response not delivered: {e}");
                    }
                });
            });
        }

        for method in Method::ALL {
            let slot = self.client.clone();
            let sender = endpoint.sender();
            router.on(method.as_str(), move |payload| {
                let request = match RequestPayload::from_args(&payload) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(method = %method, "dropping request without id: {e}");
                        return;
                    }
                };
                let client = lock(&slot).clone();
                let sender = sender.clone();
                tokio::spawn(async move {
                    let result = match client {
                        Some(client) => invoke(client.as_ref(), method, &request.args).await,
                        None => Err(RemoteError::with_code("NO_SESSION", "not logged on")),
                    };
                    if let Err(e) = &result {
                        debug!(method = %method, id = request.id, "request failed: {e}");
                    }
                    let name = response_name(method, request.id);
                    if let Err(e) = sender.send(&name, Envelope::response_payload(result)) {
                        debug!(method = %method, id = request.id, "response not delivered: {e}");
                    }
                });
            });
        }
    }
}

fn lock(slot: &ClientSlot) -> MutexGuard<'_, Option<Arc<dyn SdkClient>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn logon(
    factory: &dyn SdkFactory,
    audio: Arc<CallAudio>,
    slot: &ClientSlot,
    sender: &ChannelSender,
    payload: &[Value],
) -> Result<User, RemoteError> {
    let request = LogonRequest::from_args(payload)
        .map_err(|e| RemoteError::with_code("INVALID_ARGUMENT", e.to_string()))?;

    let client = factory.create(&request.oauth, EventSink::new(sender.clone(), audio))?;
    *lock(slot) = Some(client.clone());

    let user = client.logon(&request.access_token).await?;
    info!(user = %user.user_id, domain = %request.oauth.domain, "session logged on");
    Ok(user)
}

/// Runs `method` with positional `args` against the client.
async fn invoke(
    client: &dyn SdkClient,
    method: Method,
    args: &[Value],
) -> Result<Value, RemoteError> {
    match method {
        Method::GetLoggedOnUser => reply(client.get_logged_on_user().await),
        Method::GetConversationsByIds => {
            reply(client.get_conversations_by_ids(arg(args, 0)?).await)
        }
        Method::GetConversationItems => reply(
            client
                .get_conversation_items(arg(args, 0)?, arg(args, 1)?)
                .await,
        ),
        Method::GetUsersById => reply(client.get_users_by_id(arg(args, 0)?).await),
        Method::GetUserById => reply(client.get_user_by_id(arg(args, 0)?).await),
        Method::GetFavoriteConversationIds => {
            reply(client.get_favorite_conversation_ids().await)
        }
        Method::GetPresence => reply(client.get_presence(arg(args, 0)?).await),
        Method::SubscribePresence => reply(client.subscribe_presence(arg(args, 0)?).await),
        Method::GetConversationById => reply(client.get_conversation_by_id(arg(args, 0)?).await),
        Method::AddTextItem => reply(client.add_text_item(arg(args, 0)?, arg(args, 1)?).await),
        Method::MakeCall => reply(client.make_call(arg(args, 0)?).await),
        Method::EndCall => reply(client.end_call(arg(args, 0)?).await),
        Method::Logout => reply(client.logout().await),
    }
}

/// Decodes positional argument `index`; a missing argument reads as null.
fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> Result<T, RemoteError> {
    T::deserialize(args.get(index).unwrap_or(&Value::Null)).map_err(|e| {
        RemoteError::with_code("INVALID_ARGUMENT", format!("argument {index}: {e}"))
    })
}

fn reply<T: Serialize>(result: Result<T, RemoteError>) -> Result<Value, RemoteError> {
    result.and_then(|value| serde_json::to_value(value).map_err(|e| RemoteError::new(e.to_string())))
}
