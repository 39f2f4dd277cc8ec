//! The session proxy: logon recovery, forwarded calls and event fan-out.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use chattray_channel::Router;
use chattray_oauth::TokenProvider;
use chattray_protocol::constants::{LOGON_REQUEST, LOGON_RESPONSE, LOGON_TIMEOUT, REQUEST_TIMEOUT};
use chattray_protocol::messages::{ConnectionStateChangedEvent, LogonRequest};
use chattray_protocol::types::{
    Call, ConnectionState, Conversation, Item, ItemsOptions, OAuthConfig, Presence, User,
};
use chattray_protocol::{Envelope, EventKind, ForwardedEvent, Method};

use crate::correlator::Correlator;
use crate::error::ProxyError;
use crate::events::{EventBus, ProxyEvent};
use crate::host::{ExecutionHost, ExecutionWindow};
use crate::session::Session;

/// Backoff between logon attempts.
///
/// Retries are unbounded by default: a token that keeps going stale while
/// the user never finishes signing in keeps the sign-in prompt coming
/// back. Set `max_attempts` to give up instead.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Multiplier for each subsequent retry.
    pub backoff_factor: f64,
    /// Total logon attempts before the last error is surfaced.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based), with ±25% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let offset: f64 = rand::thread_rng().gen_range(-1.0..1.0);
        Duration::from_secs_f64((capped + capped * 0.25 * offset).max(0.05))
    }

    /// Whether another attempt may follow `attempts` failed ones.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Sent to the execution side with every logon instruction.
    pub oauth: OAuthConfig,
    pub request_timeout: Duration,
    pub logon_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ProxyConfig {
    pub fn new(oauth: OAuthConfig) -> Self {
        Self {
            oauth,
            request_timeout: REQUEST_TIMEOUT,
            logon_timeout: LOGON_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

struct ActiveWindow {
    generation: u64,
    window: ExecutionWindow,
    correlator: Arc<Correlator>,
}

type ActiveSlot = Arc<Mutex<Option<ActiveWindow>>>;

fn lock_slot(slot: &Mutex<Option<ActiveWindow>>) -> MutexGuard<'_, Option<ActiveWindow>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resets the mirror after its window went away and tells subscribers,
/// unless it already was disconnected.
fn mark_disconnected(session: &RwLock<Session>, events: &EventBus) {
    let previous = {
        let mut session = session.write().unwrap_or_else(PoisonError::into_inner);
        let previous = session.state();
        session.clear();
        previous
    };
    if previous == ConnectionState::Disconnected {
        return;
    }
    debug!(previous = previous.as_str(), "session mirror disconnected");
    let body = ConnectionStateChangedEvent {
        state: ConnectionState::Disconnected,
    };
    match serde_json::to_value(body) {
        Ok(body) => {
            events.emit(&ProxyEvent::Forwarded(ForwardedEvent::new(
                EventKind::ConnectionStateChanged,
                body,
            )));
        }
        Err(e) => warn!("failed to encode connection state: {e}"),
    }
}

/// Local stand-in for the remote session.
///
/// Owns at most one execution window. Every logon destroys the previous
/// window first, and a logon that was overtaken by a newer one fails with
/// [`ProxyError::SessionAbort`] instead of installing its window.
pub struct SessionProxy {
    config: ProxyConfig,
    host: Arc<dyn ExecutionHost>,
    tokens: Arc<dyn TokenProvider>,
    session: Arc<RwLock<Session>>,
    events: EventBus,
    active: ActiveSlot,
    generation: AtomicU64,
}

impl SessionProxy {
    pub fn new(
        config: ProxyConfig,
        host: Arc<dyn ExecutionHost>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            config,
            host,
            tokens,
            session: Arc::new(RwLock::new(Session::default())),
            events: EventBus::new(),
            active: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Snapshot of the session mirror.
    pub fn session(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn logged_on_user(&self) -> Option<User> {
        self.session().logged_on_user().cloned()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session().state()
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveWindow>> {
        lock_slot(&self.active)
    }

    fn correlator(&self) -> Option<Arc<Correlator>> {
        self.active().as_ref().map(|a| a.correlator.clone())
    }

    fn update_session(&self, f: impl FnOnce(&mut Session)) {
        f(&mut self.session.write().unwrap_or_else(PoisonError::into_inner));
    }

    // -----------------------------------------------------------------------
    // Logon
    // -----------------------------------------------------------------------

    /// Logs on, retrying with a fresh token until it succeeds.
    ///
    /// The loop ends on success, when the user dismisses the sign-in,
    /// when the window is destroyed underneath it, or when the retry
    /// policy runs out of attempts.
    pub async fn logon(&self) -> Result<User, ProxyError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match self.logon_once().await {
                Ok(user) => return Ok(user),
                Err(e) if !e.is_retryable_logon_failure() => return Err(e),
                Err(e) => e,
            };

            // A token that cannot be cleared would be handed out again.
            self.tokens.clear_token()?;
            self.update_session(Session::clear);

            if !self.config.retry.allows_retry(attempt) {
                return Err(err);
            }
            let delay = self.config.retry.delay_for_attempt(attempt);
            warn!(
                attempt,
                "logon failed, retrying in {:.1}s: {err}",
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn logon_once(&self) -> Result<User, ProxyError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match self.attempt_logon(generation).await {
            // An overtaken logon must not start another round.
            Err(e) if e.is_retryable_logon_failure() && self.superseded(generation) => {
                debug!(generation, "logon overtaken after failure: {e}");
                Err(ProxyError::SessionAbort)
            }
            result => result,
        }
    }

    async fn attempt_logon(&self, generation: u64) -> Result<User, ProxyError> {
        self.destroy_window();

        let token = self.tokens.get_token().await?;
        if self.superseded(generation) {
            return Err(ProxyError::SessionAbort);
        }

        let window = self.host.open().await?;
        let endpoint = window.endpoint();
        self.forward_events(endpoint.router());

        let (tx, rx) = oneshot::channel();
        endpoint.router().once(LOGON_RESPONSE, move |payload| {
            let _ = tx.send(payload);
        });
        let request = LogonRequest {
            oauth: self.config.oauth.clone(),
            access_token: token.clone(),
        };
        endpoint.send(LOGON_REQUEST, request.to_args()?)?;
        debug!(generation, "logon request sent");

        let correlator = Arc::new(Correlator::new(endpoint, self.config.request_timeout));
        self.install(
            generation,
            ActiveWindow {
                generation,
                window,
                correlator,
            },
        )?;

        let payload = match tokio::time::timeout(self.config.logon_timeout, rx).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(_)) => return Err(ProxyError::SessionAbort),
            Err(_) => return Err(ProxyError::LogonTimeout),
        };
        let user: User = match Envelope::parse_response(payload) {
            Ok(value) => serde_json::from_value(value)?,
            Err(error) => return Err(ProxyError::LogonRejected(error)),
        };

        if self.superseded(generation) {
            return Err(ProxyError::SessionAbort);
        }
        self.update_session(|s| s.logged_on(token, user.clone()));
        info!(user = %user.user_id, "logged on");
        self.events.emit(&ProxyEvent::UserLoggedOn(user.clone()));
        Ok(user)
    }

    fn superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn install(&self, generation: u64, active: ActiveWindow) -> Result<(), ProxyError> {
        let mut slot = self.active();
        if self.superseded(generation) {
            drop(slot);
            active.window.destroy();
            return Err(ProxyError::SessionAbort);
        }
        self.watch_close(&active);
        if let Some(previous) = slot.replace(active) {
            previous.window.destroy();
        }
        Ok(())
    }

    /// Drops the installed window once the platform closes it.
    ///
    /// Windows the proxy destroys itself are taken out of the slot first,
    /// so the watcher finds nothing to do for them.
    fn watch_close(&self, active: &ActiveWindow) {
        let closed = active.window.endpoint().close_token();
        let generation = active.generation;
        let slot = self.active.clone();
        let session = self.session.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            closed.cancelled().await;
            let gone = {
                let mut slot = lock_slot(&slot);
                match slot.as_ref() {
                    Some(a) if a.generation == generation => slot.take(),
                    _ => None,
                }
            };
            if let Some(gone) = gone {
                info!(generation, "execution window closed");
                gone.window.destroy();
                mark_disconnected(&session, &events);
            }
        });
    }

    /// Destroys the current window and resets the mirror.
    fn destroy_window(&self) {
        let previous = self.active().take();
        if let Some(previous) = previous {
            debug!("destroying previous execution window");
            previous.window.destroy();
        }
        mark_disconnected(&self.session, &self.events);
    }

    /// Mirrors remote events onto the local bus for the lifetime of one
    /// window's router.
    fn forward_events(&self, router: &Router) {
        for kind in EventKind::ALL {
            let session = self.session.clone();
            let events = self.events.clone();
            router.on(kind.as_str(), move |payload| {
                let body = payload.into_iter().next().unwrap_or(Value::Null);
                let event = ForwardedEvent::new(kind, body);
                if kind == EventKind::ConnectionStateChanged {
                    match event.parse::<ConnectionStateChangedEvent>() {
                        Ok(change) => {
                            debug!(state = change.state.as_str(), "connection state changed");
                            session
                                .write()
                                .unwrap_or_else(PoisonError::into_inner)
                                .apply_state(change.state);
                        }
                        Err(e) => warn!("malformed {kind} event: {e}"),
                    }
                }
                events.emit(&ProxyEvent::Forwarded(event));
            });
        }
    }

    /// Clears the local session and token, then forwards `logout`.
    ///
    /// The local state is gone by the time this returns, and a logon
    /// still in flight is overtaken. The returned future tracks the remote
    /// call, then reports a token that could not be cleared.
    pub fn logout(&self) -> impl Future<Output = Result<(), ProxyError>> + Send + 'static {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.update_session(Session::clear);
        let cleared = self.tokens.clear_token();
        let correlator = self.correlator();
        async move {
            if let Some(c) = correlator {
                c.call(Method::Logout, Vec::new()).await?;
            }
            cleared.map_err(ProxyError::from)
        }
    }

    /// Destroys the execution window.
    pub fn shutdown(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.destroy_window();
    }

    // -----------------------------------------------------------------------
    // Forwarded operations
    // -----------------------------------------------------------------------

    /// Forwards a whitelisted call with raw arguments.
    pub async fn call(&self, method: Method, args: Vec<Value>) -> Result<Value, ProxyError> {
        let correlator = self.correlator().ok_or(ProxyError::NoSession)?;
        correlator.call(method, args).await
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        method: Method,
        args: Vec<Value>,
    ) -> Result<T, ProxyError> {
        let value = self.call(method, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_logged_on_user(&self) -> Result<User, ProxyError> {
        self.invoke(Method::GetLoggedOnUser, Vec::new()).await
    }

    pub async fn get_conversations_by_ids(
        &self,
        conv_ids: &[String],
    ) -> Result<Vec<Conversation>, ProxyError> {
        self.invoke(Method::GetConversationsByIds, vec![Value::from(conv_ids)])
            .await
    }

    pub async fn get_conversation_items(
        &self,
        conv_id: &str,
        options: Option<ItemsOptions>,
    ) -> Result<Vec<Item>, ProxyError> {
        let mut args = vec![Value::from(conv_id)];
        if let Some(options) = options {
            args.push(serde_json::to_value(options)?);
        }
        self.invoke(Method::GetConversationItems, args).await
    }

    pub async fn get_users_by_id(&self, user_ids: &[String]) -> Result<Vec<User>, ProxyError> {
        self.invoke(Method::GetUsersById, vec![Value::from(user_ids)])
            .await
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<User, ProxyError> {
        self.invoke(Method::GetUserById, vec![Value::from(user_id)])
            .await
    }

    pub async fn get_favorite_conversation_ids(&self) -> Result<Vec<String>, ProxyError> {
        self.invoke(Method::GetFavoriteConversationIds, Vec::new())
            .await
    }

    pub async fn get_presence(&self, user_ids: &[String]) -> Result<Vec<Presence>, ProxyError> {
        self.invoke(Method::GetPresence, vec![Value::from(user_ids)])
            .await
    }

    pub async fn subscribe_presence(&self, user_ids: &[String]) -> Result<(), ProxyError> {
        self.call(Method::SubscribePresence, vec![Value::from(user_ids)])
            .await
            .map(|_| ())
    }

    pub async fn get_conversation_by_id(&self, conv_id: &str) -> Result<Conversation, ProxyError> {
        self.invoke(Method::GetConversationById, vec![Value::from(conv_id)])
            .await
    }

    pub async fn add_text_item(&self, conv_id: &str, content: &str) -> Result<Item, ProxyError> {
        self.invoke(
            Method::AddTextItem,
            vec![Value::from(conv_id), Value::from(content)],
        )
        .await
    }

    pub async fn make_call(&self, user_id: &str) -> Result<Call, ProxyError> {
        self.invoke(Method::MakeCall, vec![Value::from(user_id)])
            .await
    }

    pub async fn end_call(&self, call_id: &str) -> Result<(), ProxyError> {
        self.call(Method::EndCall, vec![Value::from(call_id)])
            .await
            .map(|_| ())
    }
}

impl Drop for SessionProxy {
    fn drop(&mut self) {
        self.destroy_window();
    }
}
