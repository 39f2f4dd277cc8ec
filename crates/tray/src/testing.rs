//! Fakes shared by the manager and controller tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use chattray_channel::{Endpoint, pair};
use chattray_oauth::{OAuthError, OAuthFuture, TokenProvider};
use chattray_protocol::constants::{LOGON_REQUEST, LOGON_RESPONSE, response_name};
use chattray_protocol::messages::RequestPayload;
use chattray_protocol::types::{OAuthConfig, PresenceState, User};
use chattray_protocol::{Envelope, EventKind, ForwardedEvent, Method, RemoteError};
use chattray_session::{
    ExecutionHost, ExecutionWindow, HostFuture, ProxyConfig, SessionProxy,
};
use chattray_settings::Settings;

use crate::item::{IconState, TrayItem};
use crate::manager::{TrayHandle, TrayManager, TrayPresenter, Window};
use crate::menu::MenuState;

pub(crate) fn oauth(domain: &str) -> OAuthConfig {
    OAuthConfig {
        domain: domain.into(),
        client_id: "client".into(),
        client_secret: String::new(),
        redirect_uri: "http://localhost:7100/oauth".into(),
        scope: None,
    }
}

fn me() -> User {
    User {
        user_id: "me".into(),
        display_name: "Me".into(),
        avatar: None,
    }
}

type Responses = Arc<Mutex<HashMap<Method, Result<Value, RemoteError>>>>;

/// In-process execution side: accepts every logon as `me` and answers
/// forwarded calls from a response table (`null` when unset).
#[derive(Default)]
pub(crate) struct FakeHost {
    responses: Responses,
    calls: Arc<Mutex<Vec<(Method, Vec<Value>)>>>,
    logons: Arc<AtomicUsize>,
    links: Mutex<Vec<Endpoint>>,
}

impl FakeHost {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, method: Method, value: Value) {
        self.responses.lock().unwrap().insert(method, Ok(value));
    }

    pub(crate) fn fail(&self, method: Method) {
        self.responses
            .lock()
            .unwrap()
            .insert(method, Err(RemoteError::new("boom")));
    }

    pub(crate) fn calls(&self) -> Vec<(Method, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn logons(&self) -> usize {
        self.logons.load(Ordering::SeqCst)
    }

    /// Emits an event from the newest execution window.
    pub(crate) fn emit(&self, kind: EventKind, body: Value) {
        let links = self.links.lock().unwrap();
        links.last().unwrap().send(kind.as_str(), vec![body]).unwrap();
    }

    /// Takes the newest execution window down from the execution side.
    pub(crate) fn close_window(&self) {
        self.links.lock().unwrap().last().unwrap().close();
    }
}

impl ExecutionHost for FakeHost {
    fn open(&self) -> HostFuture<'_, ExecutionWindow> {
        let (control, exec) = pair();

        let sender = exec.sender();
        let logons = self.logons.clone();
        exec.router().once(LOGON_REQUEST, move |_| {
            logons.fetch_add(1, Ordering::SeqCst);
            let user = serde_json::to_value(me()).unwrap();
            let _ = sender.send(LOGON_RESPONSE, Envelope::response_payload(Ok(user)));
        });

        for method in Method::ALL {
            let sender = exec.sender();
            let responses = self.responses.clone();
            let calls = self.calls.clone();
            exec.router().on(method.as_str(), move |payload| {
                let req = RequestPayload::from_args(&payload).unwrap();
                calls.lock().unwrap().push((method, req.args));
                let response = responses
                    .lock()
                    .unwrap()
                    .get(&method)
                    .cloned()
                    .unwrap_or(Ok(Value::Null));
                let _ = sender.send(
                    &response_name(method, req.id),
                    Envelope::response_payload(response),
                );
            });
        }

        self.links.lock().unwrap().push(exec);
        Box::pin(async move { Ok(ExecutionWindow::new(control)) })
    }
}

struct FakeTokens;

impl TokenProvider for FakeTokens {
    fn get_token(&self) -> OAuthFuture<'_, String> {
        Box::pin(async { Ok("token".to_string()) })
    }

    fn clear_token(&self) -> Result<(), OAuthError> {
        Ok(())
    }
}

pub(crate) fn proxy_for(host: Arc<FakeHost>, oauth: OAuthConfig) -> Arc<SessionProxy> {
    Arc::new(SessionProxy::new(
        ProxyConfig::new(oauth),
        host,
        Arc::new(FakeTokens),
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Shown {
    Main(MenuState),
    Add(String),
    Update(String, IconState),
    Remove(String),
    Forward(String, EventKind),
    Open(String),
    Window(Window),
    Quit,
}

#[derive(Default)]
pub(crate) struct RecordingPresenter {
    shown: Mutex<Vec<Shown>>,
    created: Mutex<Vec<(String, PresenceState)>>,
}

impl RecordingPresenter {
    fn record(&self, shown: Shown) {
        self.shown.lock().unwrap().push(shown);
    }

    pub(crate) fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    pub(crate) fn added(&self) -> Vec<String> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Add(conv_id) => Some(conv_id),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn removed(&self) -> Vec<String> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Remove(conv_id) => Some(conv_id),
                _ => None,
            })
            .collect()
    }

    /// Presence of every created item at the time it was created.
    pub(crate) fn presence_at_creation(&self) -> Vec<(String, PresenceState)> {
        self.created.lock().unwrap().clone()
    }
}

impl TrayPresenter for RecordingPresenter {
    fn show_main(&self, menu: &MenuState) {
        self.record(Shown::Main(*menu));
    }

    fn add_item(&self, item: &TrayItem, local_user_id: &str) {
        assert_eq!(local_user_id, "me");
        self.created
            .lock()
            .unwrap()
            .push((item.conv_id().to_string(), item.presence()));
        self.record(Shown::Add(item.conv_id().to_string()));
    }

    fn update_item(&self, item: &TrayItem) {
        self.record(Shown::Update(item.conv_id().to_string(), item.icon_state()));
    }

    fn remove_item(&self, conv_id: &str) {
        self.record(Shown::Remove(conv_id.to_string()));
    }

    fn forward(&self, conv_id: &str, event: &ForwardedEvent) {
        self.record(Shown::Forward(conv_id.to_string(), event.kind));
    }

    fn open_url(&self, url: &str) {
        self.record(Shown::Open(url.to_string()));
    }

    fn show_window(&self, window: Window) {
        self.record(Shown::Window(window));
    }

    fn quit(&self) {
        self.record(Shown::Quit);
    }
}

/// A running tray manager over a fake session.
pub(crate) struct Harness {
    pub(crate) host: Arc<FakeHost>,
    pub(crate) proxy: Arc<SessionProxy>,
    pub(crate) settings: Settings,
    pub(crate) presenter: Arc<RecordingPresenter>,
    pub(crate) tray: TrayHandle,
}

impl Harness {
    pub(crate) fn new(host: Arc<FakeHost>) -> Self {
        let proxy = proxy_for(host.clone(), oauth("circuitsandbox.net"));
        let settings = Settings::in_memory();
        let presenter = Arc::new(RecordingPresenter::default());
        let tray = TrayManager::spawn(proxy.clone(), settings.clone(), presenter.clone());
        Self {
            host,
            proxy,
            settings,
            presenter,
            tray,
        }
    }
}

/// Polls `check` until it holds, failing after a few seconds.
pub(crate) async fn eventually(mut check: impl FnMut() -> bool) {
    let wait = async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("condition not reached in time");
}
