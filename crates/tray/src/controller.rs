//! Maps menu clicks and preference changes onto the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use chattray_protocol::types::{OAuthConfig, User};
use chattray_session::{ProxyError, SessionProxy, Topic};
use chattray_settings::{AppConfig, PreferencesChange, PreferencesForm, Settings, SettingsError};

use crate::item::ChatAction;
use crate::manager::{TrayHandle, TrayManager, TrayPresenter, Window};
use crate::menu::{MenuAction, web_client_url};

/// Creates the session proxy for a domain's OAuth client.
pub type ProxyBuilder = Box<dyn Fn(&OAuthConfig) -> Arc<SessionProxy> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum TrayError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("no service domain configured")]
    NoDomain,

    #[error("no session started")]
    NotRunning,
}

#[derive(Clone)]
struct Running {
    proxy: Arc<SessionProxy>,
    tray: TrayHandle,
}

/// Application-level command handling.
///
/// Owns the session proxy for the configured domain together with the
/// tray manager watching it. Changing the domain replaces both.
pub struct TrayController {
    config: AppConfig,
    settings: Settings,
    presenter: Arc<dyn TrayPresenter>,
    build_proxy: ProxyBuilder,
    running: Mutex<Option<Running>>,
    initializing: Arc<AtomicBool>,
}

impl TrayController {
    pub fn new(
        config: AppConfig,
        settings: Settings,
        presenter: Arc<dyn TrayPresenter>,
        build_proxy: ProxyBuilder,
    ) -> Self {
        Self {
            config,
            settings,
            presenter,
            build_proxy,
            running: Mutex::new(None),
            initializing: Arc::new(AtomicBool::new(true)),
        }
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Result<Running, TrayError> {
        self.running().clone().ok_or(TrayError::NotRunning)
    }

    /// The session proxy of the current domain.
    pub fn proxy(&self) -> Option<Arc<SessionProxy>> {
        self.running().as_ref().map(|r| r.proxy.clone())
    }

    /// Whether the application may quit. Refused until the first logon
    /// has completed.
    pub fn may_quit(&self) -> bool {
        !self.initializing.load(Ordering::SeqCst)
    }

    /// Starts a session for the configured domain and logs on.
    ///
    /// Seeds the settings on first run. A previously running session is
    /// shut down first.
    pub async fn run(&self) -> Result<User, TrayError> {
        let default_domain = self.config.default_domain().ok_or(TrayError::NoDomain)?;
        let domain = self.settings.initialize_defaults(default_domain)?;
        let oauth = self.config.domain(&domain)?;

        let proxy = (self.build_proxy)(oauth);
        let initializing = self.initializing.clone();
        proxy.events().subscribe(Topic::UserLoggedOn, move |_| {
            if initializing.swap(false, Ordering::SeqCst) {
                info!("done initializing");
            }
        });
        let tray = TrayManager::spawn(
            proxy.clone(),
            self.settings.clone(),
            self.presenter.clone(),
        );

        let previous = self.running().replace(Running {
            proxy: proxy.clone(),
            tray,
        });
        if let Some(previous) = previous {
            previous.tray.shutdown();
            previous.proxy.shutdown();
        }
        info!(domain, "session started");

        self.logon_with(&proxy).await
    }

    pub async fn logon(&self) -> Result<User, TrayError> {
        let running = self.current()?;
        self.logon_with(&running.proxy).await
    }

    async fn logon_with(&self, proxy: &SessionProxy) -> Result<User, TrayError> {
        let user = proxy.logon().await?;
        info!("logged on as {}", user.display_name);
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), TrayError> {
        let running = self.current()?;
        let name = running
            .proxy
            .logged_on_user()
            .map(|u| u.display_name)
            .unwrap_or_default();
        running.proxy.logout().await?;
        info!("{name} logged out");
        Ok(())
    }

    /// Handles a click in the main tray menu.
    pub async fn handle(&self, action: MenuAction) -> Result<(), TrayError> {
        match action {
            MenuAction::OpenWebClient => {
                let domain = self.settings.domain().ok_or(TrayError::NoDomain)?;
                self.presenter.open_url(&web_client_url(&domain));
            }
            MenuAction::Preferences => self.presenter.show_window(Window::Preferences),
            MenuAction::About => self.presenter.show_window(Window::About),
            MenuAction::SignIn => {
                self.logon().await?;
            }
            MenuAction::SignOut => self.logout().await?,
            MenuAction::Quit => self.quit(),
        }
        Ok(())
    }

    fn quit(&self) {
        if !self.may_quit() {
            info!("refusing to quit while initializing");
            return;
        }
        if let Some(running) = self.running().take() {
            running.tray.shutdown();
            running.proxy.shutdown();
        }
        self.presenter.quit();
    }

    /// Saves the preferences form and applies the change: a new domain
    /// signs out and starts over, a new conversation selection rebuilds
    /// the tray.
    pub async fn preferences_saved(
        &self,
        form: &PreferencesForm,
    ) -> Result<PreferencesChange, TrayError> {
        let change = form.save(&self.settings)?;
        match change {
            PreferencesChange::ReLogin => {
                if let Err(e) = self.logout().await {
                    warn!("logout before re-login failed: {e}");
                }
                self.run().await?;
            }
            PreferencesChange::ReInitialize => {
                let running = self.current()?;
                running.tray.reinitialize().await;
            }
        }
        Ok(change)
    }

    /// Routes a request from a contact popup.
    pub fn chat(&self, action: ChatAction) -> Result<(), TrayError> {
        self.current()?.tray.chat(action);
        Ok(())
    }
}
