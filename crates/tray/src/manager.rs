//! Owns the contact icons and keeps them in step with the session.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use chattray_protocol::messages::ConnectionStateChangedEvent;
use chattray_protocol::types::{ConnectionState, Conversation, ConversationType, User};
use chattray_protocol::{EventKind, ForwardedEvent};
use chattray_session::{ProxyError, ProxyEvent, SessionProxy, SubscriptionId, Topic};
use chattray_settings::Settings;

use crate::item::{ChatAction, TrayItem, conversation_url};
use crate::menu::MenuState;

/// Upper bound on contact icons.
pub const MAX_ITEMS: usize = 5;

/// Auxiliary windows opened from the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Preferences,
    About,
}

/// The platform side of the tray: draws icons, menus and popups.
///
/// Calls arrive from the manager task, one at a time.
pub trait TrayPresenter: Send + Sync {
    /// Redraws the main icon: context menu, icon variant and title.
    fn show_main(&self, menu: &MenuState);
    /// Creates the icon and popup for a contact.
    fn add_item(&self, item: &TrayItem, local_user_id: &str);
    /// Re-renders a contact icon after its [`TrayItem::icon_state`] changed.
    fn update_item(&self, item: &TrayItem);
    fn remove_item(&self, conv_id: &str);
    /// Relays a session event to a contact popup.
    fn forward(&self, conv_id: &str, event: &ForwardedEvent);
    fn open_url(&self, url: &str);
    fn show_window(&self, window: Window);
    fn quit(&self);
}

/// Commands accepted by a running [`TrayManager`].
#[derive(Debug)]
pub enum TrayCommand {
    /// Rebuild every contact icon; the sender fires when done.
    Reinitialize(oneshot::Sender<()>),
    Chat(ChatAction),
    Shutdown,
}

/// Handle to a running [`TrayManager`].
///
/// The manager stops once [`TrayHandle::shutdown`] is called or every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct TrayHandle {
    commands: mpsc::UnboundedSender<TrayCommand>,
}

impl TrayHandle {
    /// Rebuilds the contact icons and waits for the rebuild to finish.
    pub async fn reinitialize(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(TrayCommand::Reinitialize(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn chat(&self, action: ChatAction) {
        let _ = self.commands.send(TrayCommand::Chat(action));
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(TrayCommand::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// Builds contact icons for the configured conversations and routes
/// session events to them.
pub struct TrayManager {
    proxy: Arc<SessionProxy>,
    settings: Settings,
    presenter: Arc<dyn TrayPresenter>,
    menu: MenuState,
    items: Vec<TrayItem>,
}

impl TrayManager {
    /// Subscribes to the proxy's events and starts the manager task.
    ///
    /// Events emitted after this returns are never missed.
    pub fn spawn(
        proxy: Arc<SessionProxy>,
        settings: Settings,
        presenter: Arc<dyn TrayPresenter>,
    ) -> TrayHandle {
        let topics: Vec<Topic> = std::iter::once(Topic::UserLoggedOn)
            .chain(EventKind::ALL.into_iter().map(Topic::from))
            .collect();
        let (subscriptions, events) = proxy.events().channel(&topics);
        let (tx, rx) = mpsc::unbounded_channel();

        let manager = Self {
            menu: MenuState::new(proxy.connection_state()),
            proxy,
            settings,
            presenter,
            items: Vec::new(),
        };
        manager.presenter.show_main(&manager.menu);
        tokio::spawn(manager.run(subscriptions, events, rx));

        TrayHandle { commands: tx }
    }

    async fn run(
        mut self,
        subscriptions: Vec<SubscriptionId>,
        mut events: mpsc::UnboundedReceiver<ProxyEvent>,
        mut commands: mpsc::UnboundedReceiver<TrayCommand>,
    ) {
        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => self.handle_event(event).await,
                command = commands.recv() => match command {
                    Some(TrayCommand::Reinitialize(done)) => {
                        self.build().await;
                        let _ = done.send(());
                    }
                    Some(TrayCommand::Chat(action)) => self.chat(action),
                    Some(TrayCommand::Shutdown) | None => break,
                },
            }
        }

        for id in subscriptions {
            self.proxy.events().unsubscribe(id);
        }
        self.remove_items();
        debug!("tray manager stopped");
    }

    async fn handle_event(&mut self, event: ProxyEvent) {
        match event {
            ProxyEvent::UserLoggedOn(user) => {
                debug!(user = %user.user_id, "user logged on, creating tray items");
                self.build().await;
            }
            ProxyEvent::Forwarded(event) if event.kind == EventKind::ConnectionStateChanged => {
                match event.parse::<ConnectionStateChangedEvent>() {
                    Ok(change) => self.connection_changed(change.state).await,
                    Err(e) => warn!("malformed {} event: {e}", event.kind),
                }
            }
            ProxyEvent::Forwarded(event) => self.dispatch(&event).await,
        }
    }

    async fn connection_changed(&mut self, state: ConnectionState) {
        self.menu = MenuState::new(state);
        self.presenter.show_main(&self.menu);

        match state {
            ConnectionState::Disconnected => self.remove_items(),
            ConnectionState::Connected
                if self.items.is_empty() && self.proxy.logged_on_user().is_some() =>
            {
                info!("reconnected, recreating tray items");
                self.build().await;
            }
            _ => {}
        }
    }

    /// Applies a session event to every contact icon.
    async fn dispatch(&mut self, event: &ForwardedEvent) {
        let Some(local) = self.proxy.logged_on_user() else {
            return;
        };
        for index in 0..self.items.len() {
            let item = &mut self.items[index];
            let reaction = item.apply(event, &local.user_id);
            if reaction.forward {
                self.presenter.forward(item.conv_id(), event);
            }
            if reaction.refresh_unread {
                self.refresh_unread(index).await;
            } else if reaction.redraw {
                self.presenter.update_item(&self.items[index]);
            }
        }
    }

    async fn refresh_unread(&mut self, index: usize) {
        let conv_id = self.items[index].conv_id().to_string();
        match self.proxy.get_conversation_by_id(&conv_id).await {
            Ok(conversation) => {
                let item = &mut self.items[index];
                if item.set_unread(conversation.user_data.unread_items > 0) {
                    self.presenter.update_item(item);
                }
            }
            Err(e) => warn!(conv_id, "failed to refresh unread state: {e}"),
        }
    }

    /// Replaces every contact icon with freshly loaded ones.
    async fn build(&mut self) {
        self.remove_items();
        let Some(local) = self.proxy.logged_on_user() else {
            debug!("no logged-on user, skipping tray items");
            return;
        };

        let selected = match self.select_conversations(&local.user_id).await {
            Ok(selected) => selected,
            Err(e) => {
                warn!("failed to load tray conversations: {e}");
                return;
            }
        };

        // Created last to first, loaded in parallel.
        let mut items: Vec<TrayItem> = selected
            .into_iter()
            .rev()
            .map(|(conversation, peer)| TrayItem::new(conversation, peer))
            .collect();
        let proxy = &self.proxy;
        join_all(items.iter_mut().map(|item| async move {
            if let Err(e) = item.load(proxy).await {
                warn!(conv_id = item.conv_id(), "failed to initialise tray item: {e}");
            }
        }))
        .await;

        for item in &items {
            self.presenter.add_item(item, &local.user_id);
            info!(
                conv_id = item.conv_id(),
                "created tray for {} ({:?})",
                item.tooltip(),
                item.presence()
            );
        }
        self.items = items;
    }

    /// The direct conversations to show, each with its peer user.
    async fn select_conversations(
        &self,
        local_user_id: &str,
    ) -> Result<Vec<(Conversation, User)>, ProxyError> {
        let ids = match self.settings.tray().custom_ids() {
            Some(ids) => ids,
            None => self.proxy.get_favorite_conversation_ids().await?,
        };
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let selected: Vec<(Conversation, String)> = self
            .proxy
            .get_conversations_by_ids(&ids)
            .await?
            .into_iter()
            .filter(|c| c.conv_type == ConversationType::Direct)
            .take(MAX_ITEMS)
            .filter_map(|c| {
                let peer = c.peer_user_id(local_user_id)?.to_string();
                Some((c, peer))
            })
            .collect();
        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let peer_ids: Vec<String> = selected.iter().map(|(_, peer)| peer.clone()).collect();
        let users = self.proxy.get_users_by_id(&peer_ids).await?;
        Ok(selected
            .into_iter()
            .zip(users)
            .map(|((conversation, _), user)| (conversation, user))
            .collect())
    }

    fn remove_items(&mut self) {
        for item in self.items.drain(..) {
            self.presenter.remove_item(item.conv_id());
        }
    }

    fn chat(&self, action: ChatAction) {
        if let ChatAction::Navigate { user_id, conv_id } = &action {
            let is_local = self
                .proxy
                .logged_on_user()
                .is_some_and(|u| u.user_id == *user_id);
            match conv_id {
                Some(conv_id) if is_local => {
                    let domain = self.settings.domain().unwrap_or_default();
                    self.presenter.open_url(&conversation_url(&domain, conv_id));
                }
                _ => debug!(user_id, "ignoring navigate request"),
            }
            return;
        }

        let known = self.items.iter().any(|item| match &action {
            ChatAction::AddTextItem { conv_id, .. }
            | ChatAction::MakeCall { conv_id, .. }
            | ChatAction::EndCall { conv_id, .. } => item.conv_id() == conv_id,
            ChatAction::Navigate { .. } => false,
        });
        if !known {
            debug!(?action, "chat action for unknown conversation");
            return;
        }

        let proxy = self.proxy.clone();
        tokio::spawn(async move {
            let result = match action {
                ChatAction::AddTextItem { conv_id, content } => {
                    proxy.add_text_item(&conv_id, &content).await.map(drop)
                }
                ChatAction::MakeCall { user_id, .. } => proxy.make_call(&user_id).await.map(drop),
                ChatAction::EndCall { call_id, .. } => proxy.end_call(&call_id).await,
                ChatAction::Navigate { .. } => Ok(()),
            };
            if let Err(e) = result {
                warn!("chat action failed: {e}");
            }
        });
    }
}
