//! Context menu and status of the main tray icon.

use chattray_protocol::types::ConnectionState;

/// Tooltip of the main tray icon.
pub const TOOLTIP: &str = "Circuit Chat";

/// Actions that can be triggered from the tray context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Open the web client for the configured domain.
    OpenWebClient,
    Preferences,
    About,
    SignIn,
    SignOut,
    /// User requested to quit the application.
    Quit,
}

/// A single menu item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    /// Display text.
    pub label: String,
    /// Whether the item is enabled (clickable).
    pub enabled: bool,
    /// Optional action triggered on click.
    pub action: Option<MenuAction>,
}

impl MenuItem {
    fn action(label: &str, action: MenuAction) -> Self {
        Self {
            label: label.into(),
            enabled: true,
            action: Some(action),
        }
    }

    /// Separator (represented as disabled empty item).
    fn separator() -> Self {
        Self {
            label: String::new(),
            enabled: false,
            action: None,
        }
    }

    pub fn is_separator(&self) -> bool {
        self.action.is_none() && self.label.is_empty()
    }
}

/// Which variant of the main icon to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainIcon {
    Colour,
    Grey,
}

/// Current state used to build the context menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuState {
    pub connection: ConnectionState,
}

impl MenuState {
    pub fn new(connection: ConnectionState) -> Self {
        Self { connection }
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Builds the menu items from the current state.
    ///
    /// Both variants share the layout and differ only in the sign in/out
    /// entry.
    pub fn build_menu(&self) -> Vec<MenuItem> {
        let session = if self.is_connected() {
            MenuItem::action("Sign out", MenuAction::SignOut)
        } else {
            MenuItem::action("Sign in", MenuAction::SignIn)
        };

        vec![
            MenuItem::action("Open Circuit", MenuAction::OpenWebClient),
            MenuItem::action("Preferences...", MenuAction::Preferences),
            MenuItem::action("About", MenuAction::About),
            MenuItem::separator(),
            session,
            MenuItem::separator(),
            MenuItem::action("Quit", MenuAction::Quit),
        ]
    }

    /// Text next to the icon: the state name while reconnecting.
    pub fn title(&self) -> &'static str {
        match self.connection {
            ConnectionState::Reconnecting => self.connection.as_str(),
            _ => "",
        }
    }

    pub fn icon(&self) -> MainIcon {
        if self.is_connected() {
            MainIcon::Colour
        } else {
            MainIcon::Grey
        }
    }
}

/// Landing page of the web client.
pub fn web_client_url(domain: &str) -> String {
    format!("https://{domain}")
}
