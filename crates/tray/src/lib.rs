//! Tray presentation for the chat session.
//!
//! Everything here is platform-neutral state and decisions: which menu the
//! main icon shows, which conversations get a contact icon and how each
//! icon looks. Drawing happens behind [`TrayPresenter`].
//!
//! The pieces talk over channels:
//! - [`TrayManager`] owns the contact icons and reacts to session events
//! - [`TrayHandle`] sends it commands (rebuild, chat actions)
//! - [`TrayController`] maps menu clicks and preference changes onto the
//!   session proxy

mod controller;
mod item;
mod manager;
mod menu;

#[cfg(test)]
mod testing;

pub use controller::{ProxyBuilder, TrayController, TrayError};
pub use item::{
    ChatAction, IconState, ItemReaction, POPUP_HEIGHT, POPUP_WIDTH, PopupAnchor,
    PopupConversation, PopupData, PresenceRing, Rect, TrayItem, conversation_url, popup_position,
};
pub use manager::{MAX_ITEMS, TrayCommand, TrayHandle, TrayManager, TrayPresenter, Window};
pub use menu::{MainIcon, MenuAction, MenuItem, MenuState, TOOLTIP, web_client_url};
