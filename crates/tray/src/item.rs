//! Per-contact tray icon state.

use serde::Serialize;
use tracing::debug;

use chattray_protocol::messages::{
    CallEvent, ConversationReadItemsEvent, ItemEvent, PresenceChangedEvent,
};
use chattray_protocol::types::{Conversation, Item, ItemsOptions, PresenceState, User};
use chattray_protocol::{EventKind, ForwardedEvent};
use chattray_session::{ProxyError, SessionProxy};

pub const POPUP_WIDTH: i32 = 320;
pub const POPUP_HEIGHT: i32 = 375;

/// Items fetched for the popup when the icon is created.
const RECENT_ITEMS: u32 = 20;

/// Presence ring drawn around the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceRing {
    None,
    Green,
    Red,
}

impl From<PresenceState> for PresenceRing {
    fn from(state: PresenceState) -> Self {
        match state {
            PresenceState::Available | PresenceState::Busy => PresenceRing::Green,
            PresenceState::Dnd => PresenceRing::Red,
            PresenceState::Away | PresenceState::Offline => PresenceRing::None,
        }
    }
}

/// What the contact icon shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconState {
    /// A call is active in the conversation.
    Call,
    Avatar { ring: PresenceRing, unread: bool },
}

/// What the manager must do after an event was applied to an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemReaction {
    /// Relay the event to the item's popup.
    pub forward: bool,
    /// The icon state changed.
    pub redraw: bool,
    /// Re-read the conversation to recompute the unread indicator.
    pub refresh_unread: bool,
}

impl ItemReaction {
    pub fn is_none(&self) -> bool {
        *self == Self::default()
    }
}

/// A request coming from a contact popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    AddTextItem { conv_id: String, content: String },
    MakeCall { conv_id: String, user_id: String },
    EndCall { conv_id: String, call_id: String },
    /// Open a conversation in the web client. Honoured only for the
    /// logged-on user.
    Navigate {
        user_id: String,
        conv_id: Option<String>,
    },
}

/// Initial data handed to a contact popup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupData<'a> {
    pub local_user_id: &'a str,
    pub conversation: PopupConversation<'a>,
    pub presence_state: PresenceState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupConversation<'a> {
    #[serde(flatten)]
    pub conversation: &'a Conversation,
    pub peer_user: &'a User,
    pub items: &'a [Item],
}

/// One direct conversation shown as a contact icon.
#[derive(Debug, Clone, PartialEq)]
pub struct TrayItem {
    conversation: Conversation,
    peer: User,
    presence: PresenceState,
    unread: bool,
    call_active: bool,
    items: Vec<Item>,
}

impl TrayItem {
    pub fn new(conversation: Conversation, peer: User) -> Self {
        let unread = conversation.user_data.unread_items > 0;
        Self {
            conversation,
            peer,
            presence: PresenceState::Offline,
            unread,
            call_active: false,
            items: Vec::new(),
        }
    }

    pub fn conv_id(&self) -> &str {
        &self.conversation.conv_id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn peer(&self) -> &User {
        &self.peer
    }

    pub fn tooltip(&self) -> &str {
        &self.peer.display_name
    }

    pub fn presence(&self) -> PresenceState {
        self.presence
    }

    pub fn has_unread(&self) -> bool {
        self.unread
    }

    pub fn call_active(&self) -> bool {
        self.call_active
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Fetches the peer's presence, subscribes to its changes and loads the
    /// most recent items.
    pub async fn load(&mut self, proxy: &SessionProxy) -> Result<(), ProxyError> {
        let peer = [self.peer.user_id.clone()];
        let presence = proxy.get_presence(&peer).await?;
        if let Some(p) = presence.first() {
            self.presence = p.state;
        }
        self.unread = self.conversation.user_data.unread_items > 0;

        proxy.subscribe_presence(&peer).await?;

        let options = ItemsOptions {
            number_of_items: Some(RECENT_ITEMS),
        };
        self.items = proxy
            .get_conversation_items(self.conv_id(), Some(options))
            .await?;
        Ok(())
    }

    pub fn set_presence(&mut self, state: PresenceState) -> bool {
        let changed = self.presence != state;
        self.presence = state;
        changed
    }

    pub fn set_unread(&mut self, unread: bool) -> bool {
        let changed = self.unread != unread;
        self.unread = unread;
        changed
    }

    pub fn icon_state(&self) -> IconState {
        if self.call_active {
            return IconState::Call;
        }
        IconState::Avatar {
            ring: self.presence.into(),
            unread: self.unread,
        }
    }

    /// Applies a session event addressed to this conversation or its peer.
    pub fn apply(&mut self, event: &ForwardedEvent, local_user_id: &str) -> ItemReaction {
        let mut reaction = ItemReaction::default();
        match event.kind {
            EventKind::UserPresenceChanged => {
                let Some(change) = parse::<PresenceChangedEvent>(event) else {
                    return reaction;
                };
                if change.presence_state.user_id == self.peer.user_id {
                    reaction.forward = true;
                    reaction.redraw = self.set_presence(change.presence_state.state);
                }
            }
            EventKind::ItemAdded => {
                let Some(ItemEvent { item }) = parse(event) else {
                    return reaction;
                };
                if item.conv_id == self.conversation.conv_id {
                    reaction.forward = true;
                    if item.creator_id != local_user_id {
                        reaction.redraw = self.set_unread(true);
                    }
                    self.push_item(item);
                }
            }
            EventKind::ConversationReadItems => {
                let Some(read) = parse::<ConversationReadItemsEvent>(event) else {
                    return reaction;
                };
                reaction.refresh_unread = read.data.conv_id == self.conversation.conv_id;
            }
            EventKind::CallStatus | EventKind::CallEnded => {
                let Some(CallEvent { call, .. }) = parse(event) else {
                    return reaction;
                };
                if call.conv_id == self.conversation.conv_id {
                    let active = event.kind == EventKind::CallStatus;
                    reaction.forward = true;
                    reaction.redraw = self.call_active != active;
                    self.call_active = active;
                }
            }
            EventKind::ConnectionStateChanged | EventKind::ItemUpdated => {}
        }
        reaction
    }

    fn push_item(&mut self, item: Item) {
        self.items.push(item);
        let excess = self.items.len().saturating_sub(RECENT_ITEMS as usize);
        if excess > 0 {
            self.items = self.items.split_off(excess);
        }
    }

    pub fn popup_data<'a>(&'a self, local_user_id: &'a str) -> PopupData<'a> {
        PopupData {
            local_user_id,
            conversation: PopupConversation {
                conversation: &self.conversation,
                peer_user: &self.peer,
                items: &self.items,
            },
            presence_state: self.presence,
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(event: &ForwardedEvent) -> Option<T> {
    match event.parse() {
        Ok(body) => Some(body),
        Err(e) => {
            debug!(event = %event.kind, "ignoring malformed event: {e}");
            None
        }
    }
}

/// Web client deep link to a conversation.
pub fn conversation_url(domain: &str, conv_id: &str) -> String {
    format!("https://{domain}/#/conversation/{conv_id}")
}

/// Screen rectangle in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Which side of the tray icon the popup opens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupAnchor {
    /// Under the icon (top menu bar).
    Below,
    /// Over the icon (bottom task bar).
    Above,
}

impl PopupAnchor {
    pub fn for_platform() -> Self {
        if cfg!(target_os = "macos") {
            PopupAnchor::Below
        } else {
            PopupAnchor::Above
        }
    }
}

/// Top-left corner of a popup of `width` x `height` centred on `tray`.
pub fn popup_position(tray: Rect, width: i32, height: i32, anchor: PopupAnchor) -> (i32, i32) {
    let x = (f64::from(tray.x) + f64::from(tray.width) / 2.0 - f64::from(width) / 2.0).round();
    let y = match anchor {
        PopupAnchor::Below => tray.y + tray.height,
        PopupAnchor::Above => tray.y - height - 1,
    };
    (x as i32, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chattray_protocol::types::{ConversationType, UserData};
    use serde_json::json;

    fn conversation(unread: u32) -> Conversation {
        Conversation {
            conv_id: "c1".into(),
            conv_type: ConversationType::Direct,
            participants: vec!["me".into(), "bob".into()],
            user_data: UserData {
                unread_items: unread,
            },
            topic: None,
        }
    }

    fn bob() -> User {
        User {
            user_id: "bob".into(),
            display_name: "Bob".into(),
            avatar: None,
        }
    }

    fn event(kind: EventKind, payload: serde_json::Value) -> ForwardedEvent {
        ForwardedEvent::new(kind, payload)
    }

    #[test]
    fn new_item_starts_offline_with_unread_from_conversation() {
        let item = TrayItem::new(conversation(3), bob());
        assert_eq!(item.presence(), PresenceState::Offline);
        assert!(item.has_unread());
        assert_eq!(item.tooltip(), "Bob");
        assert_eq!(
            item.icon_state(),
            IconState::Avatar {
                ring: PresenceRing::None,
                unread: true
            }
        );
    }

    #[test]
    fn rings_follow_presence() {
        assert_eq!(PresenceRing::from(PresenceState::Available), PresenceRing::Green);
        assert_eq!(PresenceRing::from(PresenceState::Busy), PresenceRing::Green);
        assert_eq!(PresenceRing::from(PresenceState::Dnd), PresenceRing::Red);
        assert_eq!(PresenceRing::from(PresenceState::Away), PresenceRing::None);
        assert_eq!(PresenceRing::from(PresenceState::Offline), PresenceRing::None);
    }

    #[test]
    fn peer_presence_change_redraws() {
        let mut item = TrayItem::new(conversation(0), bob());
        let change = event(
            EventKind::UserPresenceChanged,
            json!({"presenceState": {"userId": "bob", "state": "DND"}}),
        );

        let reaction = item.apply(&change, "me");
        assert!(reaction.forward && reaction.redraw);
        assert_eq!(
            item.icon_state(),
            IconState::Avatar {
                ring: PresenceRing::Red,
                unread: false
            }
        );

        // Same state again: still relayed, nothing to redraw.
        let reaction = item.apply(&change, "me");
        assert!(reaction.forward && !reaction.redraw);
    }

    #[test]
    fn other_users_presence_is_ignored() {
        let mut item = TrayItem::new(conversation(0), bob());
        let change = event(
            EventKind::UserPresenceChanged,
            json!({"presenceState": {"userId": "carol", "state": "AVAILABLE"}}),
        );
        assert!(item.apply(&change, "me").is_none());
        assert_eq!(item.presence(), PresenceState::Offline);
    }

    #[test]
    fn item_from_peer_marks_unread_but_own_item_does_not() {
        let mut item = TrayItem::new(conversation(0), bob());

        let own = event(
            EventKind::ItemAdded,
            json!({"item": {"itemId": "i1", "convId": "c1", "creatorId": "me"}}),
        );
        let reaction = item.apply(&own, "me");
        assert!(reaction.forward && !reaction.redraw);
        assert!(!item.has_unread());

        let theirs = event(
            EventKind::ItemAdded,
            json!({"item": {"itemId": "i2", "convId": "c1", "creatorId": "bob"}}),
        );
        assert!(item.apply(&theirs, "me").redraw);
        assert!(item.has_unread());
        assert_eq!(item.items().len(), 2);
    }

    #[test]
    fn item_in_other_conversation_is_ignored() {
        let mut item = TrayItem::new(conversation(0), bob());
        let other = event(
            EventKind::ItemAdded,
            json!({"item": {"itemId": "i1", "convId": "c2", "creatorId": "bob"}}),
        );
        assert!(item.apply(&other, "me").is_none());
        assert!(!item.has_unread());
    }

    #[test]
    fn read_items_requests_refresh() {
        let mut item = TrayItem::new(conversation(1), bob());
        let read = event(
            EventKind::ConversationReadItems,
            json!({"data": {"convId": "c1"}}),
        );
        let reaction = item.apply(&read, "me");
        assert!(reaction.refresh_unread && !reaction.forward);
    }

    #[test]
    fn call_status_and_end_toggle_call_icon() {
        let mut item = TrayItem::new(conversation(0), bob());
        let status = event(
            EventKind::CallStatus,
            json!({"call": {"callId": "k1", "convId": "c1"}, "reason": "callStateChanged"}),
        );
        let ended = event(
            EventKind::CallEnded,
            json!({"call": {"callId": "k1", "convId": "c1"}}),
        );

        assert!(item.apply(&status, "me").redraw);
        assert_eq!(item.icon_state(), IconState::Call);
        let again = item.apply(&status, "me");
        assert!(again.forward && !again.redraw);

        assert!(item.apply(&ended, "me").redraw);
        assert!(!item.call_active());
        assert!(!item.apply(&ended, "me").redraw);
    }

    #[test]
    fn malformed_events_are_ignored() {
        let mut item = TrayItem::new(conversation(0), bob());
        for kind in EventKind::ALL {
            assert!(item.apply(&event(kind, json!("garbage")), "me").is_none());
        }
    }

    #[test]
    fn recent_items_are_capped() {
        let mut item = TrayItem::new(conversation(0), bob());
        for i in 0..25 {
            let added = event(
                EventKind::ItemAdded,
                json!({"item": {"itemId": format!("i{i}"), "convId": "c1", "creatorId": "me"}}),
            );
            item.apply(&added, "me");
        }
        assert_eq!(item.items().len(), RECENT_ITEMS as usize);
        assert_eq!(item.items()[0].item_id, "i5");
    }

    #[test]
    fn popup_data_shape() {
        let item = TrayItem::new(conversation(0), bob());
        let data = serde_json::to_value(item.popup_data("me")).unwrap();
        assert_eq!(data["localUserId"], "me");
        assert_eq!(data["presenceState"], "OFFLINE");
        assert_eq!(data["conversation"]["convId"], "c1");
        assert_eq!(data["conversation"]["type"], "DIRECT");
        assert_eq!(data["conversation"]["peerUser"]["displayName"], "Bob");
        assert_eq!(data["conversation"]["items"], json!([]));
    }

    #[test]
    fn popup_centres_on_tray_icon() {
        let tray = Rect {
            x: 1000,
            y: 0,
            width: 22,
            height: 22,
        };
        assert_eq!(
            popup_position(tray, POPUP_WIDTH, POPUP_HEIGHT, PopupAnchor::Below),
            (851, 22)
        );

        let tray = Rect {
            x: 1000,
            y: 1040,
            width: 25,
            height: 40,
        };
        // 1000 + 12.5 - 160 rounds away from zero.
        assert_eq!(
            popup_position(tray, POPUP_WIDTH, POPUP_HEIGHT, PopupAnchor::Above),
            (853, 664)
        );
    }

    #[test]
    fn conversation_link() {
        assert_eq!(
            conversation_url("circuitsandbox.net", "c1"),
            "https://circuitsandbox.net/#/conversation/c1"
        );
    }
}
