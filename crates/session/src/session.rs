use chattray_protocol::types::{ConnectionState, User};

/// Control-side mirror of the remote session.
///
/// The logged-on user is kept across transient disconnects but only
/// exposed while the connection state allows it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    access_token: Option<String>,
    user: Option<User>,
    state: ConnectionState,
}

impl Session {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// The logged-on user, only while Connected or Reconnecting.
    pub fn logged_on_user(&self) -> Option<&User> {
        if self.state.has_user() {
            self.user.as_ref()
        } else {
            None
        }
    }

    /// Whether a user was logged on, regardless of the connection state.
    pub fn has_logged_on(&self) -> bool {
        self.user.is_some()
    }

    pub(crate) fn logged_on(&mut self, access_token: String, user: User) {
        self.access_token = Some(access_token);
        self.user = Some(user);
        self.state = ConnectionState::Connected;
    }

    pub(crate) fn apply_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
