//! Login session tracking for a single connection.

use tracing::{debug, info};

use crate::events::ChatEvent;
use crate::protocol::LoginAck;

/// Authentication state of the active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    LoggedOut,
    LoggedIn,
}

/// Session gate. A connection reaches [`SessionState::LoggedIn`] at most once;
/// further acknowledgements are ignored until the next disconnect.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == SessionState::LoggedIn
    }

    /// Apply a login acknowledgement, returning the event to publish, if any.
    pub fn on_login_ack(&mut self, ack: LoginAck) -> Option<ChatEvent> {
        if self.is_logged_in() {
            debug!("Ignoring login acknowledgement, already logged in");
            return None;
        }

        match ack {
            LoginAck::Accepted => {
                info!("Login accepted");
                self.state = SessionState::LoggedIn;
                Some(ChatEvent::LoginSucceeded)
            }
            LoginAck::Rejected { reason } => {
                info!("Login rejected: {}", reason);
                Some(ChatEvent::LoginFailed { reason })
            }
        }
    }

    pub fn on_disconnect(&mut self) {
        self.state = SessionState::LoggedOut;
    }
}
