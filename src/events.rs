//! Events published to the presentation layer.

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Severity, TransportErrorKind};

/// Notifications emitted by the chat client, in the order their causes
/// were observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Connected,
    Disconnected,
    LoginSucceeded,
    LoginFailed { reason: String },
    MessageReceived { sender: String, text: String },
    UserJoined { username: String },
    UserLeft { username: String },
    TransportError {
        kind: TransportErrorKind,
        severity: Severity,
    },
}

/// Receiving end of the event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<ChatEvent>;

/// Sending end of the event channel.
///
/// Publishing never blocks. If the receiver has been dropped the event is
/// discarded.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<ChatEvent>,
}

impl EventPublisher {
    /// Create a publisher and its paired receiver.
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn publish(&self, event: ChatEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            debug!("No event receiver, dropping {:?}", event);
        }
    }
}
