//! Connection state machine.
//!
//! `ConnectionManager` holds everything that changes over a connection's
//! lifetime (status, receive buffer, login session) and turns transport
//! notifications into [`ChatEvent`]s. It performs no I/O itself; the driver
//! task calls into it whenever the socket connects, delivers bytes, fails or
//! closes, and writes whatever frames it hands back.
//!
//! The observable [`ClientState`] snapshot is refreshed before every event is
//! published, so a consumer that has just received an event never reads an
//! older state.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{Severity, TransportErrorKind};
use crate::events::{ChatEvent, EventPublisher};
use crate::protocol::{self, encode_json, FrameBuffer, InboundMessage, OutboundMessage};
use crate::session::{Session, SessionState};

/// Lifecycle of the single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Observable snapshot of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientState {
    pub status: ConnectionStatus,
    pub session: SessionState,
}

impl ClientState {
    pub fn is_logged_in(&self) -> bool {
        self.session == SessionState::LoggedIn
    }
}

/// Address of the server being talked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

pub struct ConnectionManager {
    status: ConnectionStatus,
    remote: Option<RemoteEndpoint>,
    buffer: FrameBuffer,
    session: Session,
    events: EventPublisher,
    state: watch::Sender<ClientState>,
}

impl ConnectionManager {
    pub fn new(events: EventPublisher, max_frame_size: usize) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            remote: None,
            buffer: FrameBuffer::with_max_frame_size(max_frame_size),
            session: Session::new(),
            events,
            state: watch::Sender::new(ClientState::default()),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn remote(&self) -> Option<&RemoteEndpoint> {
        self.remote.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    /// Subscribe to state snapshots.
    pub fn watch_state(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Start a connection attempt.
    ///
    /// Returns `false` (and changes nothing) if a connection is already
    /// in progress or established.
    pub fn begin_connect(&mut self, host: &str, port: u16) -> bool {
        if self.status != ConnectionStatus::Disconnected {
            warn!(
                "Connect to {}:{} ignored, connection is {:?}",
                host, port, self.status
            );
            return false;
        }

        self.buffer.clear();
        self.session.on_disconnect();
        self.remote = Some(RemoteEndpoint {
            host: host.to_string(),
            port,
        });
        self.status = ConnectionStatus::Connecting;
        self.refresh_state();
        info!("Connecting to {}:{}", host, port);
        true
    }

    /// The transport finished connecting.
    pub fn on_connected(&mut self) {
        if self.status != ConnectionStatus::Connecting {
            return;
        }
        self.status = ConnectionStatus::Connected;
        if let Some(remote) = &self.remote {
            info!("Connected to {}", remote);
        }
        self.emit(ChatEvent::Connected);
    }

    /// The connection attempt failed before a socket was established.
    ///
    /// Every failure ends the attempt and is reported at error severity,
    /// whatever its kind would mean on an open connection.
    pub fn on_connect_failed(&mut self, kind: TransportErrorKind) {
        if self.status != ConnectionStatus::Connecting {
            return;
        }
        warn!("Connection attempt failed: {}", kind);
        self.on_disconnected();
        self.emit(ChatEvent::TransportError {
            kind,
            severity: Severity::Error,
        });
    }

    /// Frame for a login request, or `None` when not connected.
    pub fn login_frame(&self, username: &str) -> Option<Vec<u8>> {
        if self.status != ConnectionStatus::Connected {
            debug!("Login ignored, not connected");
            return None;
        }
        encode_outbound(&OutboundMessage::Login {
            username: username.to_string(),
        })
    }

    /// Frame for a chat line, or `None` for empty text.
    ///
    /// Login state is not checked; the server decides whether to accept it.
    pub fn chat_frame(&self, text: &str) -> Option<Vec<u8>> {
        if text.is_empty() {
            return None;
        }
        encode_outbound(&OutboundMessage::Message {
            text: text.to_string(),
        })
    }

    /// Feed bytes read from the socket and dispatch every complete frame.
    pub fn on_bytes_available(&mut self, data: &[u8]) {
        if self.status != ConnectionStatus::Connected {
            debug!("Discarding {} bytes received while {:?}", data.len(), self.status);
            return;
        }

        self.buffer.extend(data);

        loop {
            match self.buffer.try_decode_next() {
                Ok(Some(payload)) => self.dispatch(&payload),
                Ok(None) => break,
                Err(e) => {
                    warn!("Framing error: {}", e);
                    self.on_transport_error(TransportErrorKind::Protocol);
                    break;
                }
            }
        }
    }

    /// Handle a classified transport failure on an established connection.
    pub fn on_transport_error(&mut self, kind: TransportErrorKind) {
        if self.status == ConnectionStatus::Connecting {
            self.on_connect_failed(kind);
            return;
        }

        match kind.severity() {
            None => {
                info!("Connection closed by server");
                self.on_disconnected();
            }
            Some(Severity::Warning) => {
                warn!("Transient transport error: {}", kind);
                self.emit(ChatEvent::TransportError {
                    kind,
                    severity: Severity::Warning,
                });
            }
            Some(Severity::Error) => {
                warn!("Transport error: {}", kind);
                self.emit(ChatEvent::TransportError {
                    kind,
                    severity: Severity::Error,
                });
                if kind.forces_disconnect() {
                    self.on_disconnected();
                }
            }
        }
    }

    /// The transport is gone. Any partially received frame is discarded.
    ///
    /// `Disconnected` is published only if the connection had been established.
    pub fn on_disconnected(&mut self) {
        let previous = self.status;
        if previous == ConnectionStatus::Disconnected {
            return;
        }

        self.status = ConnectionStatus::Disconnected;
        self.buffer.clear();
        self.session.on_disconnect();
        self.remote = None;

        if previous == ConnectionStatus::Connected {
            info!("Disconnected");
            self.emit(ChatEvent::Disconnected);
        } else {
            debug!("Connection attempt abandoned");
            self.refresh_state();
        }
    }

    fn dispatch(&mut self, payload: &[u8]) {
        let message = match protocol::parse(payload) {
            Ok(message) => message,
            Err(rejection) => {
                debug!("Dropping frame of {} bytes: {}", payload.len(), rejection);
                return;
            }
        };

        let event = match message {
            InboundMessage::Login(ack) => self.session.on_login_ack(ack),
            InboundMessage::Chat { sender, text } => {
                Some(ChatEvent::MessageReceived { sender, text })
            }
            InboundMessage::UserJoined { username } => Some(ChatEvent::UserJoined { username }),
            InboundMessage::UserLeft { username } => Some(ChatEvent::UserLeft { username }),
        };

        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// Publish an event after bringing the state snapshot up to date.
    fn emit(&self, event: ChatEvent) {
        self.refresh_state();
        self.events.publish(event);
    }

    fn refresh_state(&self) {
        let next = ClientState {
            status: self.status,
            session: self.session.state(),
        };
        self.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }
}

fn encode_outbound(message: &OutboundMessage) -> Option<Vec<u8>> {
    match encode_json(message) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("Failed to encode outbound message: {}", e);
            None
        }
    }
}
