//! Socket driver task and the command handle used by the presentation layer.
//!
//! The driver is a single tokio task that owns the `TcpStream` and the
//! [`ConnectionManager`]. It waits on three things at once: commands from
//! [`ChatClient`] handles, completion of a pending connect, and readability of
//! the open socket. All connection state is touched only from this task, so no
//! locks are involved.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::manager::{ClientState, ConnectionManager, ConnectionStatus};
use crate::config::ClientConfig;
use crate::error::{ClientError, TransportErrorKind};
use crate::events::{EventPublisher, EventReceiver};

/// Commands queued by [`ChatClient`].
#[derive(Debug)]
enum Command {
    Connect { host: String, port: u16 },
    Login(String),
    SendMessage(String),
    Disconnect,
}

type ConnectFuture = Pin<Box<dyn Future<Output = Result<TcpStream, TransportErrorKind>> + Send>>;

/// Socket side of the connection.
enum Link {
    Idle,
    Connecting(ConnectFuture),
    Open(TcpStream),
}

enum LinkEvent {
    Connected(Result<TcpStream, TransportErrorKind>),
    Read(io::Result<usize>),
}

/// Handle for issuing commands to the connection driver.
///
/// Every command is a non-blocking enqueue. Cloning the handle is cheap; the
/// driver shuts down and closes the socket once all handles are dropped.
///
/// # Example
///
/// ```ignore
/// let (client, mut events) = ChatClient::spawn(ClientConfig::default());
/// client.connect("127.0.0.1", 1967)?;
///
/// while let Some(event) = events.recv().await {
///     match event {
///         ChatEvent::Connected => client.login("alice")?,
///         ChatEvent::MessageReceived { sender, text } => println!("{}: {}", sender, text),
///         _ => {}
///     }
/// }
/// ```
#[derive(Clone)]
pub struct ChatClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ClientState>,
}

impl ChatClient {
    /// Start the driver task on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(config: ClientConfig) -> (Self, EventReceiver) {
        let (events, event_rx) = EventPublisher::channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(events, config.max_frame_size);
        let state = manager.watch_state();

        let driver = Driver {
            manager,
            link: Link::Idle,
            commands: command_rx,
            connect_timeout: config.connect_timeout(),
            read_chunk_size: config.read_chunk_size,
        };
        tokio::spawn(driver.run());

        (
            Self {
                commands: command_tx,
                state,
            },
            event_rx,
        )
    }

    /// Connect to a chat server. Ignored if already connecting or connected.
    pub fn connect(&self, host: impl Into<String>, port: u16) -> Result<(), ClientError> {
        self.send(Command::Connect {
            host: host.into(),
            port,
        })
    }

    /// Send a login request. No effect unless connected.
    pub fn login(&self, username: impl Into<String>) -> Result<(), ClientError> {
        self.send(Command::Login(username.into()))
    }

    /// Send a chat line. Empty text is ignored.
    pub fn send_message(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.send(Command::SendMessage(text.into()))
    }

    /// Close the connection.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.send(Command::Disconnect)
    }

    /// Latest connection snapshot. It is updated before the event that
    /// announces the change is published.
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state().status
    }

    pub fn is_logged_in(&self) -> bool {
        self.state().is_logged_in()
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }
}

struct Driver {
    manager: ConnectionManager,
    link: Link,
    commands: mpsc::UnboundedReceiver<Command>,
    connect_timeout: Duration,
    read_chunk_size: usize,
}

impl Driver {
    async fn run(mut self) {
        let mut scratch = vec![0u8; self.read_chunk_size];

        loop {
            tokio::select! {
                // Commands first, so a disconnect queued behind a connect
                // cancels the attempt before it is polled.
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = next_link_event(&mut self.link, &mut scratch) => {
                    self.handle_link_event(event, &scratch);
                }
            }
            self.sync_link();
        }

        debug!("All chat client handles dropped, shutting down driver");
        if let Link::Open(mut stream) = std::mem::replace(&mut self.link, Link::Idle) {
            if let Err(e) = stream.shutdown().await {
                debug!("Error shutting down socket: {}", e);
            }
        }
        self.manager.on_disconnected();
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { host, port } => {
                if self.manager.begin_connect(&host, port) {
                    self.link = Link::Connecting(connect(host, port, self.connect_timeout));
                }
            }
            Command::Login(username) => {
                if let Some(frame) = self.manager.login_frame(&username) {
                    self.write_frame(&frame).await;
                }
            }
            Command::SendMessage(text) => {
                if let Some(frame) = self.manager.chat_frame(&text) {
                    self.write_frame(&frame).await;
                }
            }
            Command::Disconnect => {
                match std::mem::replace(&mut self.link, Link::Idle) {
                    Link::Open(mut stream) => {
                        if let Err(e) = stream.shutdown().await {
                            debug!("Error shutting down socket: {}", e);
                        }
                    }
                    Link::Connecting(_) => info!("Connection attempt cancelled"),
                    Link::Idle => {}
                }
                self.manager.on_disconnected();
            }
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent, scratch: &[u8]) {
        match event {
            LinkEvent::Connected(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Failed to set TCP_NODELAY: {}", e);
                }
                self.link = Link::Open(stream);
                self.manager.on_connected();
            }
            LinkEvent::Connected(Err(kind)) => {
                self.link = Link::Idle;
                self.manager.on_connect_failed(kind);
            }
            LinkEvent::Read(Ok(0)) => {
                self.manager.on_transport_error(TransportErrorKind::RemoteClosed);
            }
            LinkEvent::Read(Ok(n)) => {
                self.manager.on_bytes_available(&scratch[..n]);
            }
            LinkEvent::Read(Err(e)) => {
                debug!("Socket read failed: {}", e);
                self.manager.on_transport_error(TransportErrorKind::from(&e));
            }
        }
    }

    async fn write_frame(&mut self, frame: &[u8]) {
        let Link::Open(stream) = &mut self.link else {
            debug!("No open connection, dropping {} byte frame", frame.len());
            return;
        };

        let written = stream.write_all(frame).await;
        if let Err(e) = written {
            warn!("Socket write failed: {}", e);
            self.manager.on_transport_error(TransportErrorKind::from(&e));
        }
    }

    /// Drop the socket once the manager has given up on the connection.
    fn sync_link(&mut self) {
        if self.manager.status() == ConnectionStatus::Disconnected {
            self.link = Link::Idle;
        }
    }
}

/// Wait for the next thing to happen on the socket. Pends forever when idle.
async fn next_link_event(link: &mut Link, scratch: &mut [u8]) -> LinkEvent {
    match link {
        Link::Idle => std::future::pending().await,
        Link::Connecting(connecting) => LinkEvent::Connected(connecting.as_mut().await),
        Link::Open(stream) => LinkEvent::Read(stream.read(scratch).await),
    }
}

/// Start a bounded connection attempt.
fn connect(host: String, port: u16, limit: Duration) -> ConnectFuture {
    Box::pin(async move {
        match timeout(limit, resolve_and_connect(&host, port)).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Connecting to {}:{} timed out after {:?}", host, port, limit);
                Err(TransportErrorKind::Timeout)
            }
        }
    })
}

/// Resolve the host and connect to the first reachable address.
///
/// A failed lookup is reported as an unreachable host.
async fn resolve_and_connect(host: &str, port: u16) -> Result<TcpStream, TransportErrorKind> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|e| {
            debug!("Failed to resolve {}: {}", host, e);
            TransportErrorKind::HostUnreachable
        })?
        .collect();

    if addrs.is_empty() {
        return Err(TransportErrorKind::HostUnreachable);
    }

    TcpStream::connect(&addrs[..]).await.map_err(|e| {
        debug!("Failed to connect to {}:{}: {}", host, port, e);
        TransportErrorKind::from(&e)
    })
}
