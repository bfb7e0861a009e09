//! Chat Client Library
//!
//! Client engine for a chat protocol that exchanges length-prefixed JSON
//! messages over a single TCP connection:
//!
//! - `protocol` - Frame codec and message schema
//! - `session` - Login state for the active connection
//! - `connection` - Connection manager and the socket driver task
//! - `events` - Events published to the presentation layer
//! - `config` - Client configuration (file + environment)
//!
//! # Usage
//!
//! ```ignore
//! use chat_client::{ChatClient, ChatEvent, ClientConfig};
//!
//! let (client, mut events) = ChatClient::spawn(ClientConfig::load()?);
//! client.connect("127.0.0.1", 1967)?;
//!
//! while let Some(event) = events.recv().await {
//!     if event == ChatEvent::Connected {
//!         client.login("alice")?;
//!     }
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod protocol;
pub mod session;

pub use config::ClientConfig;
pub use connection::{ChatClient, ClientState, ConnectionStatus};
pub use error::{ClientError, Severity, TransportErrorKind};
pub use events::{ChatEvent, EventReceiver};
pub use session::SessionState;
