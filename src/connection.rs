//! Connection lifecycle for the chat client.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  commands  ┌────────────────────┐   TCP   ┌──────────┐
//! │  ChatClient  │ ─────────► │    driver task     │ ◄─────► │  server  │
//! │   handles    │ ◄───────── │ ConnectionManager  │         └──────────┘
//! └──────────────┘   events   └────────────────────┘
//! ```
//!
//! [`ConnectionManager`] is the synchronous state machine (status, receive
//! buffer, session). The driver task owns the socket and feeds it.

mod driver;
mod manager;

pub use driver::ChatClient;
pub use manager::{ClientState, ConnectionManager, ConnectionStatus, RemoteEndpoint};
