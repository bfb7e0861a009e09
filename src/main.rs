//! Terminal chat client.
//!
//! Connects to the configured server (or `chat [HOST] [PORT]`), asks for a
//! username, then sends every line typed on stdin as a chat message. Type
//! `/quit` to leave.

use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_client::{ChatClient, ChatEvent, ClientConfig, Severity};

/// Command that leaves the chat.
const QUIT_COMMAND: &str = "/quit";

/// What the next stdin line means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    /// Not connected yet; input is ignored.
    Waiting,
    Username,
    Chat,
}

/// Console rendering state.
struct Console {
    mode: InputMode,
    /// Sender of the previous message, so consecutive lines are grouped.
    last_sender: Option<String>,
}

impl Console {
    fn new() -> Self {
        Self {
            mode: InputMode::Waiting,
            last_sender: None,
        }
    }

    fn prompt_username(&mut self) {
        self.mode = InputMode::Username;
        print!("Username: ");
        if let Err(e) = std::io::stdout().flush() {
            tracing::debug!("Failed to flush stdout: {}", e);
        }
    }

    fn notice(&mut self, text: &str) {
        println!("*** {}", text);
        self.last_sender = None;
    }

    fn message(&mut self, sender: &str, text: &str) {
        if self.last_sender.as_deref() != Some(sender) {
            println!("[{}]", sender);
            self.last_sender = Some(sender.to_string());
        }
        println!("  {}", text);
    }
}

/// Apply overrides from `chat [HOST] [PORT]`.
fn apply_args(config: &mut ClientConfig, args: &[String]) -> Result<()> {
    if let Some(host) = args.first() {
        config.host = host.clone();
    }
    if let Some(port) = args.get(1) {
        config.port = port
            .parse()
            .with_context(|| format!("Invalid port: {}", port))?;
    }
    config.validate()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log to stderr so the transcript on stdout stays readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chat_client=info,chat=info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = ClientConfig::load().context("Failed to load configuration")?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    apply_args(&mut config, &args)?;

    tracing::info!("Starting chat client v{}", env!("CARGO_PKG_VERSION"));

    let (client, mut events) = ChatClient::spawn(config.clone());
    client.connect(config.host.clone(), config.port)?;

    let mut console = Console::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if !handle_event(&mut console, event) {
                    break;
                }
            }
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => handle_line(&mut console, &client, line.trim_end())?,
                    None => {
                        client.disconnect()?;
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("Chat client exited");
    Ok(())
}

/// React to an engine event. Returns `false` when the session is over.
fn handle_event(console: &mut Console, event: ChatEvent) -> bool {
    match event {
        ChatEvent::Connected => console.prompt_username(),
        ChatEvent::LoginSucceeded => {
            console.mode = InputMode::Chat;
            console.notice("Logged in. Type /quit to leave.");
        }
        ChatEvent::LoginFailed { reason } => {
            console.notice(&format!("Login failed: {}", reason));
            console.prompt_username();
        }
        ChatEvent::MessageReceived { sender, text } => console.message(&sender, &text),
        ChatEvent::UserJoined { username } => {
            console.notice(&format!("{} joined the chat", username))
        }
        ChatEvent::UserLeft { username } => console.notice(&format!("{} left the chat", username)),
        ChatEvent::TransportError { kind, severity } => match severity {
            Severity::Warning => console.notice(kind.description()),
            Severity::Error => {
                eprintln!("Error: {}", kind);
                return false;
            }
        },
        ChatEvent::Disconnected => {
            console.notice("The host terminated the connection");
            return false;
        }
    }
    true
}

fn handle_line(console: &mut Console, client: &ChatClient, line: &str) -> Result<()> {
    match console.mode {
        InputMode::Waiting => {}
        InputMode::Username if line.is_empty() => client.disconnect()?,
        InputMode::Username => {
            console.mode = InputMode::Waiting;
            client.login(line)?;
        }
        InputMode::Chat if line == QUIT_COMMAND => client.disconnect()?,
        InputMode::Chat => {
            client.send_message(line)?;
            console.last_sender = None;
        }
    }
    Ok(())
}
