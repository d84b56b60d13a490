use std::sync::Arc;
use std::time::Duration;

use roomfeed::{
    AuthProvider, ErrorKind, FeedConfig, InMemoryAuthProvider, InMemoryMessageStore, MessageView,
    RenderSurface, Room, RoomFeedController,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One line of shell input
#[derive(Debug, PartialEq)]
enum Command {
    Register { email: String, password: String },
    Login { email: String, password: String },
    Logout,
    Join(String),
    Rooms,
    Quit,
    Send(String),
    Invalid(&'static str),
}

impl Command {
    fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if !trimmed.starts_with('/') {
            return Command::Send(line.to_string());
        }

        let mut parts = trimmed.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match (name, args.as_slice()) {
            ("/register", [email, password]) => Command::Register {
                email: email.to_string(),
                password: password.to_string(),
            },
            ("/login", [email, password]) => Command::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            ("/register", _) => Command::Invalid("usage: /register <email> <password>"),
            ("/login", _) => Command::Invalid("usage: /login <email> <password>"),
            ("/logout", []) => Command::Logout,
            ("/join", [room]) => Command::Join(room.to_string()),
            ("/join", _) => Command::Invalid("usage: /join <room>"),
            ("/rooms", []) => Command::Rooms,
            ("/quit", []) => Command::Quit,
            _ => Command::Invalid("unknown command"),
        }
    }
}

/// Prints the feed to stdout
struct ConsoleSurface;

impl RenderSurface for ConsoleSurface {
    fn reset(&mut self, room: &Room) {
        println!("== #{} - {} ==", room.id, room.description);
    }

    fn render(&mut self, messages: &[MessageView]) {
        if messages.is_empty() {
            println!("No messages yet. Start the conversation!");
            return;
        }
        println!("----");
        for message in messages {
            let marker = if message.is_own_message { "*" } else { " " };
            println!(
                "{}[{}] {}: {}",
                marker, message.time_label, message.author_label, message.text
            );
        }
    }

    fn on_error(&mut self, kind: ErrorKind, detail: &str) {
        eprintln!("! {} failed: {}", kind, detail);
    }
}

enum Input {
    Line(Option<String>),
    Feed(Option<roomfeed::FeedEvent>),
    Auth(Result<roomfeed::AuthChange, tokio::sync::broadcast::error::RecvError>),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomfeed=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match FeedConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let mut store = InMemoryMessageStore::new();
    if let Some(delay) = std::env::var("ROOMFEED_ACK_DELAY_MS")
        .ok()
        .and_then(|s| s.parse().ok())
    {
        store = store.with_ack_delay(Duration::from_millis(delay));
    }

    let auth = Arc::new(InMemoryAuthProvider::new());
    let mut auth_changes = auth.subscribe();

    let mut controller =
        match RoomFeedController::new(config, auth.clone(), Arc::new(store), ConsoleSurface) {
            Ok(controller) => controller,
            Err(e) => {
                error!(error = %e, "Failed to build room feed");
                std::process::exit(1);
            }
        };

    info!("Room feed shell started");
    println!("Commands: /register, /login, /logout, /join <room>, /rooms, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line.unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read stdin");
                None
            })),
            event = controller.next_event() => Input::Feed(event),
            change = auth_changes.recv() => Input::Auth(change),
        };

        match input {
            Input::Line(None) => break,
            Input::Line(Some(line)) => match Command::parse(&line) {
                Command::Quit => break,
                Command::Register { email, password } => {
                    if let Err(e) = auth.sign_up(&email, &password).await {
                        eprintln!("Registration failed: {}", e);
                    }
                }
                Command::Login { email, password } => {
                    if let Err(e) = auth.sign_in(&email, &password).await {
                        eprintln!("Login failed: {}", e);
                    }
                }
                Command::Logout => auth.sign_out().await,
                Command::Join(room_id) => {
                    if auth.current_identity().is_none() {
                        eprintln!("Please log in first");
                    } else if let Err(e) = controller.activate(&room_id) {
                        eprintln!("{}", e);
                    }
                }
                Command::Rooms => {
                    for room in controller.config().rooms.rooms() {
                        println!("#{} - {}", room.id, room.display_name);
                    }
                }
                Command::Send(text) => {
                    if let Err(e) = controller.send_current(&text) {
                        eprintln!("{}", e);
                    }
                }
                Command::Invalid(usage) => eprintln!("{}", usage),
            },
            Input::Feed(Some(event)) => controller.handle_event(event),
            Input::Feed(None) => break,
            Input::Auth(Ok(change)) => {
                if let Err(e) = controller.on_auth_change(change) {
                    eprintln!("{}", e);
                }
            }
            Input::Auth(Err(e)) => warn!(error = %e, "Missed auth changes"),
        }
    }

    controller.deactivate();
    info!("Room feed shell stopped");
}
