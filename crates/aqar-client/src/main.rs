use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use aqar_api::ApiConfig;
use aqar_client::commands;
use aqar_client::query::ErrorPresenter;
use aqar_client::AppState;
use aqar_realtime::{LiveConfig, LiveNotification};
use aqar_shared::UserId;
use aqar_store::Database;

#[derive(Parser, Debug)]
#[command(author, version, about = "Aqar marketplace chat client", long_about = None)]
struct Cli {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Page path the request locale is taken from, e.g. /en/properties/12
    #[arg(long, global = true)]
    route: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session
    Login { email: String, password: String },
    /// Forget the session
    Logout,
    /// Show the signed-in profile
    Whoami,
    /// List conversations
    Chats,
    /// Print the unread message count
    Unread,
    /// Chat with a listing owner
    Chat {
        /// User id of the owner
        peer: u64,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("aqar_client=debug,aqar_api=debug,aqar_realtime=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

async fn report_live(mut notifications: mpsc::Receiver<LiveNotification>) {
    while let Some(notification) = notifications.recv().await {
        match notification {
            LiveNotification::Disconnected { reason } => eprintln!("(live updates paused: {reason})"),
            LiveNotification::SubscriptionFailed { channel, reason } => {
                eprintln!("(no live updates for {channel}: {reason})");
            }
            other => tracing::debug!(notification = ?other, "Live status"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let db = match &cli.db {
        Some(path) => Database::open_at(path),
        None => Database::new(),
    }
    .context("Could not open the client database")?;

    // Only the interactive chat renders toasts; one-shot commands report
    // through their exit status.
    let (notice_tx, mut notices) = mpsc::unbounded_channel();
    let presenter = match cli.command {
        Command::Chat { .. } => ErrorPresenter::new(notice_tx),
        _ => ErrorPresenter::silent(),
    };

    let mut state = AppState::open(db, ApiConfig::from_env(), presenter)?;
    if let Some(route) = cli.route {
        state.api.set_route_path(route);
    }

    match cli.command {
        Command::Login { email, password } => commands::auth::login(&state, email, password).await,
        Command::Logout => commands::auth::logout(&state).await,
        Command::Whoami => commands::auth::whoami(&state).await,
        Command::Chats => commands::chats::list_chats(&state).await,
        Command::Unread => commands::chats::unread(&state).await,
        Command::Chat { peer } => {
            if let Some(notifications) = state.connect_live(LiveConfig::from_env()) {
                tokio::spawn(report_live(notifications));
            }
            let outcome = commands::chat::run_chat(&state, UserId(peer), &mut notices).await;
            state.shutdown().await;
            outcome
        }
    }
}
