//! Mural terminal client.
//!
//! Every mutating command goes through the feed controller and prints the
//! refreshed feed afterwards.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use mural_client::view::{feed_view, render_feed};
use mural_client::{
    ClientConfig, FeedController, HttpApi, RestoreOutcome, SessionStore, SqliteStorage,
};
use mural_shared::protocol::RegisterRequest;

#[derive(Parser)]
#[command(name = "mural")]
#[command(about = "Read and write the Mural feed from the terminal")]
#[command(version)]
struct Cli {
    /// API base URL (overrides MURAL_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember the session
    Login {
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Create an account and log in
    Register {
        name: String,

        email: String,

        #[arg(short, long)]
        password: String,

        /// Avatar URL
        #[arg(long)]
        avatar: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Print the feed
    Feed,

    /// Publish a post
    Post { content: String },

    /// Like or unlike a post
    Like { post_id: String },

    /// Comment on a post
    Comment { post_id: String, content: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    mural_client::init_tracing();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }

    let storage = SqliteStorage::open_at(&config.session_db_path())
        .context("Failed to open session storage")?;
    let http = HttpApi::new(&config)?;
    let session = Arc::new(SessionStore::new(http.clone(), storage));

    if let RestoreOutcome::Cleared(reason) = session.init().await {
        eprintln!("Stored session was discarded ({reason}); please log in again.");
    }

    // A 401 on any feed mutation logs the stored session out.
    let feed = FeedController::with_invalidator(
        http.with_session(session.subscribe()),
        session.subscribe(),
        session.clone(),
    );
    let shows_feed = matches!(
        cli.command,
        Commands::Feed | Commands::Post { .. } | Commands::Like { .. } | Commands::Comment { .. }
    );

    match cli.command {
        Commands::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            println!("Logged in as {} <{}>", user.name, user.email);
        }
        Commands::Register {
            name,
            email,
            password,
            avatar,
        } => {
            let req = RegisterRequest {
                name,
                email,
                password,
                avatar,
            };
            let user = session.register(&req).await?;
            println!("Welcome, {}!", user.name);
        }
        Commands::Logout => {
            session.logout()?;
            println!("Logged out.");
        }
        Commands::Whoami => match session.current_user() {
            Some(user) => println!("{} <{}> (id {})", user.name, user.email, user.id),
            None => println!("Not logged in."),
        },
        Commands::Feed => {
            let _ = feed.load().await;
        }
        Commands::Post { content } => {
            feed.create_post(&content).await?;
        }
        Commands::Like { post_id } => {
            feed.like(&post_id).await?;
        }
        Commands::Comment { post_id, content } => {
            feed.set_draft(&post_id, content);
            feed.submit_draft(&post_id).await?;
        }
    }

    if !shows_feed {
        return Ok(());
    }

    let snapshot = feed.snapshot();
    print!("{}", render_feed(&feed_view(&snapshot, session.current_user().as_ref())));
    if !snapshot.loaded {
        bail!("Feed unavailable");
    }
    Ok(())
}
