use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use manafiles_core::user::Signup;
use manafiles_db::{Database, SqliteDatabase};
use manafiles_server::config::{ServerConfig, DEFAULT_LOG_FILTER};
use manafiles_server::{reaper, InnerAppState};
use manafiles_service::{FileService, LocalService};

#[derive(Parser)]
#[command(name = "manafiles-server", version, about = "Personal file manager backend")]
struct Cli {
    #[command(flatten)]
    config: ServerConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    AddUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// List accounts (no password hashes)
    ListUsers,
    /// Delete expired sessions and password reset codes
    PurgeSessions,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open(&config.db_config())?);
    let store = manafiles_store::create_store(&config.store_config())?;
    let service = LocalService::new(db.clone(), store).with_session_ttl(config.session_ttl());

    match cli.command {
        Some(Commands::AddUser {
            username,
            password,
            email,
        }) => {
            let user = service
                .signup(&Signup {
                    username,
                    email,
                    password,
                })
                .await?;
            eprintln!("Created user {} (id: {})", user.username, user.id);
        }
        Some(Commands::ListUsers) => {
            let users = db.list_users().await?;
            if users.is_empty() {
                eprintln!("No users found.");
            } else {
                println!("{:<38} {:<20} {:<28} CREATED", "ID", "USERNAME", "EMAIL");
                for user in users {
                    println!(
                        "{:<38} {:<20} {:<28} {}",
                        user.id,
                        user.username,
                        user.email.as_deref().unwrap_or("-"),
                        user.created_at.format("%Y-%m-%d %H:%M:%S"),
                    );
                }
            }
        }
        Some(Commands::PurgeSessions) => {
            let removed = db.purge_expired(Utc::now()).await?;
            eprintln!("Removed {removed} expired session(s) and reset code(s)");
        }
        None => {
            let addr = config.addr();
            tokio::spawn(reaper::run_reaper(db.clone(), config.purge_interval_secs));

            let state = Arc::new(InnerAppState {
                service,
                max_upload_bytes: config.max_upload_bytes(),
            });
            let listener = TcpListener::bind(addr).await?;
            info!("manafiles-server listening on http://{addr}");

            manafiles_server::serve(listener, state).await?;
        }
    }

    Ok(())
}
