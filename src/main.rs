//! # Intake — Application Intake Service
//!
//! Tracks user-submitted applications (requests, offers, complaints).
//! Submitted applications are automatically completed after a configurable
//! delay by a background scheduler; operators can resolve or delete them
//! first. Status changes are pushed to dashboard clients over WebSocket.
//!
//! Usage:
//!   intake                          # Start the server (default port 8080)
//!   intake --port 9090              # Custom port
//!   intake --init-admin             # Create the default admin user

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

use intake_core::IntakeConfig;
use intake_gateway::{AppState, EventHub};
use intake_scheduler::StatusScheduler;
use intake_store::IntakeDb;

const DEFAULT_ADMIN_PASSWORD: &str = "intake-admin";
const DEFAULT_JWT_SECRET: &str = "intake-dev-secret";

#[derive(Parser)]
#[command(
    name = "intake",
    version,
    about = "📋 Intake — application tracking with automatic status transitions"
)]
struct Cli {
    /// Path to config.toml (default: ~/.intake/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Database path (overrides config)
    #[arg(long)]
    db_path: Option<String>,

    /// Create the admin user and exit
    #[arg(long)]
    init_admin: bool,

    /// Admin username (used with --init-admin)
    #[arg(long, default_value = "admin")]
    admin_username: String,

    /// Admin password (used with --init-admin)
    #[arg(long, default_value = DEFAULT_ADMIN_PASSWORD)]
    admin_password: String,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "intake=debug,tower_http=debug"
    } else {
        "intake=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Load config
    let mut config = match &cli.config {
        Some(path) => IntakeConfig::load_from(std::path::Path::new(path))?,
        None => IntakeConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(db_path) = &cli.db_path {
        config.database.path = db_path.clone();
    }

    // Open database
    let db_path = config.database.resolved_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Arc::new(IntakeDb::open(&db_path).map_err(|e| anyhow::anyhow!("{e}"))?);
    tracing::info!("💾 Database ready: {}", db_path.display());

    // --init-admin: create the admin user and exit
    if cli.init_admin {
        match db.get_user_by_username(&cli.admin_username) {
            Ok(Some(_)) => println!("⚠️  User '{}' already exists.", cli.admin_username),
            _ => {
                let hash = intake_gateway::auth::hash_password(&cli.admin_password)
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                db.create_user(&cli.admin_username, &hash)
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                println!("✅ Admin user created:");
                println!("   Username: {}", cli.admin_username);
                println!("   Password: {}", cli.admin_password);
            }
        }
        return Ok(());
    }

    // First run — make sure someone can log in
    if db.count_users().map_err(|e| anyhow::anyhow!("{e}"))? == 0 {
        println!("📝 No users found. Creating default admin...");
        let hash = intake_gateway::auth::hash_password(DEFAULT_ADMIN_PASSWORD)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        db.create_user("admin", &hash)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("   Username: admin");
        println!("   Password: {DEFAULT_ADMIN_PASSWORD}");
        println!("   ⚠️  Change this password after first login!\n");
    }

    let jwt_secret = {
        let secret = config.auth.effective_secret();
        if secret.is_empty() {
            tracing::warn!(
                "⚠️  Using DEFAULT JWT secret! Set INTAKE_JWT_SECRET env var for production."
            );
            DEFAULT_JWT_SECRET.to_string()
        } else {
            secret
        }
    };

    // Wire the event hub and the status scheduler
    let hub = Arc::new(EventHub::new());
    let scheduler = Arc::new(StatusScheduler::new(
        config.scheduler.clone(),
        db.clone(),
        hub.clone(),
    ));

    // Rebuild pending state from the database before serving traffic
    scheduler.recover_pending().await;

    // Background poll loop
    let shutdown = Arc::new(Notify::new());
    let poll_handle = scheduler.clone().spawn(shutdown.clone());

    let state = Arc::new(AppState {
        config,
        db,
        scheduler,
        hub,
        jwt_secret,
        start_time: std::time::Instant::now(),
        login_attempts: std::sync::Mutex::new(std::collections::HashMap::new()),
    });

    intake_gateway::server::serve(state, async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
    })
    .await?;

    // Stop the poll loop promptly, even mid-sleep
    shutdown.notify_one();
    poll_handle.await.ok();
    tracing::info!("Intake server stopped");

    Ok(())
}
