//! internship-lms - HTTP service for the internship LMS

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use internship_lms::auth::JwtValidator;
use internship_lms::services::spawn_logging_listener;
use internship_lms::{Config, HttpServer, LmsDb, Services};

#[derive(Parser, Debug)]
#[command(name = "internship-lms")]
#[command(about = "Internship learning-management API server")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long)]
    http_port: Option<u16>,

    /// Secret for signing bearer tokens (at least 32 characters)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Shared secret for the one-time admin bootstrap endpoint
    #[arg(long, env = "ADMIN_BOOTSTRAP_TOKEN", hide_env_values = true)]
    bootstrap_token: Option<String>,

    /// Development mode (fixed token secret)
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("internship_lms=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if args.dev {
        config.dev_mode = true;
    }

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        dev_mode = config.dev_mode,
        "Starting internship-lms"
    );

    // Ensure storage directory exists
    tokio::fs::create_dir_all(&config.storage_dir).await?;

    // Save default config if it doesn't exist; secrets from the environment
    // are not written to disk
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    if let Some(secret) = args.jwt_secret {
        config.jwt_secret = Some(secret);
    }
    if let Some(token) = args.bootstrap_token {
        config.bootstrap_token = Some(token);
    }

    let jwt = if config.dev_mode {
        warn!("Dev mode: bearer tokens use a fixed secret");
        JwtValidator::new_dev()
    } else {
        JwtValidator::new(
            config.jwt_secret.clone().unwrap_or_default(),
            config.jwt_expiry_secs,
        )?
    };

    if config.bootstrap_token.is_none() {
        info!("Admin bootstrap disabled (no bootstrap token configured)");
    }

    let db = Arc::new(LmsDb::open(&config.storage_dir)?);
    let stats = db.stats()?;
    info!(
        users = stats.user_count,
        courses = stats.course_count,
        completions = stats.completion_count,
        "Database ready"
    );

    let services = Arc::new(Services::new(db, jwt, config.bootstrap_token.clone()));
    let _listener = spawn_logging_listener(services.events.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let server = Arc::new(HttpServer::new(services, addr));

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
