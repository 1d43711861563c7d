//! Lets Talk backend server.
//!
//! Serves the account/session REST API and the real-time presence channel.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use lets_talk::{
    AuthManager, ConnectionHub, PresenceRegistry, PresenceService,
    clock::{Clock, SystemClock},
    db::{Database, InMemoryUserRepository, PgUserRepository, UserRepository},
    email::{LogMailer, Mailer, SmtpMailer},
};
use lt_server::{
    api::{self, AppState},
    config::ServerConfig,
    logging, metrics,
};
use pico_args::Arguments;
use tracing::{info, warn};

const HELP: &str = "\
Run the Lets Talk backend server

USAGE:
  lt_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8000]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/lets_talk]

FLAGS:
  --in-memory              Keep accounts in process memory instead of PostgreSQL
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8000)
  DATABASE_URL             PostgreSQL connection string
  JWT_SECRET               JWT signing secret (required)
  PASSWORD_PEPPER          Password hashing pepper (required)
  FRONTEND_URL             Extra allowed CORS origins, comma separated
  SMTP_HOST                SMTP relay; codes are only logged when unset
  METRICS_BIND             Prometheus exporter address
  (See .env.example for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        in_memory: pargs.contains("--in-memory"),
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics available at http://{}/metrics", addr);
    }

    let (users, database): (Arc<dyn UserRepository>, Option<Database>) = if args.in_memory {
        warn!("Using in-memory user store, accounts are lost on restart");
        (Arc::new(InMemoryUserRepository::new()), None)
    } else {
        info!("Connecting to database");
        let db = Database::new(&config.database)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
        db.ensure_schema()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to apply schema: {}", e))?;
        info!("Database connected successfully");
        (Arc::new(PgUserRepository::new(db.pool().clone())), Some(db))
    };

    let mailer: Arc<dyn Mailer> = match &config.email {
        Some(email) => {
            info!("Sending one-time codes through {}", email.smtp_host);
            Arc::new(SmtpMailer::new(email)?)
        }
        None => {
            warn!("SMTP_HOST not set, one-time codes will only be logged");
            Arc::new(LogMailer)
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let auth_manager = Arc::new(AuthManager::new(
        users.clone(),
        mailer,
        clock.clone(),
        config.security.password_pepper.clone(),
        &config.security.jwt_secret,
    ));

    let hub = Arc::new(ConnectionHub::new());
    let presence = PresenceService::new(
        Arc::new(PresenceRegistry::new()),
        hub.clone(),
        users,
        clock,
    );

    let state = AppState {
        auth_manager,
        presence,
        hub,
        database: database.clone(),
        cookie_secure: config.security.cookie_secure,
        cors_origins: config.cors_origins.clone(),
    };

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
