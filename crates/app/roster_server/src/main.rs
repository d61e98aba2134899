//! Roster API server binary.
//!
//! `roster_server` with no subcommand serves the HTTP API. The remaining
//! subcommands are one-shot administrative tasks against the same store.

pub use self::error::{Error, Result};
mod error;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use roster_api::AppState;
use roster_api::config::ApiConfig;
use roster_core::store::{MemoryStore, PgStore, Store};
use roster_core::{codes, platform};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, StoreArgs};

mod cli;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Logs go to stderr; command output goes to stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,roster_api=debug,roster_core=debug")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    let command = args.command.unwrap_or(Commands::Serve { port: None });
    if args.store.in_memory && !matches!(command, Commands::Serve { .. }) {
        return Err(Error::Custom(
            "--in-memory only applies to `serve`".to_string(),
        ));
    }
    let (store, pool) = open_store(&args.store).await?;

    match command {
        Commands::Serve { port } => {
            let normalized = platform::normalize_roles(store.as_ref()).await?;
            if normalized > 0 {
                info!(normalized, "legacy platform roles rewritten");
            }
            bootstrap_from_env(store.as_ref()).await?;
            serve(store, &args.store, port).await?;
        }
        Commands::CreateSuperadmin {
            email,
            password,
            username,
        } => {
            let (identity, created) =
                platform::bootstrap_super_admin(store.as_ref(), &email, &password, username.as_deref())
                    .await?;
            let verb = if created { "created" } else { "promoted" };
            println!("super-admin {verb}: {} ({})", identity.email, identity.id);
        }
        Commands::NormalizeRoles => {
            let normalized = platform::normalize_roles(store.as_ref()).await?;
            println!("normalized {normalized} platform role(s)");
        }
        Commands::PurgeCodes => {
            let purged = codes::purge_expired(store.as_ref(), Utc::now()).await?;
            println!("purged {purged} expired verification code(s)");
        }
    }

    if let Some(pool) = pool {
        pool.close().await;
    }
    Ok(())
}

/// Connect and migrate Postgres, or build an in-process store.
async fn open_store(args: &StoreArgs) -> Result<(Arc<dyn Store>, Option<PgPool>)> {
    if args.in_memory {
        warn!("using in-memory store; state is lost on exit");
        return Ok((Arc::new(MemoryStore::new()), None));
    }

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    let store = PgStore::new(pool.clone());
    info!("running database migrations");
    store.migrate().await?;

    Ok((Arc::new(store), Some(pool)))
}

/// `SUPERADMIN_EMAIL` + `SUPERADMIN_PASSWORD` seed a super-admin at startup,
/// which is the only way to get one into an in-memory store.
async fn bootstrap_from_env(store: &dyn Store) -> Result<()> {
    let (Ok(email), Ok(password)) = (
        std::env::var("SUPERADMIN_EMAIL"),
        std::env::var("SUPERADMIN_PASSWORD"),
    ) else {
        return Ok(());
    };
    let (identity, created) = platform::bootstrap_super_admin(store, &email, &password, None).await?;
    info!(user_id = %identity.id, created, "super-admin bootstrapped from environment");
    Ok(())
}

async fn serve(store: Arc<dyn Store>, args: &StoreArgs, port: Option<u16>) -> Result<()> {
    let mut config = ApiConfig::from_env();
    config.database_url = args.database_url.clone();
    if let Some(port) = port {
        config.bind_addr = with_port(&config.bind_addr, port);
    }

    let state = AppState {
        store,
        mailer: config.mailer(),
        config: config.clone(),
    };
    if config.mail_endpoint.is_none() {
        warn!("MAIL_ENDPOINT not set; outgoing mail is logged only");
    }

    let app = roster_api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    let ct = CancellationToken::new();
    tokio::spawn(shutdown_signal(ct.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await?;

    info!("server stopped");
    Ok(())
}

/// Replace the port of a `host:port` bind address.
fn with_port(bind_addr: &str, port: u16) -> String {
    let host = bind_addr
        .rsplit_once(':')
        .map_or(bind_addr, |(host, _)| host);
    format!("{host}:{port}")
}

/// Cancel `ct` on Ctrl-C or SIGTERM.
async fn shutdown_signal(ct: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
    ct.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_port_replaces_only_the_port() {
        assert_eq!(with_port("127.0.0.1:3100", 8080), "127.0.0.1:8080");
        assert_eq!(with_port("0.0.0.0:0", 3100), "0.0.0.0:3100");
        assert_eq!(with_port("localhost", 3100), "localhost:3100");
    }
}
