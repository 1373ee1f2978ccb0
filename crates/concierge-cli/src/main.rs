//! Concierge CLI - command-line client for the admin API.
//!
//! This is the entry point for the `concierge` binary. Every command prints
//! JSON to stdout; logs go to stderr.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use concierge_auth::{
    AdminApi, AuthGateway, BookingQuery, BookingStatus, ClientConfig, EventKind, NotificationBus,
    Period,
};
use concierge_core::{Outcome, Session};
use concierge_dashboard::{Aggregator, GatewaySource};
use concierge_store::{RocksSessionStore, SessionStore};

/// Concierge CLI - command-line client for the admin API.
#[derive(Parser, Debug)]
#[command(name = "concierge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API base URL (overrides `CONCIERGE_BASE_URL`).
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Session database directory (overrides `CONCIERGE_STORE_PATH`).
    #[arg(long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session.
    Login {
        /// Account email.
        #[arg(long, env = "CONCIERGE_EMAIL")]
        email: String,

        /// Account password.
        #[arg(long, env = "CONCIERGE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out locally and remotely.
    Logout,

    /// Validate the stored session and print the signed-in user.
    Whoami,

    /// Load the dashboard.
    Dashboard {
        /// Only reload the revenue charts.
        #[arg(long)]
        revenue_only: bool,

        /// Number of recent bookings to include.
        #[arg(long, default_value_t = concierge_dashboard::DEFAULT_RECENT_LIMIT)]
        recent: u32,
    },

    /// List bookings.
    Bookings {
        /// Filter by status (pending, confirmed, completed, cancelled).
        #[arg(long)]
        status: Option<String>,

        /// Free-text search.
        #[arg(long)]
        search: Option<String>,

        /// Page number.
        #[arg(long)]
        page: Option<u32>,

        /// Page size.
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Print revenue analytics for a period (7d, 30d, 90d).
    Revenue {
        /// Reporting period.
        #[arg(long, default_value = "7d")]
        period: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,concierge=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ClientConfig::from_env().context("invalid configuration")?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(store) = args.store {
        config.store_path = store;
    }

    tracing::debug!(
        base_url = %config.base_url,
        store_path = %config.store_path,
        "Configuration loaded"
    );

    let store: Arc<dyn SessionStore> = Arc::new(
        RocksSessionStore::open(&config.store_path)
            .with_context(|| format!("failed to open session store at {}", config.store_path))?,
    );

    let bus = Arc::new(NotificationBus::new());
    bus.subscribe(EventKind::SessionExpired, |_| {
        eprintln!("Session expired. Run `concierge login` to sign in again.");
    });

    let gateway = AuthGateway::new(config, store, Arc::clone(&bus));

    match args.command {
        Command::Login { email, password } => {
            let session = gateway.login(&email, &password).await?;
            print_json(&session_json(&session))?;
        }
        Command::Logout => {
            if let Some(remote) = gateway.logout() {
                remote.await.context("remote logout task failed")?;
            }
            print_json(&json!({ "signedIn": false }))?;
        }
        Command::Whoami => match gateway.validate_session().await {
            Some(session) => print_json(&session_json(&session))?,
            None => bail!("not signed in"),
        },
        Command::Dashboard {
            revenue_only,
            recent,
        } => {
            let aggregator = Aggregator::new(Arc::new(GatewaySource::new(gateway.clone())))
                .with_recent_limit(recent);
            let output = if revenue_only {
                serde_json::to_value(aggregator.refresh_revenue().await)?
            } else {
                serde_json::to_value(aggregator.load_composite().await)?
            };
            settle_expiry(&gateway).await;
            print_json(&output)?;
        }
        Command::Bookings {
            status,
            search,
            page,
            limit,
        } => {
            let query = BookingQuery {
                status: status.as_deref().map(str::parse::<BookingStatus>).transpose()?,
                search,
                page,
                limit,
            };
            let api = AdminApi::new(gateway.clone());
            let outcome = api.list_bookings(&query).await;
            print_json(&resolve(&gateway, outcome).await?)?;
        }
        Command::Revenue { period } => {
            let period: Period = period.parse()?;
            let api = AdminApi::new(gateway.clone());
            let outcome = api.analytics_revenue(period).await;
            print_json(&resolve(&gateway, outcome).await?)?;
        }
    }

    Ok(())
}

/// Let a pending expiry notice fire before the process exits.
async fn settle_expiry(gateway: &AuthGateway) {
    if gateway.is_handling_expiry() {
        tokio::time::sleep(gateway.config().expiry_notice_delay() * 2).await;
    }
}

/// Turn a resource outcome into output, reporting an expired session as a
/// signed-out state once the expiry notice has been shown.
async fn resolve(gateway: &AuthGateway, outcome: Outcome<Value>) -> anyhow::Result<Value> {
    settle_expiry(gateway).await;
    match outcome {
        Ok(value) => Ok(value),
        Err(err) if err.is_auth_expired() => bail!("not signed in"),
        Err(err) => Err(err.into()),
    }
}

fn session_json(session: &Session) -> Value {
    json!({
        "signedIn": true,
        "user": session.subject.to_value(),
        "issuedLocally": session.issued_locally,
    })
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
