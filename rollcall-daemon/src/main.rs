//! rollcall daemon - certificate issuance and attendance check-in
//!
//! Serves the HTTP API and provides the provisioning commands that create
//! the authority key, identities and enrollment records.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, FixedOffset, NaiveTime, Utc};
use clap::{Args, Parser, Subcommand};
use rollcall_auth::enrollment::generate_token;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use rollcall_daemon::authority::{generate_key_file, Authority};
use rollcall_daemon::checkin::{CheckinStore, NeverRevoked};
use rollcall_daemon::config::{
    self, Paths, DEFAULT_BIND, DEFAULT_LATE_AFTER, DEFAULT_UTC_OFFSET, DEFAULT_VALIDITY,
};
use rollcall_daemon::db::DbService;
use rollcall_daemon::http::{router, AppState};
use rollcall_daemon::ledger::IssuanceLedger;
use rollcall_daemon::services::{CheckinService, IssuanceService};

// ============================================================================
// CLI Definition
// ============================================================================

/// rollcall daemon - device certificates and attendance check-in
#[derive(Parser)]
#[command(name = "rollcall-daemon", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Data directory (defaults to the platform local data dir)
    #[arg(long, global = true, env = "ROLLCALL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// SQLite database path (defaults to <data-dir>/rollcall.db)
    #[arg(long, global = true, env = "ROLLCALL_DATABASE")]
    database: Option<PathBuf>,

    /// Authority key path, PKCS#8 PEM or DER (defaults to <data-dir>/authority_key.pem)
    #[arg(long, global = true, env = "ROLLCALL_AUTHORITY_KEY")]
    authority_key: Option<PathBuf>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, global = true, env = "ROLLCALL_BIND", default_value = DEFAULT_BIND)]
    bind: SocketAddr,

    /// Certificate validity (e.g., "12h", "30d")
    #[arg(long, global = true, env = "ROLLCALL_VALIDITY", default_value = DEFAULT_VALIDITY, value_parser = config::parse_validity)]
    validity: Duration,

    /// UTC offset used for calendar days and session times
    #[arg(long, global = true, env = "ROLLCALL_UTC_OFFSET", default_value = DEFAULT_UTC_OFFSET, value_parser = config::parse_utc_offset)]
    utc_offset: FixedOffset,

    /// Session start time as <session>=<HH:MM>; repeatable
    #[arg(
        long = "session-start",
        global = true,
        env = "ROLLCALL_SESSION_STARTS",
        value_delimiter = ',',
        value_parser = config::parse_session_start
    )]
    session_starts: Vec<(i64, NaiveTime)>,

    /// Grace period after a session start before check-ins are late
    #[arg(long, global = true, env = "ROLLCALL_LATE_AFTER", default_value = DEFAULT_LATE_AFTER, value_parser = config::parse_duration)]
    late_after: Duration,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default if no command given)
    Serve,

    /// Authority key management
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Identity management
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },

    /// Create an enrollment record with a fresh one-time token
    Enroll {
        /// Identity the certificate will be issued for
        #[arg(long)]
        identity: String,

        /// Record id (used as the certificate id); generated if omitted
        #[arg(long)]
        record_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Generate a new authority key
    Generate {
        /// Replace an existing key
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum IdentityAction {
    /// Register an identity
    Add {
        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let paths = Paths::resolve(cli.data_dir, cli.database, cli.authority_key);

    match cli.command {
        Some(Commands::Key { action }) => cmd_key(&paths, action),
        Some(Commands::Identity { action }) => cmd_identity(&paths, action).await,
        Some(Commands::Enroll {
            identity,
            record_id,
        }) => cmd_enroll(&paths, &identity, record_id).await,
        Some(Commands::Serve) | None => cmd_serve(&paths, cli.serve).await,
    }
}

/// Handle key subcommands.
fn cmd_key(paths: &Paths, action: KeyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        KeyAction::Generate { force } => {
            let public_key = generate_key_file(&paths.authority_key, force)?;
            let fingerprint = rollcall_auth::identity::Fingerprint::from_public_key(&public_key);

            println!("Authority Key Generated");
            println!("=======================");
            println!();
            println!("Path:        {}", paths.authority_key.display());
            println!("Fingerprint: {}", fingerprint);
            println!("Public key:  {}", public_key.to_hex());
            println!();
            println!("Distribute the public key to certificate verifiers.");

            Ok(())
        }
    }
}

/// Handle identity subcommands.
async fn cmd_identity(
    paths: &Paths,
    action: IdentityAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        IdentityAction::Add { id, name } => {
            let db = DbService::open(&paths.database).await?;
            let ledger = IssuanceLedger::new(db.pool().clone());
            ledger.add_identity(&id, &name).await?;

            tracing::info!(identity_id = %id, "Identity added");
            println!("Identity {} ({}) added.", id, name);
            Ok(())
        }
    }
}

/// Create an enrollment record and print its token.
async fn cmd_enroll(
    paths: &Paths,
    identity: &str,
    record_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = DbService::open(&paths.database).await?;
    let ledger = IssuanceLedger::new(db.pool().clone());

    let record_id = record_id
        .unwrap_or_else(|| format!("{}-{}", identity, Utc::now().format("%Y%m%d%H%M%S")));
    let token = generate_token();
    ledger.create_record(&record_id, identity, &token).await?;

    tracing::info!(record_id = %record_id, identity_id = %identity, "Enrollment record created");

    println!("Enrollment Record Created");
    println!("=========================");
    println!();
    println!("Record id: {}", record_id);
    println!("Token:     {}", token);
    println!();
    println!("Share the token with the device out-of-band.");
    println!("It can be redeemed for exactly one certificate.");

    Ok(())
}

/// Start the HTTP server.
async fn cmd_serve(paths: &Paths, args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // No key, no service
    let authority = Arc::new(Authority::load(&paths.authority_key)?);
    tracing::info!(
        path = %paths.authority_key.display(),
        fingerprint = %authority.fingerprint(),
        "Authority key loaded"
    );

    tracing::info!(path = %paths.database.display(), "Opening database");
    let db = DbService::open(&paths.database).await?;

    let ledger = IssuanceLedger::new(db.pool().clone());
    let issuance = IssuanceService::new(ledger.clone(), authority, args.validity);
    let checkin = CheckinService::new(
        ledger,
        CheckinStore::new(db.pool().clone()),
        config::status_policy(&args.session_starts, args.late_after),
        Arc::new(NeverRevoked),
        args.utc_offset,
    );

    let app = router(AppState { issuance, checkin });

    let listener = TcpListener::bind(args.bind).await?;
    tracing::info!(
        addr = %args.bind,
        validity_secs = args.validity.num_seconds(),
        utc_offset = %args.utc_offset,
        sessions = args.session_starts.len(),
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
