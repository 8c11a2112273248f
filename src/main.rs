use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use islandpet::{api, config::AppConfig, db, push, service};

#[derive(Parser)]
#[command(name = "islandpet")]
#[command(about = "Backend for the IslandPet Live Activity widget")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the IslandPet server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "islandpet=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let port = match cli.command {
        Some(Commands::Serve { port }) => port,
        None => 8080,
    };

    serve(port).await
}

async fn serve(port: u16) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    let db = match &config.db_path {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;

    // No push can ever succeed without the signing key, so a load failure
    // aborts startup instead of limping along.
    let credentials = Arc::new(push::ApnsCredentials::load(
        &config.apns.team_id,
        &config.apns.key_id,
        &config.apns.key_path,
    )?);
    let apns = push::ApnsClient::new(
        &config.apns.base_url,
        &config.apns.bundle_id,
        credentials,
        config.push_timeout,
    )?;
    tracing::info!(gateway = %config.apns.base_url, "APNs client ready");

    spawn_decay_task(db.clone(), apns.clone(), &config);

    let app = api::create_router(api::AppState {
        db,
        apns,
        staleness: config.staleness,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("IslandPet server listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run the decay cycle on a fixed cadence for as long as the server lives.
///
/// A failed cycle is logged and retried on the next tick; it never takes the
/// server down.
fn spawn_decay_task(db: db::Database, apns: push::ApnsClient, config: &AppConfig) {
    let staleness = config.staleness;
    let interval = config.decay_interval;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so a restart loop
        // doesn't hammer the gateway.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = service::run_decay_cycle(&db, &apns, staleness).await {
                tracing::error!("Decay cycle failed: {:#}", err);
            }
        }
    });
}
