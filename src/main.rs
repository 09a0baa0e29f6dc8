use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall::config::Config;
use rollcall::db::{self, AppState};
use rollcall::{handlers, sweep};

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "Webhook-driven identity synchronization service")]
struct Cli {
    /// Path to the SQLite database (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    if config.dev_mode {
        tracing::warn!("Running in development mode");
    }
    if config.workos_webhook_secret.is_none() {
        tracing::warn!("WORKOS_WEBHOOK_SECRET not set; WorkOS deliveries will be rejected");
    }
    if config.clerk_webhook_secret.is_none() {
        tracing::warn!("CLERK_WEBHOOK_SECRET not set; Clerk deliveries will be rejected");
    }

    let pool = db::create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = pool.get().expect("Failed to get database connection");
        db::init_db(&conn).expect("Failed to initialize database");
    }
    tracing::info!("Database ready at {}", config.database_path);

    sweep::spawn_sweep_task(pool.clone(), &config);

    let state = AppState {
        db: pool,
        workos_webhook_secret: config.workos_webhook_secret.clone(),
        clerk_webhook_secret: config.clerk_webhook_secret.clone(),
    };

    let app = handlers::webhooks::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
