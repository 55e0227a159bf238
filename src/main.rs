//! The crewcall API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crewcall::otp::OtpStore;
use crewcall::relay::Relay;
use crewcall::{routes, util};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let pool = util::connect_to_db()?;
    // a database outage at startup leaves the process serving in degraded
    // mode; requests that need the database fail individually instead
    match sqlx::migrate!().run(&pool).await {
        Ok(()) => tracing::info!("database migrations are up to date"),
        Err(error) => {
            tracing::warn!(%error, "could not run migrations, starting in degraded mode")
        }
    }

    let relay = Arc::new(Relay::new());
    let otp_store = Arc::new(OtpStore::new());
    OtpStore::spawn_sweeper(otp_store.clone());

    let app = routes::app_router(pool, relay, otp_store);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "listening");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
