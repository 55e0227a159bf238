//! Extra utilities for use elsewhere in the API.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use time::OffsetDateTime;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/crewcall";

pub fn current_time() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Builds the connection pool without reaching out to the database.
///
/// Connections are only opened when the first query runs, so a missing or
/// unreachable database at startup leaves the process serving requests in
/// degraded mode instead of terminating.
pub fn connect_to_db() -> anyhow::Result<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "`DATABASE_URL` not set, falling back to {}",
                DEFAULT_DATABASE_URL
            );
            DEFAULT_DATABASE_URL.to_owned()
        }
    };

    PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(&url)
        .context("Failed to configure database pool")
}

pub fn jwt_secret() -> anyhow::Result<String> {
    std::env::var("JWT_SECRET").context("`JWT_SECRET` not set")
}

pub fn in_production() -> bool {
    std::env::var("APP_ENV")
        .map(|env| env == "production")
        .unwrap_or(false)
}
