use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::env;

const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Connect to the given Postgres URL and bring the schema up to date.
pub async fn connect(url: &str) -> Result<PgPool> {
    if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
        return Err(anyhow::anyhow!(
            "database URL must start with postgres:// or postgresql://"
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .connect(url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run DB migrations")?;

    Ok(pool)
}

/// Connect using the DATABASE_URL environment variable.
pub async fn init_db() -> Result<PgPool> {
    let url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    connect(&url).await
}
