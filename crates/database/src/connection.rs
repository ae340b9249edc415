use crate::error::DbError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Establishes a connection pool to the SQLite store.
///
/// A `DATABASE_URL` from the environment (or a `.env` file) takes precedence
/// over the configured url, mirroring how deployment overrides work for the
/// other services sharing the store. The database file is created on first
/// start.
pub async fn connect(url: &str) -> Result<SqlitePool, DbError> {
    // The .env file is optional; ignore a missing one.
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| url.to_string());

    let options = SqliteConnectOptions::from_str(&url)
        .map_err(DbError::Query)?
        .create_if_missing(true)
        // The ingestion process writes to the same file; wait rather than fail.
        .busy_timeout(Duration::from_secs(30));

    // An in-memory database exists per connection, so a pool larger than one
    // would see different (empty) databases. Used by the test suites.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// A utility function to run database migrations automatically.
///
/// Called at startup; a schema mismatch or failed migration is fatal and
/// surfaces immediately rather than allowing partial operation.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    // Use a relative path from the crate root
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
