use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::{debug, info};

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/planwise-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables owned by the schema, in dependency order (parents first).
pub const PLANNER_TABLES: &[&str] = &[
    "users",
    "calendars",
    "tasks",
    "events",
    "task_assignments",
    "task_comments",
    "task_reminders",
];

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await
        .with_context(|| format!("failed to connect to database at {url}"))
}

/// Create the service's connection pool.
///
/// Workflows check out one connection per transaction and never hold it
/// across a model call, so `max_connections` bounds concurrent writes rather
/// than concurrent requests.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let pool = connect(&config.database_url, config.max_connections).await?;
    debug!(max_connections = config.max_connections, "database pool ready");
    Ok(pool)
}

/// Apply any embedded migrations that have not run yet.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    info!("schema is up to date");
    Ok(())
}

/// `CREATE DATABASE` takes no bind parameters, so names are restricted to
/// characters that need no quoting.
fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Create the configured database on its server if it is missing.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<()> {
    let Some(db_name) = config.database_name() else {
        bail!("no database name in {}", config.database_url);
    };
    if !is_plain_identifier(db_name) {
        bail!("database name {db_name:?} must be ASCII letters, digits or underscores");
    }

    let admin = connect(&config.maintenance_url(), 1).await?;
    let result = create_if_missing(&admin, db_name).await;
    admin.close().await;
    result
}

async fn create_if_missing(admin: &PgPool, db_name: &str) -> Result<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(admin)
            .await
            .context("failed to query pg_database")?;

    if exists {
        info!(db = db_name, "database already exists");
        return Ok(());
    }

    admin
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .with_context(|| format!("failed to create database {db_name}"))?;
    info!(db = db_name, "database created");
    Ok(())
}

/// Row count of every planner table, in [`PLANNER_TABLES`] order.
///
/// Printed by `planwise db-init` on success.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let mut counts = Vec::with_capacity(PLANNER_TABLES.len());
    for table in PLANNER_TABLES {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
        counts.push(((*table).to_string(), count));
    }
    Ok(counts)
}
