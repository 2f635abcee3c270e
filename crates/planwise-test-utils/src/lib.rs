//! Database fixtures for planwise integration tests.
//!
//! Every test gets a fresh, migrated database on a Postgres server that is
//! shared by the whole test binary. The server is `PLANWISE_TEST_PG_URL`
//! when set, otherwise a Postgres 17 container started on first use.

use sqlx::{Executor, PgPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use planwise_db::config::DbConfig;
use planwise_db::pool;

struct TestServer {
    /// Server root, without a database name.
    url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SERVER: OnceCell<TestServer> = OnceCell::const_new();

async fn start_server() -> TestServer {
    if let Ok(url) = std::env::var("PLANWISE_TEST_PG_URL") {
        return TestServer {
            url: url.trim_end_matches('/').to_string(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("17")
        .start()
        .await
        .expect("start postgres container");
    let host = container.get_host().await.expect("container host");
    let port = container.get_host_port_ipv4(5432).await.expect("container port");

    TestServer {
        url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Root URL of the shared test server.
pub async fn pg_url() -> &'static str {
    &SERVER.get_or_init(start_server).await.url
}

async fn admin_pool() -> PgPool {
    let config = DbConfig::new(format!("{}/postgres", pg_url().await)).with_max_connections(1);
    pool::create_pool(&config).await.expect("connect to maintenance database")
}

/// Create and migrate a uniquely named database.
///
/// Returns `(pool, db_name)`; hand `db_name` to [`drop_test_db`] when done.
pub async fn create_test_db() -> (PgPool, String) {
    let db_name = format!("planwise_test_{}", Uuid::new_v4().simple());

    let admin = admin_pool().await;
    admin
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("create {db_name}: {e}"));
    admin.close().await;

    let config = DbConfig::new(format!("{}/{db_name}", pg_url().await)).with_max_connections(5);
    let db = pool::create_pool(&config)
        .await
        .unwrap_or_else(|e| panic!("connect to {db_name}: {e:#}"));
    pool::run_migrations(&db).await.expect("migrate test database");

    (db, db_name)
}

/// Drop a test database, kicking out any connections still attached.
pub async fn drop_test_db(db_name: &str) {
    let admin = admin_pool().await;
    let _ = sqlx::query(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
         WHERE datname = $1 AND pid <> pg_backend_pid()",
    )
    .bind(db_name)
    .execute(&admin)
    .await;
    let _ = admin
        .execute(format!("DROP DATABASE IF EXISTS {db_name}").as_str())
        .await;
    admin.close().await;
}

/// Insert a user (with a throwaway password hash) and a default calendar.
/// Returns `(user_id, calendar_id)`.
pub async fn seed_user(pool: &PgPool, full_name: &str, email: &str) -> (i64, i64) {
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (full_name, email, password_hash) VALUES ($1, $2, 'x') \
         RETURNING user_id",
    )
    .bind(full_name)
    .bind(email)
    .fetch_one(pool)
    .await
    .expect("seed user");

    let calendar_id: i64 = sqlx::query_scalar(
        "INSERT INTO calendars (owner_user_id, name) VALUES ($1, 'My Calendar') \
         RETURNING calendar_id",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("seed calendar");

    (user_id, calendar_id)
}

/// Count rows in a table (test assertions only; the name is not escaped).
pub async fn count_rows(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("count {table}: {e}"))
}
