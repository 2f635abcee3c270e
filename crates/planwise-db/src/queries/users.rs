//! Database query functions for the `users` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;

use crate::models::User;

/// Insert a new user. The caller supplies an already-hashed password.
///
/// A duplicate email fails with a unique violation; use
/// [`is_unique_violation`] on the returned error to detect it.
pub async fn insert_user<'e, E>(
    executor: E,
    full_name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User>
where
    E: PgExecutor<'e>,
{
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (full_name, email, password_hash) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(full_name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(executor)
    .await
    .with_context(|| format!("failed to insert user {email}"))?;

    Ok(user)
}

/// Fetch a user by email (exact match).
pub async fn get_user_by_email<'e, E>(executor: E, email: &str) -> Result<Option<User>>
where
    E: PgExecutor<'e>,
{
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(executor)
        .await
        .context("failed to fetch user by email")?;

    Ok(user)
}

/// Fetch a user by ID.
pub async fn get_user<'e, E>(executor: E, user_id: i64) -> Result<Option<User>>
where
    E: PgExecutor<'e>,
{
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .context("failed to fetch user")?;

    Ok(user)
}

/// Whether an error returned by a query in this crate is a unique-key
/// violation (e.g. a duplicate email).
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_unique_violation())
}
