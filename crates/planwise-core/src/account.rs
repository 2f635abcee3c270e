//! Sign-up and login.
//!
//! Passwords are stored as `<salt_hex>$<mac_hex>` where the MAC is
//! HMAC-SHA256 over the password keyed by a random 16-byte salt.

use anyhow::Context;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::PgPool;
use tracing::info;

use planwise_db::models::{Calendar, User};
use planwise_db::queries::{calendars, users};

type HmacSha256 = Hmac<Sha256>;

const SALT_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already exists.")]
    EmailTaken,

    #[error("User not found.")]
    UnknownEmail,

    #[error("Invalid credentials.")]
    WrongPassword,

    #[error("database error: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Public view of a user returned by sign-up and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
        }
    }
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, AccountError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AccountError::Validation(format!("{field} is required")))
}

fn password_mac(salt: &[u8], password: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC can take key of any size");
    mac.update(password.as_bytes());
    mac
}

/// Hash `password` with a fresh random salt.
///
/// This is a fast salted HMAC-SHA256, not a slow password KDF such as argon2.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let digest = password_mac(&salt, password).finalize().into_bytes();
    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

/// Check `password` against a stored hash in constant time. Malformed
/// stored values never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, mac_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(mac_hex)) else {
        return false;
    };
    password_mac(&salt, password).verify_slice(&expected).is_ok()
}

/// Create a user and their default calendar in one transaction.
pub async fn sign_up(
    pool: &PgPool,
    request: &SignupRequest,
) -> Result<(UserProfile, Calendar), AccountError> {
    let full_name = required("fullName", request.full_name.as_deref())?;
    let email = required("email", request.email.as_deref())?;
    let password = request
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AccountError::Validation("password is required".to_string()))?;

    let password_hash = hash_password(password);
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let user = match users::insert_user(&mut *tx, full_name, email, &password_hash).await {
        Ok(user) => user,
        Err(e) if users::is_unique_violation(&e) => return Err(AccountError::EmailTaken),
        Err(e) => return Err(e.into()),
    };
    let calendar =
        calendars::insert_calendar(&mut *tx, user.user_id, calendars::DEFAULT_CALENDAR_NAME)
            .await?;

    tx.commit().await.context("failed to commit transaction")?;
    info!(user_id = user.user_id, "user signed up");

    Ok((UserProfile::from(&user), calendar))
}

/// Check credentials and return the user's profile.
pub async fn log_in(pool: &PgPool, request: &LoginRequest) -> Result<UserProfile, AccountError> {
    let email = required("email", request.email.as_deref())?;
    let password = request
        .password
        .as_deref()
        .ok_or_else(|| AccountError::Validation("password is required".to_string()))?;

    let user = users::get_user_by_email(pool, email)
        .await?
        .ok_or(AccountError::UnknownEmail)?;
    if !verify_password(password, &user.password_hash) {
        return Err(AccountError::WrongPassword);
    }
    Ok(UserProfile::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips_and_is_salted() {
        let a = hash_password("hunter2");
        let b = hash_password("hunter2");
        assert_ne!(a, b);
        assert!(verify_password("hunter2", &a));
        assert!(verify_password("hunter2", &b));
        assert!(!verify_password("hunter3", &a));
    }

    #[test]
    fn hash_format() {
        let stored = hash_password("pw");
        let (salt, mac) = stored.split_once('$').unwrap();
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert_eq!(mac.len(), 64);
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "no-separator"));
        assert!(!verify_password("pw", "zz$zz"));
        assert!(!verify_password("pw", "00$00"));
    }

    #[test]
    fn profile_serializes_camel_case() {
        let profile = UserProfile {
            user_id: 1,
            full_name: "Ada".into(),
            email: "ada@example.com".into(),
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["userId"], 1);
        assert_eq!(json["fullName"], "Ada");
    }
}
