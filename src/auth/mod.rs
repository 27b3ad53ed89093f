//! Username/password authentication.
//!
//! Passwords are stored as Argon2id PHC strings. Hashing and verification are
//! CPU-bound and run on the blocking pool.

mod session;

pub use session::*;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{RegistrationForm, User};

/// Login failure.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Password or username is incorrect")]
    InvalidCredentials,
    #[error("credential lookup failed: {0}")]
    Store(AppError),
    #[error("password verification failed: {0}")]
    Hashing(String),
}

/// Registration failure. `Invalid` and `Duplicate` carry a message meant for the user.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("user store failure: {0}")]
    Store(AppError),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Verify a username/password pair against the stored credentials.
pub async fn authenticate(
    repo: &Repository,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let Some(credentials) = repo
        .find_credentials_by_username(username.trim())
        .await
        .map_err(AuthError::Store)?
    else {
        return Err(AuthError::InvalidCredentials);
    };

    let verified = verify_password(password.to_string(), credentials.password_hash)
        .await
        .map_err(AuthError::Hashing)?;

    if verified {
        Ok(credentials.user)
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

/// Validate the profile, hash the password and insert the user.
///
/// The user row is written by a single statement, so a rejected registration
/// never leaves a partial record behind.
pub async fn register(
    repo: &Repository,
    form: &RegistrationForm,
) -> Result<User, RegistrationError> {
    form.validate().map_err(RegistrationError::Invalid)?;

    let hash = hash_password(form.password.clone())
        .await
        .map_err(RegistrationError::Hashing)?;

    let user = repo
        .create_user(form.username.trim(), form.email.trim(), &hash)
        .await?;

    tracing::info!(user_id = %user.id, "Registered user {}", user.username);
    Ok(user)
}

pub async fn hash_password(password: String) -> Result<String, String> {
    run_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| err.to_string())
    })
    .await
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, String> {
    run_blocking(move || {
        let parsed = PasswordHash::new(&hash).map_err(|err| err.to_string())?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
}

async fn run_blocking<T, F>(task: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, String> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| format!("hashing task failed: {err}"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("auth.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    fn form(username: &str, email: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            email: email.to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[tokio::test]
    async fn test_hash_is_salted_and_verifies() {
        let first = hash_password("hunter22".to_string()).await.unwrap();
        let second = hash_password("hunter22".to_string()).await.unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password("hunter22".to_string(), first.clone())
            .await
            .unwrap());
        assert!(!verify_password("hunter23".to_string(), first).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage_hash() {
        assert!(verify_password("pw".to_string(), "plaintext".to_string())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let (repo, _dir) = repo().await;

        let user = register(&repo, &form("tim", "tim@example.com")).await.unwrap();
        let authed = authenticate(&repo, "tim", "correct horse").await.unwrap();
        assert_eq!(authed, user);

        assert!(matches!(
            authenticate(&repo, "tim", "wrong horse").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&repo, "nobody", "correct horse").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_registration_creates_nothing() {
        let (repo, _dir) = repo().await;
        register(&repo, &form("tim", "tim@example.com")).await.unwrap();

        let by_name = register(&repo, &form("tim", "other@example.com")).await;
        assert!(matches!(by_name, Err(RegistrationError::Duplicate(ref msg)) if msg.contains("username")));

        let by_email = register(&repo, &form("timothy", "tim@example.com")).await;
        assert!(matches!(by_email, Err(RegistrationError::Duplicate(ref msg)) if msg.contains("email")));

        assert_eq!(repo.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_policy_rejected_password_creates_nothing() {
        let (repo, _dir) = repo().await;
        let mut weak = form("tim", "tim@example.com");
        weak.password = "short".to_string();

        assert!(matches!(
            register(&repo, &weak).await,
            Err(RegistrationError::Invalid(_))
        ));
        assert_eq!(repo.count_users().await.unwrap(), 0);
    }
}
