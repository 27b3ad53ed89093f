//! User identity model.

use serde::{Deserialize, Serialize};

pub const MAX_USERNAME_LEN: usize = 64;
pub const MIN_PASSWORD_LEN: usize = 8;

/// A registered identity. Credential material lives in [`UserCredentials`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: String,
}

/// A user together with its stored password hash. Never rendered.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Submitted registration form.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegistrationForm {
    /// Check the profile and password policy, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err("Username is required".to_string());
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(format!(
                "Username must be at most {MAX_USERNAME_LEN} characters"
            ));
        }
        if !is_plausible_email(self.email.trim()) {
            return Err("A valid email address is required".to_string());
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            ));
        }
        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    }
}

/// Submitted login form.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn form(username: &str, email: &str, password: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(form("camper", "camper@example.com", "s3cretpass")
            .validate()
            .is_ok());
    }

    #[rstest]
    #[case("", "camper@example.com", "s3cretpass", "Username")]
    #[case("   ", "camper@example.com", "s3cretpass", "Username")]
    #[case("camper", "not-an-email", "s3cretpass", "email")]
    #[case("camper", "@example.com", "s3cretpass", "email")]
    #[case("camper", "camper@", "s3cretpass", "email")]
    #[case("camper", "camper@example.com", "short", "Password")]
    fn test_invalid_registration(
        #[case] username: &str,
        #[case] email: &str,
        #[case] password: &str,
        #[case] mentions: &str,
    ) {
        let err = form(username, email, password).validate().unwrap_err();
        assert!(err.contains(mentions), "{err}");
    }

    #[test]
    fn test_username_too_long() {
        let name = "x".repeat(MAX_USERNAME_LEN + 1);
        assert!(form(&name, "camper@example.com", "s3cretpass")
            .validate()
            .is_err());
    }
}
