//! Account models.

use serde::{Deserialize, Serialize};

/// Minimum password length, counted in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Full `users` row, including the password hash. Never serialized.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// The subset of a user returned alongside auth tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<&UserRecord> for PublicUser {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            email: record.email.clone(),
        }
    }
}

/// User row without the password column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Registration input after validation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    /// Check required fields and password length.
    pub fn validate(self) -> Result<NewUser, &'static str> {
        let (Some(name), Some(email), Some(password)) = (
            present(self.name),
            present(self.email),
            present(self.password),
        ) else {
            return Err("All fields are required");
        };

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err("Password must be at least 6 characters");
        }

        Ok(NewUser {
            name,
            email,
            password,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn validate(self) -> Result<(String, String), &'static str> {
        match (present(self.email), present(self.password)) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err("Email and password required"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

/// `Some` only for non-empty strings.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
