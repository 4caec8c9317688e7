use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    auth::repo_types::User,
    error::FieldError,
    validation::{char_len, email_error, is_strong_password, username_error, Rule},
};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Request body for user registration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

impl RegisterRequest {
    pub const RULES: &'static [Rule<Self>] = &[
        |r| username_error(&r.username),
        |r| email_error(&r.email),
        |r| {
            if r.password.is_empty() {
                Some(FieldError::new("password", "Password is required"))
            } else if char_len(&r.password) < MIN_PASSWORD_LEN {
                Some(FieldError::new("password", "Password must be at least 6 characters"))
            } else if !is_strong_password(&r.password) {
                Some(FieldError::new(
                    "password",
                    "Password must contain at least one uppercase letter, one lowercase letter, and one number",
                ))
            } else {
                None
            }
        },
        |r| {
            if r.confirm_password.is_empty() {
                Some(FieldError::new("confirmPassword", "Confirm password is required"))
            } else if r.confirm_password != r.password {
                Some(FieldError::new("confirmPassword", "Passwords do not match"))
            } else {
                None
            }
        },
    ];
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub const RULES: &'static [Rule<Self>] = &[
        |r| email_error(&r.email),
        |r| {
            r.password
                .is_empty()
                .then(|| FieldError::new("password", "Password is required"))
        },
    ];
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "currentPassword")]
    pub current_password: Option<String>,
}

impl UpdateProfileRequest {
    pub const RULES: &'static [Rule<Self>] = &[
        |r| non_blank(&r.username).and_then(username_error),
        |r| non_blank(&r.email).and_then(email_error),
        |r| {
            non_blank(&r.password)
                .filter(|p| char_len(p) < MIN_PASSWORD_LEN)
                .map(|_| FieldError::new("password", "Password must be at least 6 characters"))
        },
    ];
}

/// Treats empty strings like absent fields.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            created_at: u.created_at,
        }
    }
}

/// Response returned after login or register.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: &'static str,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileStats {
    pub total_tasks: usize,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: PublicUser,
    pub stats: ProfileStats,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: &'static str,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
