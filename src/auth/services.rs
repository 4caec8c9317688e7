use axum::http::HeaderMap;
use rand::{rngs::OsRng, RngCore};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, info, warn};

use crate::{
    auth::{
        dto::{
            non_blank, ForgotPasswordRequest, LoginRequest, RegisterRequest,
            ResetPasswordRequest, UpdateProfileRequest, MIN_PASSWORD_LEN,
        },
        extractors::{authorization, AuthUser},
        jwt::TokenError,
        repo_types::{NewUser, ProfileChanges, User},
    },
    db::RepoError,
    error::{ApiError, OrInternal},
    mail::ResetMail,
    state::AppState,
    validation::{char_len, normalize_email, validate},
};

/// Validity window of a password-reset token.
pub const RESET_TOKEN_TTL: TimeDuration = TimeDuration::hours(1);

/// 32 random bytes, hex encoded.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<(User, String), ApiError> {
    validate(&req, RegisterRequest::RULES)?;

    let password_hash = state
        .passwords
        .hash(&req.password)
        .or_internal("REGISTRATION_FAILED", "Registration failed. Please try again.")?;
    let new = NewUser {
        username: req.username.trim().to_string(),
        email: normalize_email(&req.email),
        password_hash,
    };

    let user = match state.users.create(&new).await {
        Ok(user) => user,
        Err(RepoError::Duplicate { constraint }) => {
            warn!(%constraint, "registration for existing user");
            return Err(ApiError::conflict(
                "USER_EXISTS",
                "User already exists with this email or username",
            ));
        }
        Err(e) => {
            return Err(e).or_internal("REGISTRATION_FAILED", "Registration failed. Please try again.")
        }
    };

    let token = state
        .jwt
        .sign(user.id, &user.email)
        .or_internal("REGISTRATION_FAILED", "Registration failed. Please try again.")?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((user, token))
}

pub async fn login(state: &AppState, req: LoginRequest) -> Result<(User, String), ApiError> {
    validate(&req, LoginRequest::RULES)?;
    let email = normalize_email(&req.email);

    let user = state
        .users
        .find_by_email(&email)
        .await
        .or_internal("LOGIN_FAILED", "Login failed. Please try again.")?;

    let Some(user) = user else {
        state.passwords.burn(&req.password);
        warn!("login for unknown email");
        return Err(invalid_credentials());
    };

    let ok = state
        .passwords
        .verify(&req.password, &user.password_hash)
        .or_internal("LOGIN_FAILED", "Login failed. Please try again.")?;
    if !ok {
        warn!(user_id = user.id, "login with wrong password");
        return Err(invalid_credentials());
    }

    let token = state
        .jwt
        .sign(user.id, &user.email)
        .or_internal("LOGIN_FAILED", "Login failed. Please try again.")?;

    info!(user_id = user.id, "user logged in");
    Ok((user, token))
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("INVALID_CREDENTIALS", "Invalid credentials")
}

/// Starts a reset for the matching account, if any. The outcome is never revealed to
/// the caller and mail failures do not fail the request.
pub async fn forgot_password(state: &AppState, req: ForgotPasswordRequest) -> Result<(), ApiError> {
    let Some(email) = non_blank(&req.email) else {
        return Err(ApiError::bad_request("EMAIL_REQUIRED", "Email is required"));
    };
    let email = normalize_email(email);

    let user = state
        .users
        .find_by_email(&email)
        .await
        .or_internal("EMAIL_SEND_FAILED", "Failed to send reset email. Please try again.")?;
    let Some(user) = user else {
        debug!("password reset requested for unknown email");
        return Ok(());
    };

    let token = generate_reset_token();
    let expires = OffsetDateTime::now_utc() + RESET_TOKEN_TTL;
    state
        .users
        .set_reset_token(user.id, &token, expires)
        .await
        .or_internal("EMAIL_SEND_FAILED", "Failed to send reset email. Please try again.")?;

    let mail = ResetMail {
        to: user.email.clone(),
        reset_url: format!(
            "{}/reset-password?token={}",
            state.config.frontend_url.trim_end_matches('/'),
            token
        ),
    };
    if let Err(e) = state.mailer.send_reset(&mail).await {
        error!(error = %e, user_id = user.id, "failed to send password reset email");
        warn!(reset_url = %mail.reset_url, "fallback password reset link");
    }

    info!(user_id = user.id, "password reset issued");
    Ok(())
}

pub async fn reset_password(state: &AppState, req: ResetPasswordRequest) -> Result<(), ApiError> {
    let (Some(token), Some(password)) = (non_blank(&req.token), req.password.as_deref()) else {
        return Err(ApiError::bad_request(
            "MISSING_FIELDS",
            "Token and password are required",
        ));
    };
    if password.is_empty() {
        return Err(ApiError::bad_request(
            "MISSING_FIELDS",
            "Token and password are required",
        ));
    }
    if char_len(password) < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(
            "PASSWORD_TOO_SHORT",
            "Password must be at least 6 characters",
        ));
    }

    let user = state
        .users
        .find_by_reset_token(token, OffsetDateTime::now_utc())
        .await
        .or_internal("RESET_FAILED", "Failed to reset password. Please try again.")?;
    let Some(user) = user else {
        warn!("invalid or expired reset token");
        return Err(ApiError::bad_request(
            "INVALID_TOKEN",
            "Invalid or expired reset token",
        ));
    };

    let hash = state
        .passwords
        .hash(password)
        .or_internal("RESET_FAILED", "Failed to reset password. Please try again.")?;
    state
        .users
        .update_password(user.id, &hash)
        .await
        .or_internal("RESET_FAILED", "Failed to reset password. Please try again.")?;

    info!(user_id = user.id, "password reset completed");
    Ok(())
}

/// Issues a fresh token for a valid or recently expired one.
pub async fn refresh(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let Some(header) = authorization(headers) else {
        return Err(ApiError::unauthorized(
            "NO_AUTH_HEADER",
            "No authorization header provided",
        ));
    };
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("NO_TOKEN", "No token provided"));
    }

    let claims = state.jwt.verify_for_refresh(token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        match e {
            TokenError::Expired => ApiError::forbidden("TOKEN_EXPIRED", "Token has expired."),
            TokenError::Invalid => ApiError::forbidden("INVALID_TOKEN", "Invalid token"),
        }
    })?;

    let user = state
        .users
        .find_by_id(claims.id)
        .await
        .or_internal("REFRESH_FAILED", "Failed to refresh token")?;
    let Some(user) = user else {
        return Err(ApiError::unauthorized("USER_NOT_FOUND", "User not found"));
    };

    let token = state
        .jwt
        .sign(user.id, &user.email)
        .or_internal("REFRESH_FAILED", "Failed to refresh token")?;
    debug!(user_id = user.id, "token refreshed");
    Ok(token)
}

pub async fn profile(state: &AppState, auth: &AuthUser) -> Result<(User, usize), ApiError> {
    let user = state
        .users
        .find_by_id(auth.id)
        .await
        .or_internal("PROFILE_FETCH_FAILED", "Failed to get profile")?
        .ok_or_else(|| ApiError::not_found("USER_NOT_FOUND", "User not found"))?;
    let total_tasks = state
        .tasks
        .count_for_user(auth.id)
        .await
        .or_internal("PROFILE_FETCH_FAILED", "Failed to get profile")?;
    Ok((user, total_tasks))
}

pub async fn update_profile(
    state: &AppState,
    auth: &AuthUser,
    req: UpdateProfileRequest,
) -> Result<User, ApiError> {
    validate(&req, UpdateProfileRequest::RULES)?;

    let mut changes = ProfileChanges {
        username: non_blank(&req.username).map(|u| u.trim().to_string()),
        email: non_blank(&req.email).map(normalize_email),
        password_hash: None,
    };

    if let Some(new_password) = non_blank(&req.password) {
        let Some(current) = non_blank(&req.current_password) else {
            return Err(ApiError::bad_request(
                "CURRENT_PASSWORD_REQUIRED",
                "Current password is required to change password",
            ));
        };
        let user = state
            .users
            .find_by_id(auth.id)
            .await
            .or_internal("UPDATE_FAILED", "Failed to update profile")?
            .ok_or_else(|| ApiError::not_found("USER_NOT_FOUND", "User not found"))?;
        let ok = state
            .passwords
            .verify(current, &user.password_hash)
            .or_internal("UPDATE_FAILED", "Failed to update profile")?;
        if !ok {
            warn!(user_id = auth.id, "profile update with wrong current password");
            return Err(ApiError::unauthorized(
                "INCORRECT_PASSWORD",
                "Current password is incorrect",
            ));
        }
        changes.password_hash = Some(
            state
                .passwords
                .hash(new_password)
                .or_internal("UPDATE_FAILED", "Failed to update profile")?,
        );
    }

    if changes.is_empty() {
        return Err(ApiError::bad_request("NO_UPDATES", "No updates provided"));
    }

    let updated = match state.users.update_profile(auth.id, &changes).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(ApiError::not_found("USER_NOT_FOUND", "User not found")),
        Err(RepoError::Duplicate { constraint }) => {
            warn!(%constraint, user_id = auth.id, "profile update collides with another user");
            return Err(ApiError::conflict(
                "DUPLICATE_ENTRY",
                "Username or email already taken",
            ));
        }
        Err(e) => return Err(e).or_internal("UPDATE_FAILED", "Failed to update profile"),
    };

    info!(
        user_id = updated.id,
        password_changed = changes.password_hash.is_some(),
        "profile updated"
    );
    Ok(updated)
}
