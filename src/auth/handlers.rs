use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, ProfileResponse,
            ProfileStats, RefreshResponse, RegisterRequest, ResetPasswordRequest,
            UpdateProfileRequest, UserResponse,
        },
        extractors::AuthUser,
        services,
    },
    error::ApiError,
    extract::JsonBody,
    state::AppState,
};

const COOKIE_NAME: &str = "token";
const COOKIE_MAX_AGE_SECS: u64 = 24 * 60 * 60;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/refresh", post(refresh))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/profile", get(get_profile).put(update_profile))
        .route("/auth/logout", post(logout))
}

/// Browser convenience only; protected routes read the Authorization header.
fn session_cookie(token: &str, secure: bool) -> HeaderMap {
    let mut value = format!(
        "{COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={COOKIE_MAX_AGE_SECS}"
    );
    if secure {
        value.push_str("; Secure");
    }
    cookie_header(value)
}

fn cleared_cookie() -> HeaderMap {
    cookie_header(format!(
        "{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0"
    ))
}

fn cookie_header(value: String) -> HeaderMap {
    let mut headers = HeaderMap::new();
    // jwt and the fixed attributes are plain ASCII
    if let Ok(v) = HeaderValue::from_str(&value) {
        headers.insert(SET_COOKIE, v);
    }
    headers
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    let (user, token) = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        session_cookie(&token, state.config.cookie_secure),
        Json(AuthResponse {
            message: "User registered successfully",
            user: user.into(),
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let (user, token) = services::login(&state, payload).await?;
    Ok((
        session_cookie(&token, state.config.cookie_secure),
        Json(AuthResponse {
            message: "Login successful",
            user: user.into(),
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::forgot_password(&state, payload).await?;
    Ok(Json(MessageResponse {
        message: "If an account with that email exists, a password reset link has been sent.",
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::reset_password(&state, payload).await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset successfully",
    }))
}

#[instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, ApiError> {
    let token = services::refresh(&state, &headers).await?;
    Ok(Json(RefreshResponse {
        message: "Token refreshed",
        token,
    }))
}

#[instrument(skip(state, auth), fields(user_id = auth.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let (user, total_tasks) = services::profile(&state, &auth).await?;
    Ok(Json(ProfileResponse {
        user: user.into(),
        stats: ProfileStats { total_tasks },
    }))
}

#[instrument(skip(state, auth, payload), fields(user_id = auth.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = services::update_profile(&state, &auth, payload).await?;
    Ok(Json(UserResponse {
        message: "Profile updated successfully",
        user: user.into(),
    }))
}

/// Tokens are stateless; logging out only drops the browser cookie.
#[instrument(skip(auth), fields(user_id = auth.id))]
pub async fn logout(auth: AuthUser) -> (HeaderMap, Json<MessageResponse>) {
    info!(username = %auth.username, email = %auth.email, "user logged out");
    (
        cleared_cookie(),
        Json(MessageResponse {
            message: "Logout successful",
        }),
    )
}
