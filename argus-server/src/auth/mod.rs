//! Bearer-token authentication for the dashboard surface.

pub mod jwt;
pub mod middleware;

use crate::AppState;
use crate::errors::{AppError, AppResult};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use jwt::{Claims, generate_token, validate_token};
pub use middleware::auth_middleware;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: String,
    pub expires_in_secs: i64,
}

/// `POST /api/auth/login`: verify the admin credential and mint a token.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let config = &state.config;
    if request.username != config.admin_username
        || !credential_matches(&request.password, &config.admin_password)
    {
        warn!(username = %request.username, "failed login attempt");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = generate_token(&request.username, "admin", &config.jwt_secret)
        .map_err(|e| AppError::internal(format!("token generation failed: {e}")))?;
    Ok(Json(LoginResponse {
        token,
        username: request.username,
        role: "admin".to_string(),
        expires_in_secs: jwt::TOKEN_LIFETIME_SECS,
    }))
}

/// The configured credential is either plaintext or a PHC-format argon2
/// hash.
fn credential_matches(candidate: &str, configured: &str) -> bool {
    if configured.starts_with("$argon2") {
        match PasswordHash::new(configured) {
            Ok(parsed) => Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!("configured admin credential hash is malformed: {e}");
                false
            }
        }
    } else {
        candidate == configured
    }
}
