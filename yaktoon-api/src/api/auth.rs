//! Account registration and bearer-token sessions

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use yaktoon_common::models::{HashRecord, User};
use yaktoon_common::{ids, keys, time};

use crate::auth::{self as session, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 6;

/// POST /api/auth/register request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// POST /api/auth/register response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
}

/// POST /api/auth/login request
///
/// Accounts created by registration log in by email; seeded admin and influencer
/// accounts log in by their login id.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub user_id: Option<String>,
    pub password: Option<String>,
}

/// POST /api/auth/login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let (Some(name), Some(email), Some(password)) = (
        request.name.filter(|v| !v.is_empty()),
        request.email.filter(|v| !v.is_empty()),
        request.password.filter(|v| !v.is_empty()),
    ) else {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let store = state.store.as_ref();
    let email_key = keys::user_by_email(&email);
    if store.exists(&email_key).await? {
        return Err(ApiError::Conflict("Email already exists".to_string()));
    }

    let user = User {
        id: ids::user_id(),
        name,
        email,
        password_hash: session::hash_password(&password)?,
        created_at: time::now_millis(),
        ..Default::default()
    };

    store.hset(&keys::user(&user.id), &user.to_fields()).await?;
    store.set(&email_key, &user.id).await?;

    info!(user_id = %user.id, "Registered user");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully".to_string(),
            user_id: user.id,
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());
    let password = request.password.filter(|p| !p.is_empty()).ok_or_else(invalid)?;

    let lookup_key = match (request.email.as_deref(), request.user_id.as_deref()) {
        (Some(email), _) if !email.is_empty() => keys::user_by_email(email),
        (_, Some(login)) if !login.is_empty() => keys::user_by_login(login),
        _ => return Err(invalid()),
    };

    let store = state.store.as_ref();
    let user_id = store.get(&lookup_key).await?.ok_or_else(invalid)?;
    let user = session::load_user(store, &user_id).await?.ok_or_else(invalid)?;

    if user.password_hash.is_empty() || !session::verify_password(&password, &user.password_hash) {
        return Err(invalid());
    }

    let token = session::issue_token(store, &user.id, state.token_ttl_secs()).await?;
    info!(user_id = %user.id, "User logged in");
    Ok(Json(LoginResponse { token, user }))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(token) = session::bearer_token(&headers) {
        session::revoke_token(state.store.as_ref(), token).await?;
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "user": user }))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}
