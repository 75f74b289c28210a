//! Authentication and access rules
//!
//! Clients authenticate with an opaque bearer token issued by `POST /api/auth/login`.
//! The token maps to a user id at `auth:session:{token}` with a TTL. The middleware
//! resolves the token for every request; handlers then decide what an anonymous or
//! authenticated caller may do through the [`AuthUser`] and [`AdminUser`] extractors.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use rand::RngCore;
use tracing::{debug, warn};
use yaktoon_common::models::{HashRecord, User};
use yaktoon_common::{keys, Store};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Slug of the platform's own analysis service
pub const YAKTOON_SLUG: &str = "yaktoon";
const YAKTOON_EMAIL: &str = "yaktoon@rootedu.com";

// ============================================================================
// Passwords and tokens
// ============================================================================

/// Hash a password with Argon2id and a random salt
pub fn hash_password(password: &str) -> ApiResult<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| ApiError::Internal(format!("Failed to encode salt: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

/// False for a wrong password and for a hash that cannot be parsed
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is not a PHC string: {}", e);
            false
        }
    }
}

/// 32 random bytes, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Store a new token for `user_id`
pub async fn issue_token(store: &dyn Store, user_id: &str, ttl_secs: u64) -> ApiResult<String> {
    let token = generate_token();
    store
        .set_ex(&keys::auth_session(&token), user_id, ttl_secs)
        .await?;
    Ok(token)
}

pub async fn revoke_token(store: &dyn Store, token: &str) -> ApiResult<bool> {
    Ok(store.del(&keys::auth_session(token)).await?)
}

/// The user hash at `user:{id}`, if it exists
pub async fn load_user(store: &dyn Store, user_id: &str) -> yaktoon_common::Result<Option<User>> {
    let hash = store.hgetall(&keys::user(user_id)).await?;
    if hash.is_empty() {
        return Ok(None);
    }
    let mut user = User::from_hash(&hash);
    if user.id.is_empty() {
        user.id = user_id.to_string();
    }
    Ok(Some(user))
}

pub async fn resolve_token(store: &dyn Store, token: &str) -> yaktoon_common::Result<Option<User>> {
    match store.get(&keys::auth_session(token)).await? {
        Some(user_id) => load_user(store, &user_id).await,
        None => Ok(None),
    }
}

/// Bearer token from the Authorization header
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ============================================================================
// Middleware and extractors
// ============================================================================

/// The authenticated user, present in request extensions when the token resolved
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Resolve the bearer token into a [`CurrentUser`]
///
/// Never rejects: a missing, expired or unknown token leaves the request anonymous
/// and the handler's extractors decide.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        match resolve_token(state.store.as_ref(), token).await {
            Ok(Some(user)) => {
                debug!(user_id = %user.id, "Authenticated request");
                request.extensions_mut().insert(CurrentUser(user));
            }
            Ok(None) => debug!("Unknown or expired token"),
            Err(e) => warn!("Token lookup failed: {}", e),
        }
    }
    next.run(request).await
}

/// Rejects anonymous requests with 401
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|current| AuthUser(current.0.clone()))
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

/// Rejects anonymous requests with 401 and non-admins with 403
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}

// ============================================================================
// Access rules
// ============================================================================

/// Staff of the yaktoon analysis service
pub fn is_yaktoon_operator(user: &User) -> bool {
    user.is_admin()
        || user.user_id == YAKTOON_SLUG
        || user.email == YAKTOON_EMAIL
        || user.influencer_slug.as_deref() == Some(YAKTOON_SLUG)
}

/// Admins, and the influencer who owns `slug`
pub fn can_access_dashboard(user: &User, slug: &str) -> bool {
    if user.is_admin() {
        return true;
    }
    if slug == YAKTOON_SLUG && is_yaktoon_operator(user) {
        return true;
    }
    user.is_influencer()
        && (user.influencer_slug.as_deref() == Some(slug) || user.user_id == slug)
}

pub fn require_dashboard_access(user: &User, slug: &str) -> ApiResult<()> {
    if can_access_dashboard(user, slug) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Forbidden".to_string()))
    }
}

/// Chats under the yaktoon slug are restricted to its operators
pub fn require_chat_access(user: &User, slug: &str) -> ApiResult<()> {
    if slug == YAKTOON_SLUG && !is_yaktoon_operator(user) {
        return Err(ApiError::Forbidden("Forbidden".to_string()));
    }
    Ok(())
}
