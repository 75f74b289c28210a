//! Administrator view over completed record analyses

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::cmp::Reverse;
use tracing::{info, warn};
use yaktoon_common::{ids, keys};

use super::required;
use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::pagination::calculate_pagination;
use crate::AppState;

const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub session_id: Option<String>,
}

/// Newest first; ids without a timestamp sort last
pub fn sort_sessions_newest_first(sessions: &mut [String]) {
    sessions.sort_by_key(|id| Reverse(ids::session_timestamp(id).unwrap_or(0)));
}

/// GET /api/admin/medsky-analytics
pub async fn list_analytics(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<Value>> {
    let store = state.store.as_ref();

    if let Some(session_id) = query.session_id.as_deref().filter(|s| !s.is_empty()) {
        let data: Value = store
            .get_json(&keys::analysis_data(keys::ADMIN_NAMESPACE, session_id))
            .await?
            .ok_or_else(|| ApiError::NotFound("Analysis session not found".to_string()))?;
        return Ok(Json(json!({ "success": true, "data": data })));
    }

    let mut sessions = store.smembers(keys::ANALYSIS_SESSIONS).await?;
    sort_sessions_newest_first(&mut sessions);

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).max(1);
    let pagination = calculate_pagination(sessions.len(), query.page.unwrap_or(1), limit);

    let mut data = Vec::new();
    for session_id in pagination.slice(&sessions) {
        let key = keys::analysis_data(keys::ADMIN_NAMESPACE, &session_id);
        match store.get_json::<Value>(&key).await {
            Ok(Some(analysis)) => data.push(analysis),
            Ok(None) => {}
            Err(e) => warn!(session_id = %session_id, "Failed to load analysis data: {}", e),
        }
    }

    Ok(Json(json!({
        "success": true,
        "data": data,
        "pagination": {
            "page": pagination.page,
            "limit": limit,
            "total": sessions.len(),
            "totalPages": pagination.total_pages,
        },
    })))
}

/// DELETE /api/admin/medsky-analytics
pub async fn delete_analytics(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<Value>> {
    let session_id = required(&query.session_id, "Session ID is required")?;
    let store = state.store.as_ref();

    store
        .del(&keys::analysis_data(keys::ADMIN_NAMESPACE, session_id))
        .await?;
    store.srem(keys::ANALYSIS_SESSIONS, session_id).await?;

    info!(session_id = %session_id, admin = %admin.id, "Deleted analysis data");
    Ok(Json(json!({
        "success": true,
        "message": "Analysis data deleted successfully",
    })))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route(
        "/api/admin/medsky-analytics",
        get(list_analytics).delete(delete_analytics),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_sorted_by_embedded_timestamp() {
        let mut sessions = vec![
            "medsky_1700000000000_a".to_string(),
            "legacy-session".to_string(),
            "medsky_1800000000000_b".to_string(),
        ];
        sort_sessions_newest_first(&mut sessions);
        assert_eq!(
            sessions,
            vec![
                "medsky_1800000000000_b".to_string(),
                "medsky_1700000000000_a".to_string(),
                "legacy-session".to_string(),
            ]
        );
    }
}
