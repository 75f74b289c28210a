//! Student record (생활기록부) analysis endpoints
//!
//! Uploads start a background pipeline in [`yaktoon_medsky::MedskyService`];
//! clients then poll `/api/medsky/status` or follow `/api/medsky/events`.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use yaktoon_common::store::DAY_SECS;
use yaktoon_common::{keys, sse, time};
use yaktoon_medsky::analysis::{
    academic_stats_by_category, activity_stats_by_domain, calculate_analysis_statistics,
    process_academics, process_activities, process_detailed_abilities,
};
use yaktoon_medsky::pdf::{UploadedFile, MAX_FILE_SIZE};
use yaktoon_medsky::service::HealthStatus;
use yaktoon_medsky::UserInfo;

use super::required;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const SAVED_ANALYSIS_TTL_SECS: u64 = 365 * DAY_SECS;
/// Room for multipart framing above the 10MB file cap
const UPLOAD_BODY_LIMIT: usize = MAX_FILE_SIZE + 2 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnalysisRequest {
    pub influencer_slug: Option<String>,
    pub session_id: Option<String>,
    pub analysis_data: Option<Value>,
}

/// Parts of the upload form
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    product_id: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("Invalid upload: {}", e))
    };

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload.pdf").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_form)?;
                form.file = Some(UploadedFile::new(name, content_type, bytes.to_vec()));
            }
            Some("productId") => {
                let text = field.text().await.map_err(bad_form)?;
                form.product_id = Some(text).filter(|t| !t.is_empty());
            }
            other => debug!("Ignoring upload field {:?}", other),
        }
    }
    Ok(form)
}

/// POST /api/medsky/process
pub async fn start_analysis(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let config = state.medsky.validate_configuration();
    if !config.is_valid {
        return Err(ApiError::Internal(format!(
            "Configuration error: {}",
            config.errors.join(", ")
        )));
    }

    let form = read_upload(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest("PDF file is required".to_string()))?;
    if file.content_type != "application/pdf" {
        return Err(ApiError::BadRequest("Only PDF files are allowed".to_string()));
    }
    if file.size() > MAX_FILE_SIZE {
        return Err(ApiError::BadRequest("File size must be less than 10MB".to_string()));
    }

    let session_id = state.medsky.create_session().await;
    let user_info = UserInfo {
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        analyzed_at: time::now_iso(),
        product_id: form.product_id,
    };
    info!(session_id = %session_id, user_id = %user.id, size = file.size(), "Starting record analysis");
    state
        .medsky
        .start_processing_pipeline(&session_id, file, Some(user_info))
        .await;

    Ok(Json(json!({
        "success": true,
        "sessionId": session_id,
        "result": null,
    })))
}

/// GET /api/medsky/process
pub async fn get_analysis(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Value>> {
    let session_id = required(&query.session_id, "Session ID is required")?;
    let result = state
        .medsky
        .get_result(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
    Ok(Json(json!({ "success": true, "result": result })))
}

/// GET /api/medsky/status
pub async fn get_status(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Value>> {
    let session_id = required(&query.session_id, "Session ID is required")?;
    let status = state
        .medsky
        .get_status(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
    Ok(Json(json!({ "success": true, "status": status })))
}

/// GET /api/medsky/events
///
/// Sends the current status, then each change; closes after `completed` or `error`.
pub async fn session_events(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(query): Query<SessionQuery>,
) -> ApiResult<impl IntoResponse> {
    let session_id = required(&query.session_id, "Session ID is required")?.to_string();
    let rx = state.medsky.events().subscribe();
    let current = state
        .medsky
        .status_event(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    let label = format!("medsky session {}", session_id);
    Ok(sse::event_stream(rx, Some(current), label, move |event| {
        event.session_id() == Some(session_id.as_str())
    }))
}

/// GET /api/medsky/health
///
/// 200 when every dependency answers, 207 when some do, 503 when none do.
pub async fn medsky_health(State(state): State<AppState>) -> impl IntoResponse {
    let configuration = state.medsky.validate_configuration();
    let report = state.medsky.health_check().await;

    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::MULTI_STATUS,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    let body = json!({
        "status": report.status,
        "configuration": configuration,
        "services": report.services,
        "errors": report.errors,
        "timestamp": time::now_iso(),
    });
    (status, Json(body))
}

/// POST /api/medsky/save-analysis
pub async fn save_analysis(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<SaveAnalysisRequest>,
) -> ApiResult<Json<Value>> {
    let missing = "Missing required fields";
    let slug = required(&request.influencer_slug, missing)?;
    let session_id = required(&request.session_id, missing)?;
    let analysis = request
        .analysis_data
        .as_ref()
        .filter(|a| !a.is_null())
        .ok_or_else(|| ApiError::BadRequest(missing.to_string()))?;

    let owns_slug = user.is_influencer()
        && (user.user_id == slug || user.influencer_slug.as_deref() == Some(slug));
    if !user.is_admin() && !owns_slug {
        return Err(ApiError::Forbidden("Forbidden".to_string()));
    }

    let key = keys::analysis_data(slug, session_id);
    state
        .store
        .set_json_ex(&key, analysis, SAVED_ANALYSIS_TTL_SECS)
        .await?;

    info!(key = %key, "Saved analysis for influencer");
    Ok(Json(json!({
        "success": true,
        "message": "Analysis saved successfully",
        "key": key,
    })))
}

/// GET /api/medsky/statistics
///
/// Summary numbers and per-section breakdowns for a finished analysis.
pub async fn analysis_statistics(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Value>> {
    let session_id = required(&query.session_id, "Session ID is required")?;
    let result = state
        .medsky
        .get_result(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    let (Some(extracted), Some(validation)) =
        (result.extracted_data.as_ref(), result.validation_analysis.as_ref())
    else {
        return Err(ApiError::Conflict("Analysis is not complete".to_string()));
    };

    let activities = process_activities(extracted);
    let academics = process_academics(extracted);
    Ok(Json(json!({
        "success": true,
        "statistics": calculate_analysis_statistics(extracted, validation),
        "activityStatsByDomain": activity_stats_by_domain(&activities),
        "academicStatsByCategory": academic_stats_by_category(&academics),
        "activities": activities,
        "academics": academics,
        "abilities": process_detailed_abilities(extracted),
    })))
}

pub fn medsky_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/medsky/process",
            post(start_analysis)
                .get(get_analysis)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/medsky/status", get(get_status))
        .route("/api/medsky/events", get(session_events))
        .route("/api/medsky/health", get(medsky_health))
        .route("/api/medsky/save-analysis", post(save_analysis))
        .route("/api/medsky/statistics", get(analysis_statistics))
}
