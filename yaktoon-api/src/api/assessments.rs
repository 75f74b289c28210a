//! Self-assessment routes: career activities and college adaptation

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use yaktoon_common::{ids, keys, time, Error};

use super::acting_user;
use crate::assessments::{
    analyze_adaptation, recommend_activities, AdaptationAnswer, AdaptationResult, CareerActivity,
    CareerAnswer,
};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const MISSING_FIELDS: &str = "Missing required fields";
const RESULT_FIELD: &str = "result";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSubmission<A> {
    pub answers: Option<Vec<A>>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CareerRecord<'a> {
    id: String,
    user_id: &'a str,
    answers: &'a [CareerAnswer],
    activities: &'a [CareerActivity],
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdaptationRecord<'a> {
    id: String,
    user_id: &'a str,
    answers: &'a [AdaptationAnswer],
    result: &'a AdaptationResult,
    created_at: String,
    updated_at: String,
}

fn record_id(prefix: &str) -> String {
    format!("{}_{}_{}", prefix, time::now_millis(), ids::random_base36(9))
}

/// The caller's stored result, or null
async fn stored_result(state: &AppState, key: &str) -> ApiResult<Json<Value>> {
    let result = match state.store.hget(key, RESULT_FIELD).await? {
        Some(raw) => serde_json::from_str(&raw).map_err(Error::from)?,
        None => Value::Null,
    };
    Ok(Json(json!({ "result": result })))
}

async fn save_result<T: Serialize>(state: &AppState, key: &str, record: &T) -> ApiResult<()> {
    let raw = serde_json::to_string(record).map_err(Error::from)?;
    state.store.hset(key, &[(RESULT_FIELD, raw)]).await?;
    Ok(())
}

/// GET /api/career-activities
pub async fn get_career_activities(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    stored_result(&state, &keys::career_activities(&user.id)).await
}

/// POST /api/career-activities
pub async fn submit_career_activities(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(submission): Json<AssessmentSubmission<CareerAnswer>>,
) -> ApiResult<Json<Value>> {
    let answers = submission
        .answers
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest(MISSING_FIELDS.to_string()))?;
    let user_id = acting_user(&user, &submission.user_id, MISSING_FIELDS)?;

    let activities = recommend_activities(answers);
    let now = time::now_iso();
    let record = CareerRecord {
        id: record_id("career"),
        user_id,
        answers,
        activities: &activities,
        created_at: now.clone(),
        updated_at: now,
    };
    save_result(&state, &keys::career_activities(user_id), &record).await?;
    info!("Stored {} career activities for {}", activities.len(), user_id);

    Ok(Json(json!({ "activities": activities, "result": record })))
}

/// GET /api/college-adaptation
pub async fn get_college_adaptation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    stored_result(&state, &keys::college_adaptation(&user.id)).await
}

/// POST /api/college-adaptation
pub async fn submit_college_adaptation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(submission): Json<AssessmentSubmission<AdaptationAnswer>>,
) -> ApiResult<Json<Value>> {
    let answers = submission
        .answers
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest(MISSING_FIELDS.to_string()))?;
    let user_id = acting_user(&user, &submission.user_id, MISSING_FIELDS)?;

    let analysis = analyze_adaptation(answers);
    let now = time::now_iso();
    let record = AdaptationRecord {
        id: record_id("adaptation"),
        user_id,
        answers,
        result: &analysis,
        created_at: now.clone(),
        updated_at: now,
    };
    save_result(&state, &keys::college_adaptation(user_id), &record).await?;
    info!("Stored college adaptation analysis for {} ({})", user_id, analysis.overall_score);

    Ok(Json(json!({ "result": analysis })))
}

pub fn assessment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/career-activities",
            get(get_career_activities).post(submit_career_activities),
        )
        .route(
            "/api/college-adaptation",
            get(get_college_adaptation).post(submit_college_adaptation),
        )
}
