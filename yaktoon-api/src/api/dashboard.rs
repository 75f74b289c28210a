//! Influencer dashboard: message queues, review responses, analysis results,
//! generated student profiles and the per-product student roster.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use yaktoon_common::events::YaktoonEvent;
use yaktoon_common::models::json_or_string;
use yaktoon_common::store::DAY_SECS;
use yaktoon_common::{keys, time, Store};
use yaktoon_medsky::llm::ChatMessage;

use super::messaging::{push_message, ConversationMessage, CONVERSATION_TTL_SECS};
use super::{complete_text, llm_failure, required};
use crate::auth::{require_dashboard_access, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const STATS_TTL_SECS: u64 = 365 * DAY_SECS;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMessage {
    pub id: String,
    pub user_name: String,
    pub user_email: String,
    pub content: String,
    pub timestamp: String,
    pub ai_draft: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequestSummary {
    pub id: String,
    pub user_name: String,
    pub user_email: String,
    pub original_message: String,
    pub ai_response: String,
    pub review_reason: String,
    pub timestamp: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponseRequest {
    pub message_id: Option<String>,
    pub review_request_id: Option<String>,
    pub response: Option<String>,
    #[serde(default, rename = "usedAIDraft")]
    pub used_ai_draft: bool,
    #[serde(default)]
    pub is_review_response: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub session_id: String,
    pub user_id: String,
    pub user_name: String,
    pub analysis_data: Value,
    pub profile_generated: bool,
    pub generated_profile: Option<Value>,
    pub created_at: String,
    pub completed_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateProfileRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub purchase_date: String,
    pub purchase_status: String,
    pub analysis_count: usize,
    pub last_analysis: Option<Value>,
    pub profile_generated: bool,
    pub generated_profile: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStudents {
    pub product_id: String,
    pub product_name: String,
    pub product_description: String,
    pub price: i64,
    pub student_count: usize,
    pub students: Vec<StudentInfo>,
}

/// Last `:`-separated segment of a key
fn key_suffix(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Every analysis stored under `{slug}:analysis_data:*`, tagged with its session id
async fn load_analyses(store: &dyn Store, slug: &str) -> ApiResult<Vec<(String, Value)>> {
    let mut analyses = Vec::new();
    for key in store.keys(&keys::analysis_data_pattern(slug)).await? {
        let Some(raw) = store.get(&key).await? else {
            continue;
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(analysis) => analyses.push((key_suffix(&key).to_string(), analysis)),
            Err(e) => warn!(key = %key, "Skipping unparseable analysis: {}", e),
        }
    }
    Ok(analyses)
}

/// Stored profile text for a session; `None` if no profile was generated
async fn load_profile(store: &dyn Store, slug: &str, session_id: &str) -> ApiResult<Option<Value>> {
    let Some(raw) = store.get(&keys::profile(slug, session_id)).await? else {
        return Ok(None);
    };
    Ok(Some(match json_or_string(&raw) {
        Value::Object(mut map) => map.remove("profile").unwrap_or(Value::Null),
        other => other,
    }))
}

/// Summary row for one stored analysis
pub fn summarize_analysis(session_id: &str, analysis: &Value, profile: Option<Value>) -> AnalysisResult {
    let now = time::now_iso();
    let created_at = str_at(analysis, "/createdAt").map(str::to_string);
    let completed_at = str_at(analysis, "/completedAt")
        .map(str::to_string)
        .or_else(|| created_at.clone())
        .unwrap_or_else(|| now.clone());

    AnalysisResult {
        session_id: session_id.to_string(),
        user_id: str_at(analysis, "/userId")
            .or_else(|| str_at(analysis, "/userInfo/id"))
            .unwrap_or("unknown")
            .to_string(),
        user_name: str_at(analysis, "/userName")
            .or_else(|| str_at(analysis, "/userInfo/name"))
            .unwrap_or("익명 사용자")
            .to_string(),
        analysis_data: analysis
            .get("analysis")
            .or_else(|| analysis.get("result"))
            .unwrap_or(analysis)
            .clone(),
        profile_generated: profile.is_some(),
        generated_profile: profile,
        created_at: created_at.unwrap_or(now),
        completed_at,
    }
}

/// GET /api/dashboard/:slug/pending-messages
pub async fn pending_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    require_dashboard_access(&user, &slug)?;
    let store = state.store.as_ref();

    let mut messages = Vec::new();
    for message_id in store.lall(&keys::pending_messages(&slug)).await? {
        let hash = store.hgetall(&keys::message(&slug, &message_id)).await?;
        if hash.is_empty() {
            continue;
        }

        let ai_draft = match store.get(&keys::message_draft(&slug, &message_id)).await? {
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(draft) => draft
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                Err(_) => raw,
            },
            None => String::new(),
        };

        let field = |name: &str| hash.get(name).cloned().unwrap_or_default();
        messages.push(PendingMessage {
            user_name: hash
                .get("userName")
                .filter(|n| !n.is_empty())
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            user_email: field("userEmail"),
            content: field("content"),
            timestamp: field("timestamp"),
            status: hash
                .get("status")
                .cloned()
                .unwrap_or_else(|| "pending".to_string()),
            ai_draft,
            id: message_id,
        });
    }

    messages.sort_by_key(|m| std::cmp::Reverse(time::sort_key(&m.timestamp)));
    Ok(Json(json!({ "messages": messages })))
}

/// GET /api/dashboard/:slug/review-requests
pub async fn review_requests(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    require_dashboard_access(&user, &slug)?;
    let store = state.store.as_ref();

    let mut requests = Vec::new();
    for request_id in store.lall(&keys::review_requests(&slug)).await? {
        let hash = store.hgetall(&keys::review_request(&slug, &request_id)).await?;
        let status = hash.get("status").cloned().unwrap_or_else(|| "pending".to_string());
        if hash.is_empty() || status != "pending" {
            continue;
        }

        let field = |name: &str| hash.get(name).cloned().unwrap_or_default();
        requests.push(ReviewRequestSummary {
            id: request_id.clone(),
            user_name: field("userName"),
            user_email: field("userEmail"),
            original_message: field("originalMessage"),
            ai_response: field("aiResponse"),
            review_reason: field("reviewReason"),
            timestamp: field("timestamp"),
            status,
        });
    }

    requests.sort_by_key(|r| std::cmp::Reverse(time::sort_key(&r.timestamp)));
    Ok(Json(json!({ "reviewRequests": requests })))
}

async fn bump_stat(store: &dyn Store, slug: &str, field: &str) -> ApiResult<()> {
    let key = keys::message_stats(slug);
    store.hincrby(&key, field, 1).await?;
    store.expire(&key, STATS_TTL_SECS).await?;
    Ok(())
}

/// POST /api/dashboard/:slug/send-response
///
/// Answers either a review request (reply goes into the student's conversation)
/// or a message from the legacy pending queue.
pub async fn send_response(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    Json(request): Json<SendResponseRequest>,
) -> ApiResult<Json<Value>> {
    require_dashboard_access(&user, &slug)?;

    let missing = || ApiError::BadRequest("Missing required fields".to_string());
    let message_id = request.message_id.as_deref().filter(|v| !v.is_empty());
    let review_request_id = request.review_request_id.as_deref().filter(|v| !v.is_empty());
    if message_id.is_none() && review_request_id.is_none() {
        return Err(missing());
    }
    let response = required(&request.response, "Missing required fields")?;
    let store = state.store.as_ref();

    if let (true, Some(review_request_id)) = (request.is_review_response, review_request_id) {
        let request_key = keys::review_request(&slug, review_request_id);
        let review = store.hgetall(&request_key).await?;
        if review.is_empty() {
            return Err(ApiError::NotFound("Review request not found".to_string()));
        }
        let student_id = review
            .get("userId")
            .filter(|id| !id.is_empty())
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Review request has no student".to_string()))?;

        let reply = ConversationMessage {
            id: format!("review-response-{}", time::now_millis()),
            role: "influencer".to_string(),
            content: response.to_string(),
            timestamp: time::now_iso(),
            status: Some("delivered".to_string()),
            response_source: Some("influencer".to_string()),
            review_response_for: review.get("aiMessageId").cloned(),
            ..Default::default()
        };
        push_message(store, &keys::conversation(&slug, &student_id), &reply).await?;

        store
            .hset(
                &request_key,
                &[
                    ("status", "responded".to_string()),
                    ("responseContent", response.to_string()),
                    ("respondedAt", time::now_iso()),
                ],
            )
            .await?;
        store.lrem(&keys::review_requests(&slug), 0, review_request_id).await?;
        bump_stat(store, &slug, "total_review_responses").await?;

        state.events.emit(YaktoonEvent::InfluencerResponded {
            influencer_slug: slug.clone(),
            user_id: student_id,
            timestamp: time::now(),
        });

        info!(slug = %slug, review_request_id, "Review response sent");
        return Ok(Json(json!({
            "success": true,
            "message": "Review response sent successfully",
        })));
    }

    let message_id = message_id.ok_or_else(missing)?;
    let message_key = keys::message(&slug, message_id);
    let message = store.hgetall(&message_key).await?;
    if message.is_empty() {
        return Err(ApiError::NotFound("Message not found".to_string()));
    }

    let response_key = keys::message_response(&slug, message_id);
    store
        .hset(
            &response_key,
            &[
                ("content", response.to_string()),
                ("timestamp", time::now_iso()),
                ("respondedBy", user.id.clone()),
                ("usedAIDraft", request.used_ai_draft.to_string()),
            ],
        )
        .await?;
    store.expire(&response_key, CONVERSATION_TTL_SECS).await?;
    store
        .hset(&message_key, &[("status", "responded".to_string())])
        .await?;

    store.lrem(&keys::pending_messages(&slug), 0, message_id).await?;
    let responded_key = keys::responded_messages(&slug);
    store.lpush(&responded_key, message_id).await?;
    store.expire(&responded_key, CONVERSATION_TTL_SECS).await?;

    bump_stat(store, &slug, "total_responded").await?;
    if request.used_ai_draft {
        bump_stat(store, &slug, "ai_draft_used").await?;
    }

    if let Some(student_id) = message.get("userId").filter(|id| !id.is_empty()) {
        state.events.emit(YaktoonEvent::InfluencerResponded {
            influencer_slug: slug.clone(),
            user_id: student_id.clone(),
            timestamp: time::now(),
        });
    }

    info!(slug = %slug, message_id, "Response sent");
    Ok(Json(json!({
        "success": true,
        "message": "Response sent successfully",
    })))
}

/// GET /api/dashboard/:slug/analysis-results
pub async fn analysis_results(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    require_dashboard_access(&user, &slug)?;
    let store = state.store.as_ref();

    let mut results = Vec::new();
    for (session_id, analysis) in load_analyses(store, &slug).await? {
        let profile = load_profile(store, &slug, &session_id).await?;
        results.push(summarize_analysis(&session_id, &analysis, profile));
    }
    results.sort_by_key(|r| std::cmp::Reverse(time::sort_key(&r.completed_at)));

    let total = results.len();
    Ok(Json(json!({ "results": results, "total": total })))
}

/// Korean profile-writing prompt for one analysis
pub fn profile_prompt(analysis: &Value) -> String {
    let data = analysis.get("analysis").unwrap_or(analysis);
    let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    format!(
        "다음은 학생의 생활기록부 분석 결과입니다. 이를 바탕으로 학생의 프로필을 한국어로 작성해주세요.\n\n\
         분석 데이터:\n{pretty}\n\n\
         다음 형식으로 학생 프로필을 작성해주세요:\n\n\
         **1. 관심 분야:**\n\
         - 학생의 주요 관심사와 열정을 보이는 영역을 구체적으로 서술\n\n\
         **2. 현재 상태:**\n\
         - 학업 성취도, 활동 참여도, 리더십 경험 등 현재 학생의 상태를 객관적으로 평가\n\n\
         **3. 유의사항 및 특이점:**\n\
         - 진로 상담 시 고려해야 할 특별한 점이나 개선이 필요한 부분\n\
         - 강점을 더욱 발전시킬 수 있는 방향 제시\n\n\
         전체 내용은 300-500자 내외로 작성하고, 학생의 잠재력과 발전 가능성을 강조하여 긍정적인 톤으로 작성해주세요."
    )
}

const PROFILE_SYSTEM_PROMPT: &str = "당신은 교육 전문가이자 진로 상담사입니다. \
    학생의 생활기록부를 분석하여 종합적이고 건설적인 프로필을 작성합니다. \
    학생의 생활기록부는 학생의 학업 성적, 활동 참여도, 리더십 경험 등 현재 학생의 상태를 객관적으로 평가한 결과입니다.";

/// POST /api/dashboard/:slug/generate-profile
pub async fn generate_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    Json(request): Json<GenerateProfileRequest>,
) -> ApiResult<Json<Value>> {
    require_dashboard_access(&user, &slug)?;
    let session_id = required(&request.session_id, "Session ID is required")?;
    let store = state.store.as_ref();

    let analysis: Value = store
        .get_json(&keys::analysis_data(&slug, session_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Analysis data not found".to_string()))?;

    if let Some(profile) = load_profile(store, &slug, session_id).await? {
        return Ok(Json(json!({ "profile": profile, "cached": true })));
    }

    let messages = vec![
        ChatMessage::system(PROFILE_SYSTEM_PROMPT),
        ChatMessage::user(profile_prompt(&analysis)),
    ];
    let profile = complete_text(state.llm.as_ref(), messages, 0.7, 5000)
        .await
        .map_err(llm_failure)?;
    if profile.trim().is_empty() {
        return Err(ApiError::Internal("Failed to generate profile".to_string()));
    }

    store
        .set_json(
            &keys::profile(&slug, session_id),
            &json!({
                "sessionId": session_id,
                "profile": profile,
                "generatedAt": time::now_iso(),
                "generatedBy": user.id,
            }),
        )
        .await?;

    info!(slug = %slug, session_id, "Generated student profile");
    Ok(Json(json!({ "profile": profile, "cached": false })))
}

/// Whether a stored analysis belongs to a customer
fn analysis_matches(analysis: &Value, customer_id: &str, customer_name: &str) -> bool {
    let by_id = [str_at(analysis, "/userId"), str_at(analysis, "/userInfo/id")]
        .into_iter()
        .flatten()
        .any(|id| id == customer_id);
    let by_name = !customer_name.is_empty()
        && [str_at(analysis, "/userName"), str_at(analysis, "/userInfo/name")]
            .into_iter()
            .flatten()
            .any(|name| name == customer_name);
    by_id || by_name
}

fn analysis_recency(analysis: &Value) -> i64 {
    str_at(analysis, "/completedAt")
        .or_else(|| str_at(analysis, "/createdAt"))
        .map(time::sort_key)
        .unwrap_or(0)
}

/// GET /api/dashboard/:slug/students-by-product
pub async fn students_by_product(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    require_dashboard_access(&user, &slug)?;
    let store = state.store.as_ref();
    let analyses = load_analyses(store, &slug).await?;

    let mut products = Vec::new();
    for product_id in store.smembers(&keys::influencer_products(&slug)).await? {
        let product = store.hgetall(&keys::product(&product_id)).await?;
        if product.is_empty() {
            continue;
        }

        let mut students = Vec::new();
        for customer_id in store
            .smembers(&keys::influencer_product_customers(&slug, &product_id))
            .await?
        {
            let customer = store.hgetall(&keys::user(&customer_id)).await?;
            let purchase = store
                .hgetall(&keys::user_purchase(&customer_id, &product_id))
                .await?;
            let name = customer
                .get("name")
                .or_else(|| customer.get("userName"))
                .filter(|n| !n.is_empty())
                .cloned();

            let mut matching: Vec<(String, Value)> = analyses
                .iter()
                .filter(|(_, a)| analysis_matches(a, &customer_id, name.as_deref().unwrap_or("")))
                .map(|(sid, a)| {
                    let mut a = a.clone();
                    if let Value::Object(map) = &mut a {
                        map.insert("sessionId".to_string(), Value::String(sid.clone()));
                    }
                    (sid.clone(), a)
                })
                .collect();
            matching.sort_by_key(|(_, a)| std::cmp::Reverse(analysis_recency(a)));

            let mut generated_profile = None;
            if let Some((session_id, latest)) = matching.first() {
                generated_profile = load_profile(store, &slug, session_id).await?;
                if generated_profile.is_none()
                    && latest.get("profileGenerated").and_then(Value::as_bool) == Some(true)
                {
                    generated_profile = latest.get("generatedProfile").cloned();
                }
            }

            students.push(StudentInfo {
                name: name.unwrap_or_else(|| "이름 없음".to_string()),
                email: customer.get("email").cloned().unwrap_or_default(),
                purchase_date: purchase
                    .get("purchasedAt")
                    .cloned()
                    .unwrap_or_else(time::now_iso),
                purchase_status: purchase
                    .get("status")
                    .cloned()
                    .unwrap_or_else(|| "active".to_string()),
                analysis_count: matching.len(),
                last_analysis: matching.into_iter().next().map(|(_, a)| a),
                profile_generated: generated_profile.is_some(),
                generated_profile,
                user_id: customer_id,
            });
        }
        students.sort_by_key(|s| std::cmp::Reverse(time::sort_key(&s.purchase_date)));

        products.push(ProductStudents {
            product_id,
            product_name: product
                .get("title")
                .filter(|t| !t.is_empty())
                .cloned()
                .unwrap_or_else(|| "제품명 없음".to_string()),
            product_description: product.get("description").cloned().unwrap_or_default(),
            price: product.get("price").and_then(|p| p.parse().ok()).unwrap_or(0),
            student_count: students.len(),
            students,
        });
    }
    products.sort_by_key(|p| std::cmp::Reverse(p.student_count));

    let total_students: usize = products.iter().map(|p| p.student_count).sum();
    let total_products = products.len();
    Ok(Json(json!({
        "success": true,
        "products": products,
        "totalStudents": total_students,
        "totalProducts": total_products,
    })))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/:slug/pending-messages", get(pending_messages))
        .route("/api/dashboard/:slug/review-requests", get(review_requests))
        .route("/api/dashboard/:slug/send-response", post(send_response))
        .route("/api/dashboard/:slug/analysis-results", get(analysis_results))
        .route("/api/dashboard/:slug/generate-profile", post(generate_profile))
        .route(
            "/api/dashboard/:slug/students-by-product",
            get(students_by_product),
        )
        .merge(super::student_chats::student_chat_routes())
        .merge(super::consult::consult_routes())
}
