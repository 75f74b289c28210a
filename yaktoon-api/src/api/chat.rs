//! Persistent AI chat sessions tied to one student analysis
//!
//! A chat session is a hash at `chat:{slug}:{analysisSessionId}`; its messages
//! live in `chat:messages:{id}` (oldest first) and `chat:lookup:{id}` maps the
//! session id back to the hash key.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use yaktoon_common::{keys, time, Store};
use yaktoon_medsky::llm::ChatMessage;

use super::{complete_text, required};
use crate::auth::{require_chat_access, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Messages of history sent with each turn
const HISTORY_WINDOW: usize = 10;
/// Records quoted per section of the student profile
const PROFILE_SAMPLE: usize = 5;
const EMPTY_REPLY: &str = "Sorry, I could not generate a response.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub analysis_session_id: Option<String>,
    pub influencer_slug: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    pub chat_session_id: Option<String>,
    pub message: Option<String>,
    pub student_context: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub influencer_slug: Option<String>,
    pub analysis_session_id: Option<String>,
}

/// One stored chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredMessage {
    pub id: String,
    /// `user` or `assistant`
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

async fn load_messages(store: &dyn Store, chat_session_id: &str) -> ApiResult<Vec<StoredMessage>> {
    let raw = store.lall(&keys::chat_messages(chat_session_id)).await?;
    Ok(raw
        .iter()
        .filter_map(|entry| serde_json::from_str(entry).ok())
        .collect())
}

async fn append_message(store: &dyn Store, chat_session_id: &str, message: &StoredMessage) -> ApiResult<()> {
    let encoded = serde_json::to_string(message)
        .map_err(|e| ApiError::Internal(format!("Failed to encode chat message: {}", e)))?;
    store.rpush(&keys::chat_messages(chat_session_id), &encoded).await?;
    Ok(())
}

/// POST /api/chat/initialize
pub async fn initialize(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<InitializeRequest>,
) -> ApiResult<Json<Value>> {
    let missing = "Missing required parameters";
    let analysis_session_id = required(&request.analysis_session_id, missing)?;
    let slug = required(&request.influencer_slug, missing)?;
    require_chat_access(&user, slug)?;

    let store = state.store.as_ref();
    let chat_key = keys::chat_session(slug, analysis_session_id);
    let existing = store.hgetall(&chat_key).await?;

    if let Some(id) = existing.get("id").filter(|id| !id.is_empty()) {
        let messages = load_messages(store, id).await?;
        return Ok(Json(json!({
            "chatSessionId": id,
            "messages": messages,
            "createdAt": existing.get("createdAt"),
        })));
    }

    let chat_session_id = yaktoon_common::ids::uuid();
    let created_at = time::now_iso();
    store
        .hset(
            &chat_key,
            &[
                ("id", chat_session_id.clone()),
                ("analysisSessionId", analysis_session_id.to_string()),
                ("influencerSlug", slug.to_string()),
                ("userId", user.id.clone()),
                ("createdAt", created_at.clone()),
                ("lastMessageAt", created_at.clone()),
            ],
        )
        .await?;
    store.sadd(&keys::chat_sessions(slug), &chat_session_id).await?;
    store.set(&keys::chat_lookup(&chat_session_id), &chat_key).await?;

    info!(chat_session_id = %chat_session_id, slug, "Chat session created");
    Ok(Json(json!({
        "chatSessionId": chat_session_id,
        "messages": [],
        "createdAt": created_at,
    })))
}

fn sample_section(data: &Value, pointer: &str) -> (usize, String) {
    match data.pointer(pointer).and_then(Value::as_array) {
        Some(rows) => {
            let sample: Vec<&Value> = rows.iter().take(PROFILE_SAMPLE).collect();
            let rendered = serde_json::to_string_pretty(&sample).unwrap_or_default();
            (rows.len(), rendered)
        }
        None => (0, "데이터 없음".to_string()),
    }
}

fn whole_section(data: &Value, field: &str) -> String {
    data.get(field)
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::to_string_pretty(v).ok())
        .unwrap_or_else(|| "데이터 없음".to_string())
}

/// Student profile block of the system prompt
pub fn student_profile(context: Option<&Value>) -> String {
    let Some(context) = context.filter(|c| c.is_object()) else {
        return "⚠️ 학생 정보가 없습니다. 로그인 후 생기부를 업로드해주세요.".to_string();
    };

    let name = context.get("userName").and_then(Value::as_str).unwrap_or("");
    let analysed_on = context
        .get("createdAt")
        .and_then(Value::as_str)
        .and_then(time::parse_iso)
        .map(|dt| dt.format("%Y. %-m. %-d.").to_string())
        .unwrap_or_default();
    let mut profile = format!("학생명: {}\n분석일자: {}\n\n", name, analysed_on);

    let Some(data) = context.get("analysisData").filter(|d| d.is_object()) else {
        profile.push_str("⚠️ 생기부 분석 데이터가 없습니다. PDF 업로드가 필요합니다.");
        return profile;
    };

    let (activity_count, activities) =
        sample_section(data, "/creativeActivities/창의적체험활동상황");
    let (subject_count, subjects) =
        sample_section(data, "/academicDevelopments/교과학습발달상황");
    let (ability_count, abilities) = sample_section(data, "/detailedAbilities/세부특기사항");

    profile.push_str(&format!(
        "📚 생활기록부 분석 데이터:\n\n\
         1️⃣ 창의적체험활동 ({activity_count}개):\n{activities}\n\n\
         2️⃣ 교과학습발달상황 ({subject_count}개 과목):\n{subjects}\n\n\
         3️⃣ 세부능력 및 특기사항 ({ability_count}개):\n{abilities}\n\n\
         4️⃣ 행동특성 및 종합의견:\n{}\n\n\
         5️⃣ 진로희망사항:\n{}\n",
        whole_section(data, "behavioralCharacteristics"),
        whole_section(data, "careerAspirations"),
    ));
    profile
}

/// System prompt requiring 【】 citations from the student record
pub fn system_prompt(student_context: Option<&Value>) -> String {
    format!(
        "You are an expert educational consultant specializing in Korean student record (생활기록부) analysis and personalized academic guidance.\n\n\
         🔴 MANDATORY RESPONSE RULES:\n\
         1. EVERY response MUST cite specific data from the student's record using【】brackets\n\
         2. NEVER provide generic advice - all recommendations must link to actual student activities\n\
         3. If data is insufficient, explicitly state: \"생기부 데이터가 부족하여 구체적 조언이 어렵습니다\"\n\
         4. Use direct quotes from the student's actual records when available\n\
         5. Structure all responses with evidence-based reasoning\n\n\
         📊 STUDENT PROFILE:\n{}\n\n\
         📝 RESPONSE FORMAT REQUIREMENTS:\n\
         1. 시작: \"【생기부 기반 분석】\" 라벨 필수\n\
         2. 활동 인용: 【창체: (구체적 활동명과 내용)】\n\
         3. 학업 인용: 【교과: (과목명, 성취도, 특기사항)】\n\
         4. 특기 인용: 【특기: (구체적 내용 인용)】\n\
         5. 진로 연계: 【진로: (희망사항과 활동 연계)】\n\n\
         🎯 CONSULTATION FOCUS AREAS:\n\
         1. 강점 분석: 생기부에 나타난 구체적 성과와 역량\n\
         2. 보완점 제시: 현재 기록에서 부족한 부분과 개선 방안\n\
         3. 진로 연계성: 희망 진로와 현재 활동의 일치도\n\
         4. 대입 전략: 생기부 내용 기반 입시 전략 제안\n\n\
         모든 답변은 반드시 한국어로 작성하며, 학생의 실제 데이터를 기반으로 한 맞춤형 조언을 제공하세요.\n\
         데이터가 없는 경우 \"생기부 데이터 부족\"을 명시하고 일반적 조언은 제공하지 마세요.",
        student_profile(student_context)
    )
}

/// Model input: system prompt then the most recent history, which already ends
/// with the new user message
pub fn build_turn(student_context: Option<&Value>, history: &[StoredMessage]) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    std::iter::once(ChatMessage::system(system_prompt(student_context)))
        .chain(
            history[start..]
                .iter()
                .map(|m| ChatMessage::new(m.role.clone(), m.content.clone())),
        )
        .collect()
}

/// POST /api/chat/message
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<ChatMessageRequest>,
) -> ApiResult<Json<Value>> {
    let missing = "Missing required parameters";
    let chat_session_id = required(&request.chat_session_id, missing)?;
    let message = required(&request.message, missing)?;

    let store = state.store.as_ref();
    let chat_key = store
        .get(&keys::chat_lookup(chat_session_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Chat session not found".to_string()))?;
    let session = store.hgetall(&chat_key).await?;
    if let Some(slug) = session.get("influencerSlug") {
        require_chat_access(&user, slug)?;
    }

    let now = time::now_millis();
    let user_message = StoredMessage {
        id: now.to_string(),
        role: "user".to_string(),
        content: message.to_string(),
        timestamp: time::now_iso(),
    };
    append_message(store, chat_session_id, &user_message).await?;

    let history = load_messages(store, chat_session_id).await?;
    let turn = build_turn(request.student_context.as_ref(), &history);

    let reply = match complete_text(state.llm.as_ref(), turn, 0.7, 1000).await {
        Ok(reply) if !reply.trim().is_empty() => reply,
        Ok(_) => EMPTY_REPLY.to_string(),
        Err(e) => {
            warn!(chat_session_id, "Chat completion failed: {}", e);
            return Err(ApiError::Internal("Failed to process message".to_string()));
        }
    };

    let assistant_message = StoredMessage {
        id: (now + 1).to_string(),
        role: "assistant".to_string(),
        content: reply.clone(),
        timestamp: time::now_iso(),
    };
    append_message(store, chat_session_id, &assistant_message).await?;
    store
        .hset(&chat_key, &[("lastMessageAt", time::now_iso())])
        .await?;

    debug!(chat_session_id, messages = history.len() + 1, "Chat turn stored");
    Ok(Json(json!({
        "response": reply,
        "messageId": assistant_message.id,
    })))
}

/// GET /api/chat/history
pub async fn history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let slug = required(&query.influencer_slug, "Missing influencer slug")?;
    require_chat_access(&user, slug)?;
    let store = state.store.as_ref();

    if let Some(analysis_session_id) = query.analysis_session_id.as_deref().filter(|s| !s.is_empty()) {
        let chat = store
            .hgetall(&keys::chat_session(slug, analysis_session_id))
            .await?;
        let Some(id) = chat.get("id").filter(|id| !id.is_empty()) else {
            return Ok(Json(json!({ "chatSession": null })));
        };

        let messages = load_messages(store, id).await?;
        let mut session: Map<String, Value> = chat
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        session.insert("messages".to_string(), json!(messages));
        return Ok(Json(json!({ "chatSession": session })));
    }

    let mut sessions = Vec::new();
    for chat_session_id in store.smembers(&keys::chat_sessions(slug)).await? {
        let Some(chat_key) = store.get(&keys::chat_lookup(&chat_session_id)).await? else {
            continue;
        };
        let chat = store.hgetall(&chat_key).await?;
        let messages_key = keys::chat_messages(&chat_session_id);
        let message_count = store.llen(&messages_key).await?;
        let last_message: Option<StoredMessage> = match store.lindex(&messages_key, -1).await? {
            Some(raw) => serde_json::from_str(&raw).ok(),
            None => None,
        };

        let recency = last_message
            .as_ref()
            .map(|m| time::sort_key(&m.timestamp))
            .or_else(|| chat.get("createdAt").map(|c| time::sort_key(c)))
            .unwrap_or(0);

        let mut session: Map<String, Value> = chat
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        session.insert("messageCount".to_string(), json!(message_count));
        session.insert("lastMessage".to_string(), json!(last_message));
        sessions.push((recency, session));
    }
    sessions.sort_by_key(|(recency, _)| std::cmp::Reverse(*recency));

    let chat_sessions: Vec<_> = sessions.into_iter().map(|(_, s)| s).collect();
    Ok(Json(json!({ "chatSessions": chat_sessions })))
}

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat/initialize", post(initialize))
        .route("/api/chat/message", post(send_message))
        .route("/api/chat/history", get(history))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(i: usize) -> StoredMessage {
        StoredMessage {
            id: i.to_string(),
            role: if i % 2 == 0 { "user" } else { "assistant" }.to_string(),
            content: format!("m{}", i),
            timestamp: String::new(),
        }
    }

    #[test]
    fn test_turn_keeps_last_ten_without_duplicating_user_message() {
        let history: Vec<_> = (0..13).map(message).collect();
        let turn = build_turn(None, &history);

        assert_eq!(turn.len(), 11);
        assert_eq!(turn[0].role, "system");
        assert_eq!(turn[1].content, "m3");
        assert_eq!(turn[10].content, "m12");
        assert_eq!(turn.iter().filter(|m| m.content == "m12").count(), 1);
    }

    #[test]
    fn test_profile_without_context() {
        assert!(student_profile(None).contains("학생 정보가 없습니다"));

        let context = json!({ "userName": "김학생", "createdAt": "2025-03-05T01:00:00.000Z" });
        let profile = student_profile(Some(&context));
        assert!(profile.contains("학생명: 김학생"));
        assert!(profile.contains("분석일자: 2025. 3. 5."));
        assert!(profile.contains("PDF 업로드가 필요합니다"));
    }

    #[test]
    fn test_profile_samples_first_five_records() {
        let rows: Vec<Value> = (0..7).map(|i| json!({ "영역": format!("활동{}", i) })).collect();
        let context = json!({
            "userName": "김학생",
            "analysisData": { "creativeActivities": { "창의적체험활동상황": rows } }
        });

        let profile = student_profile(Some(&context));
        assert!(profile.contains("1️⃣ 창의적체험활동 (7개)"));
        assert!(profile.contains("활동4"));
        assert!(!profile.contains("활동5"));
        assert!(profile.contains("2️⃣ 교과학습발달상황 (0개 과목):\n데이터 없음"));
    }
}
