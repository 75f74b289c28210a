//! Student ↔ influencer messaging
//!
//! Each student has a conversation list per influencer holding JSON messages,
//! newest at the head. A student message gets an immediate AI reply; the student
//! can then ask the influencer to review that reply, which lands in the
//! influencer's review queue (see the dashboard routes).

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use yaktoon_common::events::YaktoonEvent;
use yaktoon_common::models::User;
use yaktoon_common::store::DAY_SECS;
use yaktoon_common::{ids, keys, time, Store};
use yaktoon_medsky::llm::{ChatMessage, ChatModel};

use super::{complete_text, required, truncate_chars};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub(crate) const CONVERSATION_TTL_SECS: u64 = 30 * DAY_SECS;
const NOTIFICATION_TTL_SECS: u64 = 7 * DAY_SECS;
const NOTIFICATION_PREVIEW_CHARS: usize = 100;

/// One entry of a conversation list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: String,
    /// `customer`, `ai` or `influencer`
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_request_review: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_requested: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_request_id: Option<String>,
    /// AI message id an influencer reply answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_response_for: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequestBody {
    pub ai_message_id: Option<String>,
    pub original_message: Option<String>,
    pub ai_response: Option<String>,
    pub review_reason: Option<String>,
}

/// Name shown to the influencer for a student
pub(crate) fn display_name(user: &User) -> String {
    if user.name.is_empty() {
        "Customer".to_string()
    } else {
        user.name.clone()
    }
}

/// Reply used when the model is unavailable
pub fn fallback_reply(user_name: &str, slug: &str) -> String {
    format!(
        "안녕하세요 {user_name}님! \n\n\
         질문해 주신 내용에 대해 도움을 드리고 싶지만, 지금 일시적으로 응답 생성에 문제가 있습니다. \n\n\
         더 정확하고 개인적인 답변을 원하시면 \"인플루언서 검토 요청\" 버튼을 클릭해 주세요. \
         {slug}가 직접 답변해 드릴게요!\n\n\
         감사합니다! 😊"
    )
}

async fn generate_reply(llm: &dyn ChatModel, message: &str, user_name: &str, slug: &str) -> String {
    let system = format!(
        "You are an AI assistant representing {slug}. \
         You are directly responding to customer inquiries with helpful, friendly, and professional responses in Korean. \
         Provide practical and actionable advice. Keep responses concise but comprehensive. \
         Always maintain a warm, supportive tone as if you're personally helping them."
    );
    let messages = vec![ChatMessage::system(system), ChatMessage::user(message)];

    match complete_text(llm, messages, 0.7, 500).await {
        Ok(reply) if !reply.trim().is_empty() => reply,
        Ok(_) => {
            warn!(slug, "Empty AI reply, using fallback");
            fallback_reply(user_name, slug)
        }
        Err(e) => {
            warn!(slug, "AI reply failed, using fallback: {}", e);
            fallback_reply(user_name, slug)
        }
    }
}

/// Parse every JSON entry of a conversation list, skipping malformed ones
pub(crate) async fn read_conversation(
    store: &dyn Store,
    key: &str,
) -> ApiResult<Vec<ConversationMessage>> {
    let raw = store.lall(key).await?;
    Ok(raw
        .iter()
        .filter_map(|entry| match serde_json::from_str(entry) {
            Ok(message) => Some(message),
            Err(e) => {
                debug!(key, "Skipping malformed conversation entry: {}", e);
                None
            }
        })
        .collect())
}

/// LPUSH a message onto a conversation and refresh its TTL
pub(crate) async fn push_message(
    store: &dyn Store,
    key: &str,
    message: &ConversationMessage,
) -> ApiResult<()> {
    let encoded = serde_json::to_string(message)
        .map_err(|e| ApiError::Internal(format!("Failed to encode message: {}", e)))?;
    store.lpush(key, &encoded).await?;
    store.expire(key, CONVERSATION_TTL_SECS).await?;
    Ok(())
}

/// POST /api/influencer/:slug/send-message
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Json<Value>> {
    let content = required(&request.message, "Message is required")?;
    let user_name = display_name(&user);
    let store = state.store.as_ref();

    let customer_message = ConversationMessage {
        id: ids::uuid(),
        role: "customer".to_string(),
        content: content.to_string(),
        timestamp: time::now_iso(),
        status: Some("sent".to_string()),
        user_id: Some(user.id.clone()),
        user_email: Some(user.email.clone()),
        user_name: Some(user_name.clone()),
        ..Default::default()
    };

    let reply = generate_reply(state.llm.as_ref(), content, &user_name, &slug).await;
    let ai_message = ConversationMessage {
        id: ids::uuid(),
        role: "ai".to_string(),
        content: reply.clone(),
        timestamp: time::now_iso(),
        status: Some("delivered".to_string()),
        response_source: Some("ai".to_string()),
        can_request_review: Some(true),
        ..Default::default()
    };

    let conversation_key = keys::conversation(&slug, &user.id);
    push_message(store, &conversation_key, &customer_message).await?;
    push_message(store, &conversation_key, &ai_message).await?;

    let ids_key = keys::user_message_ids(&slug, &user.id);
    store.sadd(&ids_key, &customer_message.id).await?;
    store.sadd(&ids_key, &ai_message.id).await?;
    store.expire(&ids_key, CONVERSATION_TTL_SECS).await?;

    info!(slug = %slug, user_id = %user.id, "Message sent with AI reply");
    Ok(Json(json!({
        "success": true,
        "messageId": customer_message.id,
        "aiMessageId": ai_message.id,
        "aiResponse": reply,
        "responseType": "immediate",
        "message": "Message sent and AI response generated",
    })))
}

/// Conversation in chronological order, merged with legacy message hashes
pub async fn load_messages(
    store: &dyn Store,
    slug: &str,
    user_id: &str,
) -> ApiResult<Vec<ConversationMessage>> {
    let mut messages = read_conversation(store, &keys::conversation(slug, user_id)).await?;
    messages.reverse();
    for message in &mut messages {
        message.status.get_or_insert_with(|| "delivered".to_string());
    }

    for message_id in store.smembers(&keys::user_message_ids(slug, user_id)).await? {
        let hash = store.hgetall(&keys::message(slug, &message_id)).await?;
        if hash.is_empty() {
            continue;
        }
        if !messages.iter().any(|m| m.id == message_id) {
            messages.push(ConversationMessage {
                id: message_id.clone(),
                role: hash.get("role").cloned().unwrap_or_else(|| "customer".to_string()),
                content: hash.get("content").cloned().unwrap_or_default(),
                timestamp: hash.get("timestamp").cloned().unwrap_or_default(),
                status: Some(hash.get("status").cloned().unwrap_or_else(|| "pending".to_string())),
                ..Default::default()
            });
        }

        let response = store.hgetall(&keys::message_response(slug, &message_id)).await?;
        let response_id = format!("{}-response", message_id);
        if !response.is_empty() && !messages.iter().any(|m| m.id == response_id) {
            messages.push(ConversationMessage {
                id: response_id,
                role: "influencer".to_string(),
                content: response.get("content").cloned().unwrap_or_default(),
                timestamp: response.get("timestamp").cloned().unwrap_or_default(),
                status: Some("sent".to_string()),
                response_source: Some("influencer".to_string()),
                ..Default::default()
            });
        }
    }

    messages.sort_by_key(|m| time::sort_key(&m.timestamp));
    Ok(messages)
}

/// GET /api/influencer/:slug/messages
pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    let messages = load_messages(state.store.as_ref(), &slug, &user.id).await?;
    Ok(Json(json!({ "messages": messages })))
}

/// Flag the AI message a review was requested for, keeping list order
async fn mark_review_requested(
    store: &dyn Store,
    conversation_key: &str,
    ai_message_id: &str,
    review_request_id: &str,
) -> ApiResult<()> {
    let raw = store.lall(conversation_key).await?;
    if raw.is_empty() {
        return Ok(());
    }

    let mut updated = Vec::with_capacity(raw.len());
    for entry in raw {
        match serde_json::from_str::<ConversationMessage>(&entry) {
            Ok(mut message) if message.id == ai_message_id => {
                message.review_requested = Some(true);
                message.review_request_id = Some(review_request_id.to_string());
                let encoded = serde_json::to_string(&message)
                    .map_err(|e| ApiError::Internal(format!("Failed to encode message: {}", e)))?;
                updated.push(encoded);
            }
            _ => updated.push(entry),
        }
    }

    store.del(conversation_key).await?;
    for entry in &updated {
        store.rpush(conversation_key, entry).await?;
    }
    store.expire(conversation_key, CONVERSATION_TTL_SECS).await?;
    Ok(())
}

/// POST /api/influencer/:slug/request-review
pub async fn request_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    Json(request): Json<ReviewRequestBody>,
) -> ApiResult<Json<Value>> {
    let missing = "Missing required fields";
    let ai_message_id = required(&request.ai_message_id, missing)?;
    let original_message = required(&request.original_message, missing)?;
    let ai_response = required(&request.ai_response, missing)?;

    let store = state.store.as_ref();
    let user_name = display_name(&user);
    let review_request_id = ids::uuid();
    let timestamp = time::now_iso();

    let request_key = keys::review_request(&slug, &review_request_id);
    store
        .hset(
            &request_key,
            &[
                ("id", review_request_id.clone()),
                ("userId", user.id.clone()),
                ("userEmail", user.email.clone()),
                ("userName", user_name.clone()),
                ("originalMessage", original_message.to_string()),
                ("aiResponse", ai_response.to_string()),
                ("aiMessageId", ai_message_id.to_string()),
                ("reviewReason", request.review_reason.clone().unwrap_or_default()),
                ("timestamp", timestamp.clone()),
                ("status", "pending".to_string()),
            ],
        )
        .await?;
    store.expire(&request_key, CONVERSATION_TTL_SECS).await?;

    let queue_key = keys::review_requests(&slug);
    store.lpush(&queue_key, &review_request_id).await?;
    store.expire(&queue_key, CONVERSATION_TTL_SECS).await?;

    mark_review_requested(
        store,
        &keys::conversation(&slug, &user.id),
        ai_message_id,
        &review_request_id,
    )
    .await?;

    let notification = json!({
        "type": "review_request",
        "reviewRequestId": review_request_id,
        "userName": user_name,
        "originalMessage": truncate_chars(original_message, NOTIFICATION_PREVIEW_CHARS),
        "timestamp": timestamp,
    });
    let notifications_key = keys::notifications(&slug);
    store.lpush(&notifications_key, &notification.to_string()).await?;
    store.expire(&notifications_key, NOTIFICATION_TTL_SECS).await?;

    state.events.emit(YaktoonEvent::ReviewRequested {
        influencer_slug: slug.clone(),
        review_request_id: review_request_id.clone(),
        timestamp: time::now(),
    });

    info!(slug = %slug, review_request_id = %review_request_id, "Review requested");
    Ok(Json(json!({
        "success": true,
        "reviewRequestId": review_request_id,
        "message": "Review request sent successfully",
    })))
}

pub fn messaging_routes() -> Router<AppState> {
    Router::new()
        .route("/api/influencer/:slug/send-message", post(send_message))
        .route("/api/influencer/:slug/messages", get(get_messages))
        .route("/api/influencer/:slug/request-review", post(request_review))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use yaktoon_common::MemoryStore;

    #[test]
    fn test_fallback_names_user_and_influencer() {
        let reply = fallback_reply("지민", "terry");
        assert!(reply.starts_with("안녕하세요 지민님!"));
        assert!(reply.contains("terry가 직접 답변해 드릴게요!"));
    }

    #[test]
    fn test_message_serialization_skips_absent_fields() {
        let message = ConversationMessage {
            id: "m1".to_string(),
            role: "ai".to_string(),
            can_request_review: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["canRequestReview"], true);
        assert!(json.get("reviewRequested").is_none());
        assert!(json.get("userId").is_none());
    }

    #[tokio::test]
    async fn test_load_messages_merges_legacy_hashes() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let key = keys::conversation("terry", "u1");

        for (id, role, ts) in [
            ("c1", "customer", "2025-01-01T00:00:01.000Z"),
            ("a1", "ai", "2025-01-01T00:00:02.000Z"),
        ] {
            let message = ConversationMessage {
                id: id.to_string(),
                role: role.to_string(),
                timestamp: ts.to_string(),
                ..Default::default()
            };
            push_message(store.as_ref(), &key, &message).await.unwrap();
        }

        store.sadd(&keys::user_message_ids("terry", "u1"), "old").await.unwrap();
        store
            .hset(
                &keys::message("terry", "old"),
                &[
                    ("content", "legacy question".to_string()),
                    ("timestamp", "2024-12-31T00:00:00.000Z".to_string()),
                ],
            )
            .await
            .unwrap();
        store
            .hset(
                &keys::message_response("terry", "old"),
                &[
                    ("content", "legacy answer".to_string()),
                    ("timestamp", "2025-01-01T00:00:00.000Z".to_string()),
                ],
            )
            .await
            .unwrap();

        let messages = load_messages(store.as_ref(), "terry", "u1").await.unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["old", "old-response", "c1", "a1"]);
        assert_eq!(messages[0].role, "customer");
        assert_eq!(messages[0].status.as_deref(), Some("pending"));
        assert_eq!(messages[1].role, "influencer");
        assert_eq!(messages[2].status.as_deref(), Some("delivered"));
    }

    #[tokio::test]
    async fn test_mark_review_requested_preserves_order() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let key = keys::conversation("terry", "u1");
        for id in ["c1", "a1", "c2", "a2"] {
            let message = ConversationMessage {
                id: id.to_string(),
                role: "ai".to_string(),
                ..Default::default()
            };
            push_message(store.as_ref(), &key, &message).await.unwrap();
        }

        mark_review_requested(store.as_ref(), &key, "a1", "rr1").await.unwrap();

        let messages = read_conversation(store.as_ref(), &key).await.unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a2", "c2", "a1", "c1"]);
        assert_eq!(messages[2].review_requested, Some(true));
        assert_eq!(messages[2].review_request_id.as_deref(), Some("rr1"));
        assert_eq!(messages[0].review_requested, None);
    }
}
