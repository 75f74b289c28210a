//! Saved consultant chats about one analysed student

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use yaktoon_common::store::DAY_SECS;
use yaktoon_common::{keys, time};

use super::{required, truncate_chars};
use crate::auth::{require_dashboard_access, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const CHAT_TTL_SECS: u64 = 365 * DAY_SECS;
const TITLE_CHARS: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatRequest {
    pub session_id: Option<String>,
    pub chat_id: Option<String>,
    pub messages: Option<Vec<Value>>,
    pub student_name: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMetadata {
    pub chat_id: String,
    pub session_id: String,
    #[serde(default)]
    pub student_name: Option<String>,
    pub title: String,
    pub created_at: String,
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub message_count: usize,
}

fn message_content(message: &Value) -> Option<&str> {
    message.get("content").and_then(Value::as_str)
}

/// Explicit title, else the start of the first message, else "New Chat"
pub fn chat_title(title: Option<&str>, messages: &[Value]) -> String {
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    messages
        .first()
        .and_then(message_content)
        .filter(|c| !c.is_empty())
        .map(|c| truncate_chars(c, TITLE_CHARS))
        .unwrap_or_else(|| "New Chat".to_string())
}

/// POST /api/dashboard/:slug/chat/save
pub async fn save_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    Json(request): Json<SaveChatRequest>,
) -> ApiResult<Json<Value>> {
    require_dashboard_access(&user, &slug)?;
    let missing = "Missing required fields";
    let session_id = required(&request.session_id, missing)?;
    let chat_id = required(&request.chat_id, missing)?;
    let messages = request
        .messages
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest(missing.to_string()))?;

    let store = state.store.as_ref();
    store
        .set_json_ex(
            &keys::student_chat(&slug, session_id, chat_id),
            &json!({
                "messages": messages,
                "studentName": request.student_name,
                "sessionId": session_id,
                "chatId": chat_id,
                "lastUpdated": time::now_iso(),
            }),
            CHAT_TTL_SECS,
        )
        .await?;

    let metadata = ChatMetadata {
        chat_id: chat_id.to_string(),
        session_id: session_id.to_string(),
        student_name: request.student_name.clone(),
        title: chat_title(request.title.as_deref(), messages),
        created_at: time::now_iso(),
        last_message: messages
            .last()
            .and_then(message_content)
            .unwrap_or_default()
            .to_string(),
        message_count: messages.len(),
    };
    store
        .set_json_ex(&keys::chat_metadata(&slug, chat_id), &metadata, CHAT_TTL_SECS)
        .await?;

    let list_key = keys::student_chats(&slug, session_id);
    store.sadd(&list_key, chat_id).await?;
    store.expire(&list_key, CHAT_TTL_SECS).await?;

    Ok(Json(json!({
        "success": true,
        "chatId": chat_id,
        "message": "Chat saved successfully",
    })))
}

/// GET /api/dashboard/:slug/chat/list
pub async fn list_chats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Value>> {
    require_dashboard_access(&user, &slug)?;
    let session_id = required(&query.session_id, "Session ID is required")?;
    let store = state.store.as_ref();

    let mut chats = Vec::new();
    for chat_id in store.smembers(&keys::student_chats(&slug, session_id)).await? {
        match store
            .get_json::<ChatMetadata>(&keys::chat_metadata(&slug, &chat_id))
            .await
        {
            Ok(Some(metadata)) => chats.push(metadata),
            Ok(None) => {}
            Err(e) => debug!(chat_id = %chat_id, "Skipping chat metadata: {}", e),
        }
    }
    chats.sort_by_key(|c| std::cmp::Reverse(time::sort_key(&c.created_at)));

    let total = chats.len();
    Ok(Json(json!({ "chats": chats, "total": total })))
}

/// GET /api/dashboard/:slug/chat/:chat_id
pub async fn get_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((slug, chat_id)): Path<(String, String)>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Value>> {
    require_dashboard_access(&user, &slug)?;
    let session_id = required(&query.session_id, "Session ID is required")?;
    let store = state.store.as_ref();

    let mut chat: Value = store
        .get_json(&keys::student_chat(&slug, session_id, &chat_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Chat not found".to_string()))?;
    let metadata: Option<Value> = store.get_json(&keys::chat_metadata(&slug, &chat_id)).await?;

    if let Value::Object(map) = &mut chat {
        map.insert("metadata".to_string(), metadata.unwrap_or(Value::Null));
    }
    Ok(Json(chat))
}

pub fn student_chat_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/:slug/chat/save", post(save_chat))
        .route("/api/dashboard/:slug/chat/list", get(list_chats))
        .route("/api/dashboard/:slug/chat/:chat_id", get(get_chat))
}
