//! HTTP API handlers for yaktoon-api

pub mod admin;
pub mod assessments;
pub mod auth;
pub mod chat;
pub mod christine;
pub mod consult;
pub mod dashboard;
pub mod health;
pub mod influencers;
pub mod kor_artis;
pub mod medsky;
pub mod messaging;
pub mod posts;
pub mod products;
pub mod purchases;
pub mod student_chats;
pub mod terry;
pub mod tools;

pub use admin::admin_routes;
pub use assessments::assessment_routes;
pub use auth::auth_routes;
pub use chat::chat_routes;
pub use christine::christine_routes;
pub use dashboard::dashboard_routes;
pub use health::health_routes;
pub use influencers::influencer_routes;
pub use kor_artis::kor_artis_routes;
pub use medsky::medsky_routes;
pub use messaging::messaging_routes;
pub use posts::post_routes;
pub use products::product_routes;
pub use purchases::purchase_routes;
pub use terry::terry_routes;
pub use tools::tool_routes;

use crate::error::{ApiError, ApiResult};
use serde::de::DeserializeOwned;
use yaktoon_common::models::User;
use yaktoon_medsky::llm::{
    json_object_format, strip_code_fence, ChatMessage, ChatModel, ChatRequest, LlmError,
};

/// A required, non-blank text field
pub(crate) fn required<'a>(value: &'a Option<String>, message: &str) -> ApiResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

/// Plain-text completion with the chat model
pub(crate) async fn complete_text(
    llm: &dyn ChatModel,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
) -> Result<String, LlmError> {
    llm.complete(
        ChatRequest::new(messages)
            .temperature(temperature)
            .max_tokens(max_tokens),
    )
    .await
}

/// JSON-object completion parsed into `T`
pub(crate) async fn complete_json<T: DeserializeOwned>(
    llm: &dyn ChatModel,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
) -> Result<T, LlmError> {
    let request = ChatRequest {
        response_format: Some(json_object_format()),
        ..ChatRequest::new(messages)
            .temperature(temperature)
            .max_tokens(max_tokens)
    };
    let raw = llm.complete(request).await?;
    serde_json::from_str(strip_code_fence(&raw)).map_err(|e| LlmError::Parse(e.to_string()))
}

/// The user id a request acts for
///
/// The id is required. Non-admins may only act for themselves.
pub(crate) fn acting_user<'a>(
    user: &User,
    user_id: &'a Option<String>,
    missing: &str,
) -> ApiResult<&'a str> {
    let user_id = required(user_id, missing)?;
    if user_id != user.id && !user.is_admin() {
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }
    Ok(user_id)
}

/// Map a model failure onto a 500 response
pub(crate) fn llm_failure(e: LlmError) -> ApiError {
    match e {
        LlmError::NotConfigured => ApiError::Internal("OpenAI API key not configured".to_string()),
        other => {
            tracing::error!("LLM request failed: {}", other);
            ApiError::Internal("AI response generation failed".to_string())
        }
    }
}

/// First `max` characters of `text`
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
