//! Chat-completions client and the record extraction / review calls built on it
//!
//! [`ChatModel`] is the seam between the pipeline and the LLM provider. The
//! production implementation is [`OpenAiClient`], which speaks the OpenAI
//! chat-completions protocol (OpenAI itself or an OpenRouter-style gateway).

use crate::error::{ErrorCode, MedskyError};
use crate::prompts::{extraction_prompt, validation_prompt, ExtractionKind};
use crate::types::{
    AcademicDevelopment, AcademicDevelopmentsReply, CreativeActivitiesReply, CreativeActivity,
    DetailedAbilitiesReply, DetailedAbility, ExtractedData, Feedback, ProcessingStage,
    TextSections, ValidationAnalysis, ValidationResult, ValidationType,
};
use async_trait::async_trait;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Sentence reported when a review call could not be completed
pub const VALIDATION_FALLBACK_SENTENCE: &str = "오류로 인해 분석을 완료할 수 없었습니다.";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatRequest {
    /// Overrides the client's default model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Name of the structured-output schema, if one was requested
    pub fn schema_name(&self) -> Option<&str> {
        self.response_format
            .as_ref()?
            .get("json_schema")?
            .get("name")?
            .as_str()
    }
}

/// A chat-completions capable model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Text of the first choice
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;

    /// Reachability probe used by health checks
    async fn probe(&self) -> Result<(), String> {
        Ok(())
    }
}

// ============================================================================
// OpenAI-compatible client
// ============================================================================

pub struct OpenAiClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Value,
}

/// Message content arrives either as a string or as a list of text parts
fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let text: String = parts
                .iter()
                .map(|part| match part {
                    Value::String(s) => s.as_str(),
                    other => other.get("text").and_then(Value::as_str).unwrap_or(""),
                })
                .collect();
            Some(text)
        }
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

impl OpenAiClient {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into(),
            default_model: default_model.into(),
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, mut request: ChatRequest) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;
        if request.model.is_none() {
            request.model = Some(self.default_model.clone());
        }

        debug!(
            model = request.model.as_deref().unwrap_or_default(),
            messages = request.messages.len(),
            schema = request.schema_name().unwrap_or("-"),
            "Chat completion request"
        );

        let response = self
            .http_client
            .post(self.url("/chat/completions"))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| content_text(&m.content))
            .ok_or(LlmError::EmptyResponse)
    }

    async fn probe(&self) -> Result<(), String> {
        let api_key = self.api_key.as_deref().ok_or("API key not configured")?;
        let response = self
            .http_client
            .get(self.url("/models"))
            .bearer_auth(api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("status {}", response.status().as_u16()))
        }
    }
}

// ============================================================================
// Structured output
// ============================================================================

/// `response_format` for a strict JSON-schema reply
pub fn json_schema_format(name: &str, schema: Value) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": { "name": name, "schema": schema, "strict": true }
    })
}

/// `response_format` asking for any JSON object
pub fn json_object_format() -> Value {
    json!({ "type": "json_object" })
}

/// Drop a ```json fence some models wrap around their reply
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// System prompt + user content → parsed JSON reply
pub async fn structured<T: DeserializeOwned>(
    model: &dyn ChatModel,
    system_prompt: &str,
    user_content: &str,
    schema_name: &str,
    schema: Value,
) -> Result<T, LlmError> {
    let request = ChatRequest {
        response_format: Some(json_schema_format(schema_name, schema)),
        ..ChatRequest::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_content),
        ])
    };
    let raw = model.complete(request).await?;
    serde_json::from_str(strip_code_fence(&raw)).map_err(|e| LlmError::Parse(e.to_string()))
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

fn wrapper_schema(key: &str, item: Value) -> Value {
    object_schema(json!({ key: { "type": "array", "items": item } }), &[key])
}

pub fn creative_activities_schema() -> Value {
    wrapper_schema(
        "창의적체험활동상황",
        object_schema(
            json!({
                "영역": { "type": "string", "description": "해당 창의적 체험활동의 영역. 표의 영역 열 (예: 자율활동, 동아리활동, 봉사활동, 진로활동)" },
                "시간": { "type": "number", "description": "활동 시간. 표의 시간 열, 없으면 0" },
                "특기사항": { "type": "string", "description": "표의 특기사항 열 전체 내용" }
            }),
            &["영역", "시간", "특기사항"],
        ),
    )
}

pub fn academic_developments_schema() -> Value {
    wrapper_schema(
        "교과학습발달상황",
        object_schema(
            json!({
                "과목": { "type": "string", "description": "과목명" },
                "학점수": { "type": "number", "description": "학점수 (단위수)" },
                "score_over_average": { "type": "string", "description": "원점수/과목평균(표준편차) 형식 그대로" },
                "성취도": { "type": "string", "description": "성취도 (수강자수)" },
                "석차등급": { "type": "string", "description": "석차등급 (수강자수)" }
            }),
            &["과목", "학점수", "score_over_average", "성취도", "석차등급"],
        ),
    )
}

pub fn detailed_abilities_schema() -> Value {
    wrapper_schema(
        "세부특기사항",
        object_schema(
            json!({
                "과목": { "type": "string", "description": "과목명 (콜론 앞 부분)" },
                "특기사항": { "type": "string", "description": "해당 과목의 세부능력 및 특기사항 전체" }
            }),
            &["과목", "특기사항"],
        ),
    )
}

pub fn validation_result_schema() -> Value {
    let types: Vec<&str> = ValidationType::ALL.iter().map(|t| t.as_str()).collect();
    object_schema(
        json!({
            "type": { "type": "string", "enum": types },
            "Feedbacks": {
                "type": "array",
                "items": object_schema(
                    json!({
                        "sentence": { "type": "string", "description": "평가된 컨텐츠에서 피드백 대상이 되는 문장. 원본 텍스트와 반드시 동일하게 작성해야 함." },
                        "feedback": { "type": "string", "description": "컨텐츠에 대한 피드백. 해당 피드백을 왜 제시하게 됐는지에 대한 설명" }
                    }),
                    &["sentence", "feedback"],
                )
            }
        }),
        &["type", "Feedbacks"],
    )
}

// ============================================================================
// Extraction
// ============================================================================

fn extraction_error(what: &str, e: LlmError) -> MedskyError {
    MedskyError::new(
        ErrorCode::LlmExtractionFailed,
        format!("Failed to extract {}: {}", what, e),
    )
    .at(ProcessingStage::Analyzing)
}

pub async fn extract_creative_activities(
    model: &dyn ChatModel,
    text: &str,
) -> Result<Vec<CreativeActivity>, MedskyError> {
    let kind = ExtractionKind::Creative;
    structured::<CreativeActivitiesReply>(
        model,
        extraction_prompt(kind),
        text,
        kind.schema_name(),
        creative_activities_schema(),
    )
    .await
    .map(|reply| reply.items)
    .map_err(|e| extraction_error("creative activities", e))
}

pub async fn extract_academic_development(
    model: &dyn ChatModel,
    text: &str,
) -> Result<Vec<AcademicDevelopment>, MedskyError> {
    let kind = ExtractionKind::Academic;
    structured::<AcademicDevelopmentsReply>(
        model,
        extraction_prompt(kind),
        text,
        kind.schema_name(),
        academic_developments_schema(),
    )
    .await
    .map(|reply| reply.items)
    .map_err(|e| extraction_error("academic development", e))
}

pub async fn extract_detailed_abilities(
    model: &dyn ChatModel,
    text: &str,
) -> Result<Vec<DetailedAbility>, MedskyError> {
    let kind = ExtractionKind::Detailed;
    structured::<DetailedAbilitiesReply>(
        model,
        extraction_prompt(kind),
        text,
        kind.schema_name(),
        detailed_abilities_schema(),
    )
    .await
    .map(|reply| reply.items)
    .map_err(|e| extraction_error("detailed abilities", e))
}

/// Run the three table extractions concurrently; any failure fails the whole
pub async fn extract_all_data(
    model: &dyn ChatModel,
    sections: &TextSections,
) -> Result<ExtractedData, MedskyError> {
    let started = Instant::now();
    let (creative, academic, detailed) = futures::try_join!(
        extract_creative_activities(model, &sections.creative_activities),
        extract_academic_development(model, &sections.academic_development),
        extract_detailed_abilities(model, &sections.detailed_abilities),
    )?;

    info!(
        activities = creative.len(),
        subjects = academic.len(),
        abilities = detailed.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Structured extraction complete"
    );

    Ok(ExtractedData {
        creative_activities: Some(creative),
        academic_developments: Some(academic),
        detailed_abilities: Some(detailed),
    })
}

// ============================================================================
// Review feedback
// ============================================================================

fn fallback_result(kind: ValidationType, error: &str) -> ValidationResult {
    let detail: String = error.chars().take(200).collect();
    ValidationResult {
        kind,
        feedbacks: vec![Feedback {
            sentence: VALIDATION_FALLBACK_SENTENCE.to_string(),
            feedback: format!("API 오류 또는 JSON 파싱 실패: {}", detail),
        }],
    }
}

/// One review pass over `text`
///
/// Never fails: an unusable reply becomes a single explanatory feedback so the
/// rest of the analysis can still complete.
pub async fn validate_text(model: &dyn ChatModel, text: &str, kind: ValidationType) -> ValidationResult {
    let reply = structured::<ValidationResult>(
        model,
        &validation_prompt(kind),
        text,
        "validation_result",
        validation_result_schema(),
    )
    .await;

    match reply {
        Ok(mut result) => {
            result.kind = kind;
            result
        }
        Err(e) => {
            warn!(validation_type = kind.as_str(), "Validation failed: {}", e);
            fallback_result(kind, &e.to_string())
        }
    }
}

/// All five review passes over one text, concurrently
pub async fn validate_all_types(model: &dyn ChatModel, text: &str) -> ValidationAnalysis {
    let results = join_all(ValidationType::ALL.map(|kind| validate_text(model, text, kind))).await;

    let mut analysis = ValidationAnalysis::default();
    for result in results {
        let kind = result.kind;
        *analysis.get_mut(kind) = result;
    }
    analysis
}

/// Five review passes over each of the three core sections (15 calls)
///
/// Feedbacks are merged per type in section order: creative, academic, detailed.
pub async fn run_comprehensive_validation(
    model: &dyn ChatModel,
    sections: &TextSections,
) -> ValidationAnalysis {
    let started = Instant::now();
    let texts = [
        sections.creative_activities.as_str(),
        sections.academic_development.as_str(),
        sections.detailed_abilities.as_str(),
    ];

    let calls = ValidationType::ALL
        .iter()
        .flat_map(|kind| texts.iter().map(move |text| (*kind, *text)))
        .map(|(kind, text)| validate_text(model, text, kind));
    let results = join_all(calls).await;

    let mut analysis = ValidationAnalysis::default();
    for result in results {
        analysis.get_mut(result.kind).feedbacks.extend(result.feedbacks);
    }

    info!(
        feedbacks = analysis.total_feedbacks(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Comprehensive validation complete"
    );
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers by schema name; records every request
    struct ScriptedModel {
        fail_schema: Option<&'static str>,
        calls: AtomicUsize,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        fn new(fail_schema: Option<&'static str>) -> Self {
            Self {
                fail_schema,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            let schema = request.schema_name().unwrap_or_default().to_string();
            if Some(schema.as_str()) == self.fail_schema {
                return Err(LlmError::Api {
                    status: 500,
                    body: "upstream exploded".to_string(),
                });
            }
            let user = request.messages[1].content.clone();
            let reply = match schema.as_str() {
                "creative_activities" => {
                    json!({"창의적체험활동상황": [{"영역": "자율활동", "시간": 10, "특기사항": "회장"}]})
                }
                "academic_developments" => json!({"교과학습발달상황": [
                    {"과목": "국어", "학점수": 4, "score_over_average": "92/75.3(10.2)", "성취도": "A", "석차등급": "2"}
                ]}),
                "detailed_abilities" => json!({"세부특기사항": [{"과목": "국어", "특기사항": "우수함"}]}),
                // Reply with the wrong type to check it gets corrected
                "validation_result" => json!({"type": "red_check", "Feedbacks": [{"sentence": user, "feedback": "ok"}]}),
                _ => json!({}),
            };
            Ok(format!("```json\n{}\n```", reply))
        }
    }

    fn sections() -> TextSections {
        TextSections {
            creative_activities: "창체".to_string(),
            academic_development: "교과".to_string(),
            detailed_abilities: "세특".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_content_text_joins_parts() {
        assert_eq!(content_text(&json!("hi")).as_deref(), Some("hi"));
        assert_eq!(
            content_text(&json!([{"type": "text", "text": "a"}, "b", {"type": "image"}])).as_deref(),
            Some("ab")
        );
        assert_eq!(content_text(&json!(null)), None);
        assert_eq!(content_text(&json!("")), None);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_schemas_are_strict_objects() {
        let schema = validation_result_schema();
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["type"]["enum"][4], "red_check");
        let creative = creative_activities_schema();
        assert_eq!(creative["required"][0], "창의적체험활동상황");
    }

    #[tokio::test]
    async fn test_extract_all_data() {
        let model = ScriptedModel::new(None);
        let data = extract_all_data(&model, &sections()).await.unwrap();
        assert_eq!(data.creative_activities.unwrap()[0].hours, 10.0);
        assert_eq!(data.academic_developments.unwrap()[0].rank, "2");
        assert_eq!(data.detailed_abilities.unwrap()[0].subject, "국어");
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);

        let seen = model.seen.lock().unwrap();
        assert!(seen.iter().all(|r| r.messages[0].role == "system"));
        assert!(seen.iter().any(|r| r.messages[1].content == "교과"));
    }

    #[tokio::test]
    async fn test_extraction_failure_is_reported_with_code() {
        let model = ScriptedModel::new(Some("academic_developments"));
        let err = extract_all_data(&model, &sections()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::LlmExtractionFailed);
        assert_eq!(err.stage, Some(ProcessingStage::Analyzing));
        assert!(err.message.starts_with("Failed to extract academic development:"));
    }

    #[tokio::test]
    async fn test_validate_text_forces_requested_type() {
        let model = ScriptedModel::new(None);
        let result = validate_text(&model, "문장.", ValidationType::BlueLine).await;
        assert_eq!(result.kind, ValidationType::BlueLine);
        assert_eq!(result.feedbacks[0].sentence, "문장.");
    }

    #[tokio::test]
    async fn test_validate_text_falls_back_on_error() {
        let model = ScriptedModel::new(Some("validation_result"));
        let result = validate_text(&model, "문장.", ValidationType::RedLine).await;
        assert_eq!(result.kind, ValidationType::RedLine);
        assert_eq!(result.feedbacks.len(), 1);
        assert_eq!(result.feedbacks[0].sentence, VALIDATION_FALLBACK_SENTENCE);
        assert!(result.feedbacks[0].feedback.starts_with("API 오류 또는 JSON 파싱 실패: "));
        assert!(result.feedbacks[0].feedback.contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_comprehensive_validation_merges_in_section_order() {
        let model = ScriptedModel::new(None);
        let analysis = run_comprehensive_validation(&model, &sections()).await;
        assert_eq!(model.calls.load(Ordering::SeqCst), 15);
        for kind in ValidationType::ALL {
            let sentences: Vec<&str> = analysis
                .get(kind)
                .feedbacks
                .iter()
                .map(|f| f.sentence.as_str())
                .collect();
            assert_eq!(sentences, vec!["창체", "교과", "세특"]);
            assert_eq!(analysis.get(kind).kind, kind);
        }
    }

    #[tokio::test]
    async fn test_validate_all_types() {
        let model = ScriptedModel::new(None);
        let analysis = validate_all_types(&model, "본문").await;
        assert_eq!(model.calls.load(Ordering::SeqCst), 5);
        assert_eq!(analysis.total_feedbacks(), 5);
        assert_eq!(analysis.blue_highlight.kind, ValidationType::BlueHighlight);
    }

    #[tokio::test]
    async fn test_openai_client_without_key_is_not_configured() {
        let client = OpenAiClient::new(None, "http://127.0.0.1:9", "m").unwrap();
        let err = client
            .complete(ChatRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }
}
