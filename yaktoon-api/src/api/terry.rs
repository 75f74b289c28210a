//! Terry's English practice: daily vocabulary and quizzes from uploaded PDFs
//!
//! A PDF upload starts a background job that extracts English sentences and
//! builds quizzes from them. The job's status and result live in the store
//! under the session id so any instance can answer polls.

use std::sync::Arc;

use anyhow::{anyhow, bail};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use yaktoon_common::{ids, keys, time, Store};
use yaktoon_medsky::llm::{ChatMessage, ChatModel};
use yaktoon_medsky::pdf::{PdfParser, UploadedFile, MAX_FILE_SIZE};

use super::{acting_user, complete_json, required};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::pdf_quiz::{self, ModelQuiz, QuizData};
use crate::srs::{self, WordDraft, TERRY};
use crate::AppState;

const MISSING_USER: &str = "사용자 ID가 필요합니다.";
const MAX_GENERATED: usize = 50;
/// Quiz sessions expire ten minutes after their last update
const QUIZ_SESSION_TTL_SECS: u64 = 10 * 60;
const MIN_TEXT_CHARS: usize = 50;
/// A sentence score at or above this counts as a correct answer
const PASSING_SCORE: f64 = 70.0;
const UPLOAD_BODY_LIMIT: usize = MAX_FILE_SIZE + 2 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyQuery {
    pub user_id: Option<String>,
    pub action: Option<String>,
}

// ============================================================================
// Vocabulary
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyRequest {
    pub action: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub category: String,
    pub count: Option<usize>,
    pub word_id: Option<String>,
    #[serde(default)]
    pub user_sentence: String,
}

#[derive(Debug, Deserialize)]
struct GeneratedWords {
    words: Vec<WordDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SentenceFeedback {
    pub score: f64,
    pub is_correct: bool,
    pub suggestions: Vec<String>,
    pub improved_sentence: String,
    pub grammar_feedback: String,
    pub naturalness_feedback: String,
}

impl Default for SentenceFeedback {
    fn default() -> Self {
        Self {
            score: PASSING_SCORE,
            is_correct: true,
            suggestions: vec!["문장을 더 자연스럽게 만들어보세요.".to_string()],
            improved_sentence: String::new(),
            grammar_feedback: "문법적으로 올바른 문장입니다.".to_string(),
            naturalness_feedback: "자연스러운 표현입니다.".to_string(),
        }
    }
}

fn fallback_words() -> Vec<WordDraft> {
    vec![
        WordDraft::new("important", "중요한", "This is an important meeting.", "이것은 중요한 회의입니다."),
        WordDraft::new(
            "develop",
            "발전시키다",
            "We need to develop new skills.",
            "우리는 새로운 기술을 개발해야 합니다.",
        ),
        WordDraft::new("opportunity", "기회", "This is a great opportunity.", "이것은 좋은 기회입니다."),
    ]
}

async fn generate_daily(state: &AppState, user_id: &str, request: &VocabularyRequest) -> ApiResult<Json<Value>> {
    let count = request.count.unwrap_or(7).clamp(1, MAX_GENERATED);
    let level = &request.level;
    let category = &request.category;
    let prompt = format!(
        r#"You are Terry English, an expert vocabulary teacher. Create {count} essential English words for Korean learners.

Level: {level}
Category: {category}

For each word, provide:
1. The English word
2. Korean meaning
3. An example sentence showing practical usage
4. Korean translation of the example

Response format (JSON only):
{{
  "words": [
    {{
      "word": "deadline",
      "meaning": "마감일, 기한",
      "example": "I need to finish this project before the deadline.",
      "translation": "나는 마감일 전에 이 프로젝트를 끝내야 한다."
    }}
  ]
}}

Focus on:
- Practical, commonly used words
- Clear, natural example sentences
- Accurate Korean translations
- Words appropriate for {level} level
- {category} context relevance"#
    );

    let drafts = match complete_json::<GeneratedWords>(state.llm.as_ref(), vec![ChatMessage::system(prompt)], 0.8, 2000)
        .await
    {
        Ok(reply) if !reply.words.is_empty() => reply.words,
        Ok(_) => fallback_words().into_iter().take(count).collect(),
        Err(e) => {
            warn!("Daily vocabulary generation failed, using fallback words: {}", e);
            fallback_words().into_iter().take(count).collect()
        }
    };

    let store = state.store.as_ref();
    let now = time::now();
    let daily_key = keys::terry_daily(user_id, &time::day_label(&now));
    let mut words = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.into_iter().enumerate() {
        let mut word = srs::new_card(draft, category, index, now.timestamp_millis());
        word.level = Some(level.clone()).filter(|l| !l.is_empty());
        TERRY.save(store, user_id, &word).await?;
        store.sadd(&daily_key, &word.id).await?;
        words.push(word);
    }
    info!(user_id, count = words.len(), "Generated daily words");

    Ok(Json(json!({
        "success": true,
        "message": format!("{}개의 새로운 단어가 생성되었습니다.", words.len()),
        "words": words,
    })))
}

async fn sentence_feedback(state: &AppState, user_id: &str, request: &VocabularyRequest) -> ApiResult<Json<Value>> {
    let store = state.store.as_ref();
    let not_found = || ApiError::NotFound("단어를 찾을 수 없습니다.".to_string());
    let word_id = request.word_id.as_deref().ok_or_else(not_found)?;
    let mut word = TERRY.load(store, user_id, word_id).await?.ok_or_else(not_found)?;

    let prompt = format!(
        r#"You are Terry English, an expert English teacher providing detailed feedback on student sentences.

Analyze the student's sentence usage of the word "{}" and provide constructive feedback.

Example sentence: "{}"
Student sentence: "{}"

Provide feedback in this JSON format:
{{
  "score": 85,
  "isCorrect": true,
  "suggestions": ["Use past tense for completed actions", "Add an article before 'project'"],
  "improvedSentence": "I finished the project yesterday.",
  "grammarFeedback": "Grammar is mostly correct. Consider using past tense.",
  "naturalnessFeedback": "The sentence sounds natural to native speakers."
}}"#,
        word.word, word.example, request.user_sentence,
    );
    let feedback = match complete_json::<SentenceFeedback>(state.llm.as_ref(), vec![ChatMessage::system(prompt)], 0.3, 800)
        .await
    {
        Ok(feedback) => feedback,
        Err(e) => {
            warn!("Sentence feedback failed: {}", e);
            SentenceFeedback {
                improved_sentence: request.user_sentence.clone(),
                ..Default::default()
            }
        }
    };

    let passed = feedback.score >= PASSING_SCORE;
    TERRY.record_answer(store, user_id, &mut word, passed).await?;

    Ok(Json(json!({
        "success": true,
        "feedback": feedback,
        "message": if passed { "훌륭합니다!" } else { "다시 한번 연습해보세요!" },
    })))
}

async fn todays_words(state: &AppState, user_id: &str) -> ApiResult<Json<Value>> {
    let store = state.store.as_ref();
    let day = time::day_label(&time::now());
    let ids = store.smembers(&keys::terry_daily(user_id, &day)).await?;
    if ids.is_empty() {
        return Ok(Json(json!({
            "success": true,
            "words": [],
            "message": "오늘의 단어가 없습니다. 새로운 단어를 생성해보세요!",
        })));
    }
    let words = TERRY.load_many(store, user_id, &ids).await?;
    Ok(Json(json!({ "success": true, "words": words })))
}

async fn vocabulary_progress(state: &AppState, user_id: &str) -> ApiResult<Json<Value>> {
    let store = state.store.as_ref();
    let due = TERRY.due(store, user_id, time::now_millis()).await?;
    Ok(Json(json!({
        "success": true,
        "progress": {
            "totalWords": TERRY.size(store, user_id).await?,
            "todayStudied": TERRY.studied_today(store, user_id).await?,
            "dueCount": due.len(),
            "studyStreak": 0,
        }
    })))
}

/// GET /api/influencers/terry/vocabulary
pub async fn vocabulary_get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<VocabularyQuery>,
) -> ApiResult<Json<Value>> {
    let user_id = acting_user(&user, &query.user_id, MISSING_USER)?;
    match query.action.as_deref() {
        Some("today") => todays_words(&state, user_id).await,
        Some("progress") => vocabulary_progress(&state, user_id).await,
        Some("due") => {
            let words = TERRY.due(state.store.as_ref(), user_id, time::now_millis()).await?;
            Ok(Json(json!({ "success": true, "words": words })))
        }
        _ => Err(ApiError::BadRequest("지원하지 않는 액션입니다.".to_string())),
    }
}

/// POST /api/influencers/terry/vocabulary
pub async fn vocabulary_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<VocabularyRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = acting_user(&user, &request.user_id, MISSING_USER)?;
    match request.action.as_deref() {
        Some("generate_daily") => generate_daily(&state, user_id, &request).await,
        Some("feedback") => sentence_feedback(&state, user_id, &request).await,
        _ => Err(ApiError::BadRequest("지원하지 않는 액션입니다.".to_string())),
    }
}

// ============================================================================
// PDF quiz job
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStage {
    Uploading,
    Parsing,
    Extracting,
    Generating,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizJobStatus {
    pub stage: QuizStage,
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QuizJobStatus {
    fn new(stage: QuizStage, progress: u8, message: &str) -> Self {
        Self {
            stage,
            progress,
            message: message.to_string(),
            error: None,
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            error: Some(reason),
            ..Self::new(QuizStage::Error, 0, "PDF 처리 중 오류가 발생했습니다.")
        }
    }
}

const QUIZ_SYSTEM_PROMPT: &str = r#"You are Terry English, a 25-year English teaching expert from University of Toronto. Your specialty is creating effective English memorization quizzes for Korean middle and high school students.

Create educational quizzes based on the provided English text. Respond ONLY in valid JSON format with the following structure:
{
  "fillInBlankQuiz": [
    {
      "sentence": "The ___ of education cannot be ___ in modern society because it ___ the foundation for personal growth",
      "blankWords": ["importance", "overstated", "provides"],
      "options": [
        ["importance", "value", "meaning", "concept"],
        ["overstated", "ignored", "forgotten", "dismissed"],
        ["provides", "creates", "builds", "establishes"]
      ]
    }
  ],
  "importantSentences": [
    "Education serves as the foundation for personal growth and development"
  ],
  "vocabularyWords": [
    {
      "word": "foundation",
      "meaning": "기초, 토대",
      "context": "Education serves as the foundation for personal growth",
      "distractors": ["기회", "목표", "방법"]
    }
  ]
}

Requirements:
- Create 5 LONG fill-in-blank questions with 2-4 blanks per sentence (15-25 words each)
- Use complex sentences that test deeper comprehension
- Each blank should test different types of words (nouns, verbs, adjectives, adverbs)
- Select 3-4 important sentences for word order exercises
- Choose 5 vocabulary words with Korean meanings
- Generate contextually appropriate distractors
- Focus on educational and meaningful content
- Ensure questions test comprehension, not just memorization
- Make sentences that flow naturally and are educationally valuable"#;

/// Store, parser and model needed by one quiz job
pub struct QuizJob {
    store: Arc<dyn Store>,
    parser: Arc<dyn PdfParser>,
    llm: Arc<dyn ChatModel>,
    session_id: String,
}

impl QuizJob {
    pub fn new(state: &AppState, session_id: String) -> Self {
        Self {
            store: state.store.clone(),
            parser: state.medsky.pdf_parser(),
            llm: state.llm.clone(),
            session_id,
        }
    }

    async fn set_status(&self, status: &QuizJobStatus) {
        debug!(session_id = %self.session_id, stage = ?status.stage, "Quiz job status");
        if let Err(e) = self
            .store
            .set_json_ex(&keys::terry_pdf_status(&self.session_id), status, QUIZ_SESSION_TTL_SECS)
            .await
        {
            error!(session_id = %self.session_id, "Failed to store quiz status: {}", e);
        }
    }

    /// Run to completion, recording progress and the outcome
    pub async fn run(self, file: UploadedFile) {
        match self.build_quiz(&file).await {
            Ok(quiz) => {
                if let Err(e) = self
                    .store
                    .set_json_ex(&keys::terry_pdf_quiz(&self.session_id), &quiz, QUIZ_SESSION_TTL_SECS)
                    .await
                {
                    error!(session_id = %self.session_id, "Failed to store quiz: {}", e);
                    self.set_status(&QuizJobStatus::failed(e.to_string())).await;
                    return;
                }
                self.set_status(&QuizJobStatus::new(QuizStage::Completed, 100, "퀴즈 생성 완료!"))
                    .await;
                info!(session_id = %self.session_id, "Quiz job completed");
            }
            Err(e) => {
                warn!(session_id = %self.session_id, "Quiz job failed: {}", e);
                self.set_status(&QuizJobStatus::failed(e.to_string())).await;
            }
        }
    }

    async fn build_quiz(&self, file: &UploadedFile) -> anyhow::Result<QuizData> {
        self.set_status(&QuizJobStatus::new(QuizStage::Parsing, 30, "PDF에서 영어 텍스트 추출 중..."))
            .await;
        let text = self.parser.parse(file).await.map_err(|e| anyhow!("{}", e))?;
        if text.trim().chars().count() < MIN_TEXT_CHARS {
            bail!("PDF에서 충분한 텍스트를 추출할 수 없습니다. 텍스트가 포함된 PDF인지 확인해주세요.");
        }

        self.set_status(&QuizJobStatus::new(QuizStage::Extracting, 50, "영어 문장 분석 중..."))
            .await;
        let sentences = pdf_quiz::extract_sentences(&text);
        if sentences.is_empty() {
            bail!("PDF에서 영어 문장을 찾을 수 없습니다. 영어 텍스트가 포함된 PDF를 업로드해주세요.");
        }

        self.set_status(&QuizJobStatus::new(
            QuizStage::Generating,
            70,
            "AI가 퀴즈 문제 생성 중... (이 과정은 1-2분 소요됩니다)",
        ))
        .await;
        let user = format!(
            "Create quizzes based on this English text:\n\n{}\n\nGenerate questions that will help Korean students learn English effectively.",
            pdf_quiz::prompt_text(&sentences)
        );
        let reply = complete_json::<ModelQuiz>(
            self.llm.as_ref(),
            vec![ChatMessage::system(QUIZ_SYSTEM_PROMPT), ChatMessage::user(user)],
            0.7,
            2000,
        )
        .await;

        let mut rng = rand::thread_rng();
        Ok(match reply {
            Ok(reply) => pdf_quiz::assemble(reply, &sentences, &mut rng),
            Err(e) => {
                warn!(session_id = %self.session_id, "Quiz generation failed, building a basic quiz: {}", e);
                pdf_quiz::basic(&sentences, &mut rng)
            }
        })
    }
}

async fn read_pdf(mut multipart: Multipart) -> ApiResult<Option<UploadedFile>> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("Invalid upload: {}", e))
    };
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("document.pdf").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(bad_form)?;
        return Ok(Some(UploadedFile::new(name, content_type, bytes.to_vec())));
    }
    Ok(None)
}

/// POST /api/influencers/terry/process-pdf
pub async fn start_quiz(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let file = read_pdf(multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    if file.content_type != "application/pdf" {
        return Err(ApiError::BadRequest("PDF 파일만 업로드 가능합니다.".to_string()));
    }
    if file.size() > MAX_FILE_SIZE {
        return Err(ApiError::BadRequest("파일 크기는 10MB 이하여야 합니다.".to_string()));
    }

    let session_id = ids::uuid();
    let status = QuizJobStatus::new(QuizStage::Uploading, 10, "파일 업로드 중...");
    state
        .store
        .set_json_ex(&keys::terry_pdf_status(&session_id), &status, QUIZ_SESSION_TTL_SECS)
        .await?;

    info!(session_id = %session_id, user_id = %user.id, size = file.size(), "Starting PDF quiz job");
    let job = QuizJob::new(&state, session_id.clone());
    tokio::spawn(job.run(file));

    Ok(Json(json!({
        "success": true,
        "sessionId": session_id,
        "status": status,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuery {
    pub session_id: Option<String>,
}

/// GET /api/influencers/terry/process-pdf
pub async fn quiz_status(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(query): Query<QuizQuery>,
) -> ApiResult<Json<Value>> {
    let session_id = required(&query.session_id, "Session ID required")?;
    let status: QuizJobStatus = state
        .store
        .get_json(&keys::terry_pdf_status(session_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    if status.stage == QuizStage::Completed {
        let quiz: Option<QuizData> = state.store.get_json(&keys::terry_pdf_quiz(session_id)).await?;
        if let Some(quiz) = quiz {
            return Ok(Json(json!({ "success": true, "status": status, "quizData": quiz })));
        }
    }
    Ok(Json(json!({ "success": true, "status": status })))
}

pub fn terry_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/influencers/terry/vocabulary",
            get(vocabulary_get).post(vocabulary_post),
        )
        .route(
            "/api/influencers/terry/process-pdf",
            post(start_quiz)
                .get(quiz_status)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let status = QuizJobStatus::new(QuizStage::Generating, 70, "생성 중");
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({ "stage": "generating", "progress": 70, "message": "생성 중" })
        );
        let failed = QuizJobStatus::failed("boom".to_string());
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["stage"], "error");
        assert_eq!(value["progress"], 0);
        assert_eq!(value["error"], "boom");
    }

    #[test]
    fn test_partial_feedback_fills_defaults() {
        let feedback: SentenceFeedback = serde_json::from_value(json!({ "score": 55 })).unwrap();
        assert_eq!(feedback.score, 55.0);
        assert!(feedback.score < PASSING_SCORE);
        assert_eq!(feedback.grammar_feedback, "문법적으로 올바른 문장입니다.");
    }

    #[test]
    fn test_fallback_words_are_three_basics() {
        let words: Vec<_> = fallback_words().into_iter().map(|w| w.word).collect();
        assert_eq!(words, ["important", "develop", "opportunity"]);
    }
}
