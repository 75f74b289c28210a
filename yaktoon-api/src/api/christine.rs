//! Christine's English practice: vocabulary deck, role-play and core phrases

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};
use yaktoon_common::models::StudyWord;
use yaktoon_common::{ids, keys, time};
use yaktoon_medsky::llm::ChatMessage;

use super::{acting_user, complete_json, complete_text};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::srs::{self, WordDraft, CHRISTINE};
use crate::AppState;

const MISSING_USER: &str = "사용자 ID가 필요합니다.";
const UNSUPPORTED_ACTION: &str = "지원하지 않는 액션입니다.";
const DUE_SAMPLE_SIZE: usize = 10;
const MAX_GENERATED: usize = 50;
const ROLEPLAY_TTL_SECS: u64 = 30 * 60;
/// Non-system messages shown to the model when replying
const ROLEPLAY_CONTEXT: usize = 6;
const SIMILARITY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorQuery {
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub month: Option<String>,
    pub week: Option<String>,
}

fn unsupported() -> ApiError {
    ApiError::BadRequest(UNSUPPORTED_ACTION.to_string())
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
    pub category: String,
    pub subcategory: Option<String>,
    pub count: Option<usize>,
    pub word_id: Option<String>,
    pub user_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedWords {
    words: Vec<WordDraft>,
}

fn category_label(category: &str) -> &str {
    match category {
        "travel" => "여행",
        "smalltalk" => "일상 대화",
        "business" => "비즈니스",
        other => other,
    }
}

fn fallback_words() -> Vec<WordDraft> {
    vec![
        WordDraft::new("hello", "안녕하세요", "Hello, how are you?", "안녕하세요, 어떻게 지내세요?")
            .pronunciation("həˈloʊ")
            .difficulty("basic"),
        WordDraft::new("thank you", "감사합니다", "Thank you very much.", "정말 감사합니다.")
            .pronunciation("θæŋk juː")
            .difficulty("basic"),
        WordDraft::new(
            "excuse me",
            "실례합니다",
            "Excuse me, where is the bathroom?",
            "실례합니다, 화장실이 어디인가요?",
        )
        .pronunciation("ɪkˈskjuːs miː")
        .difficulty("basic"),
    ]
}

fn vocabulary_prompt(category: &str, subcategory: Option<&str>, count: usize) -> String {
    let topic = match subcategory {
        Some(sub) => format!("{} ({})", category_label(category), sub),
        None => category_label(category).to_string(),
    };
    format!(
        r#"You are Christine, an expert English vocabulary teacher for Korean learners.

Create {count} practical English vocabulary words for the category: {topic}.

For each word, provide:
1. English word
2. Korean meaning
3. Pronunciation (IPA or simple phonetic)
4. Example sentence in English
5. Korean translation of example
6. Difficulty level (basic/intermediate/advanced)

Response format (JSON only):
{{
  "words": [
    {{
      "word": "reservation",
      "meaning": "예약",
      "pronunciation": "ˌrezərˈveɪʃən",
      "example": "I have a reservation under Kim.",
      "translation": "김씨 이름으로 예약했습니다.",
      "difficulty": "intermediate"
    }}
  ]
}}

Focus on:
- Practical, commonly used words
- Words appropriate for the category
- Clear, natural example sentences
- Accurate Korean translations"#
    )
}

/// A blank answer never matches; otherwise either side may contain the other
pub fn answer_matches(meaning: &str, answer: &str) -> bool {
    let meaning = meaning.to_lowercase();
    let answer = answer.trim().to_lowercase();
    !answer.is_empty() && (meaning.contains(&answer) || answer.contains(&meaning))
}

async fn vocabulary_progress(state: &AppState, user_id: &str) -> ApiResult<Json<Value>> {
    let store = state.store.as_ref();
    let words = CHRISTINE.all(store, user_id).await?;
    let now = time::now_millis();

    let mut categories: HashMap<&str, usize> =
        [("travel", 0), ("smalltalk", 0), ("business", 0)].into_iter().collect();
    for word in &words {
        if let Some(count) = categories.get_mut(word.category.as_str()) {
            *count += 1;
        }
    }
    let due_count = words.iter().filter(|w| srs::is_due(w, now)).count();

    Ok(Json(json!({
        "success": true,
        "progress": {
            "totalWords": CHRISTINE.size(store, user_id).await?,
            "todayStudied": CHRISTINE.studied_today(store, user_id).await?,
            "dueCount": due_count,
            "studyStreak": 1,
            "categoryProgress": categories,
        }
    })))
}

async fn due_words(state: &AppState, user_id: &str) -> ApiResult<Json<Value>> {
    let words = CHRISTINE
        .due_sample(state.store.as_ref(), user_id, time::now_millis(), DUE_SAMPLE_SIZE)
        .await?;
    Ok(Json(json!({ "success": true, "words": words })))
}

async fn generate_study_words(
    state: &AppState,
    user_id: &str,
    request: &VocabularyRequest,
) -> ApiResult<Json<Value>> {
    let count = request.count.unwrap_or(10).clamp(1, MAX_GENERATED);
    let subcategory = request.subcategory.as_deref().filter(|s| !s.is_empty());
    let prompt = vocabulary_prompt(&request.category, subcategory, count);

    let drafts = match complete_json::<GeneratedWords>(
        state.llm.as_ref(),
        vec![ChatMessage::system(prompt)],
        0.8,
        2000,
    )
    .await
    {
        Ok(reply) if !reply.words.is_empty() => reply.words,
        Ok(_) => fallback_words().into_iter().take(count).collect(),
        Err(e) => {
            warn!("Vocabulary generation failed, using fallback words: {}", e);
            fallback_words().into_iter().take(count).collect()
        }
    };

    let store = state.store.as_ref();
    let now = time::now_millis();
    let mut words: Vec<StudyWord> = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.into_iter().enumerate() {
        let mut word = srs::new_card(draft, &request.category, index, now);
        word.subcategory = Some(subcategory.unwrap_or("general").to_string());
        CHRISTINE.save(store, user_id, &word).await?;
        store
            .sadd(&keys::christine_category(user_id, &request.category), &word.id)
            .await?;
        words.push(word);
    }
    info!(user_id, count = words.len(), category = %request.category, "Generated study words");

    Ok(Json(json!({
        "success": true,
        "message": format!("{}개의 새로운 단어가 생성되었습니다.", words.len()),
        "words": words,
    })))
}

async fn check_answer(
    state: &AppState,
    user_id: &str,
    request: &VocabularyRequest,
) -> ApiResult<Json<Value>> {
    let store = state.store.as_ref();
    let not_found = || ApiError::NotFound("단어를 찾을 수 없습니다.".to_string());
    let word_id = request.word_id.as_deref().ok_or_else(not_found)?;
    let mut word = CHRISTINE.load(store, user_id, word_id).await?.ok_or_else(not_found)?;

    let is_correct = answer_matches(&word.meaning, request.user_answer.as_deref().unwrap_or_default());
    CHRISTINE.record_answer(store, user_id, &mut word, is_correct).await?;

    Ok(Json(json!({
        "success": true,
        "isCorrect": is_correct,
        "correctAnswer": word.meaning,
        "updatedWord": word,
        "message": if is_correct { "정답입니다!" } else { "다시 한번 연습해보세요!" },
    })))
}

/// GET /api/influencers/christine/vocabulary
pub async fn vocabulary_get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<TutorQuery>,
) -> ApiResult<Json<Value>> {
    let user_id = acting_user(&user, &query.user_id, MISSING_USER)?;
    match query.action.as_deref() {
        Some("progress") => vocabulary_progress(&state, user_id).await,
        Some("due_words") => due_words(&state, user_id).await,
        _ => Err(unsupported()),
    }
}

/// POST /api/influencers/christine/vocabulary
pub async fn vocabulary_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<VocabularyRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = acting_user(&user, &request.user_id, MISSING_USER)?;
    match request.action.as_deref() {
        Some("generate_study_words") => generate_study_words(&state, user_id, &request).await,
        Some("get_due_words") => due_words(&state, user_id).await,
        Some("check_answer") => check_answer(&state, user_id, &request).await,
        _ => Err(unsupported()),
    }
}

// ============================================================================
// Role-play
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Ai,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFeedback {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub naturalness: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleplayMessage {
    pub id: String,
    pub role: Speaker,
    pub content: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<MessageFeedback>,
}

impl RoleplayMessage {
    fn new(role: Speaker, content: String, timestamp: i64) -> Self {
        Self {
            id: ids::uuid(),
            role,
            content,
            timestamp,
            feedback: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleplaySession {
    pub id: String,
    /// Owner of the session
    pub user_id: String,
    pub scenario: String,
    pub context: String,
    pub difficulty: String,
    pub messages: Vec<RoleplayMessage>,
    pub total_score: i64,
    pub completed_turns: i64,
    pub start_time: i64,
}

impl RoleplaySession {
    /// The last few spoken lines, as `Student:` / `Christine:` transcript
    pub fn recent_transcript(&self) -> String {
        let spoken: Vec<&RoleplayMessage> =
            self.messages.iter().filter(|m| m.role != Speaker::System).collect();
        let start = spoken.len().saturating_sub(ROLEPLAY_CONTEXT);
        spoken[start..]
            .iter()
            .map(|m| {
                let who = if m.role == Speaker::User { "Student" } else { "Christine" };
                format!("{}: {}", who, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleplayRequest {
    pub action: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub context: String,
    pub difficulty: Option<String>,
    pub session_id: Option<String>,
    pub message: Option<String>,
    pub message_id: Option<String>,
}

const OPENING_FALLBACK: &str = "Hello! Let's start our role-play practice. How can I help you today?";
const EMPTY_REPLY_FALLBACK: &str = "That's great! Please continue.";
const REPLY_FALLBACK: &str = "That sounds good. What would you like to say next?";

fn fallback_feedback(message: &str) -> MessageFeedback {
    MessageFeedback {
        score: 7.0,
        naturalness: "좋은 표현입니다! 계속 연습하면 더욱 자연스러워질 거예요.".to_string(),
        suggestions: vec![
            "더 다양한 표현을 사용해보세요.".to_string(),
            "문장을 조금 더 길게 만들어보면 좋겠어요.".to_string(),
        ],
        improved_version: Some(message.to_string()),
    }
}

async fn save_session(state: &AppState, session: &RoleplaySession) -> ApiResult<()> {
    state
        .store
        .set_json_ex(&keys::christine_roleplay(&session.id), session, ROLEPLAY_TTL_SECS)
        .await?;
    Ok(())
}

/// The caller's session; sessions owned by someone else look missing
async fn load_session(state: &AppState, user_id: &str, session_id: Option<&str>) -> ApiResult<RoleplaySession> {
    let not_found = || ApiError::NotFound("세션을 찾을 수 없습니다.".to_string());
    let session_id = session_id.ok_or_else(not_found)?;
    let session: RoleplaySession = state
        .store
        .get_json(&keys::christine_roleplay(session_id))
        .await?
        .ok_or_else(not_found)?;
    if session.user_id != user_id {
        return Err(not_found());
    }
    Ok(session)
}

async fn start_conversation(state: &AppState, user_id: &str, request: &RoleplayRequest) -> ApiResult<Json<Value>> {
    let difficulty = request.difficulty.clone().unwrap_or_else(|| "intermediate".to_string());
    let prompt = format!(
        "You are Christine, a friendly and experienced English conversation teacher. You're helping Korean students practice English through role-play scenarios.

Scenario: {}
Context: {}
Difficulty: {difficulty}

Generate a natural opening message to start the conversation. Use appropriate level of English for {difficulty} learners. Be encouraging and set the scene clearly.

Response should be 1-2 sentences, natural and conversational.",
        request.scenario, request.context,
    );
    let opening = match complete_text(state.llm.as_ref(), vec![ChatMessage::system(prompt)], 0.8, 200).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => OPENING_FALLBACK.to_string(),
        Err(e) => {
            warn!("Role-play opening failed: {}", e);
            OPENING_FALLBACK.to_string()
        }
    };

    let now = time::now_millis();
    let session = RoleplaySession {
        id: ids::uuid(),
        user_id: user_id.to_string(),
        scenario: request.scenario.clone(),
        context: request.context.clone(),
        difficulty,
        messages: vec![
            RoleplayMessage::new(Speaker::System, format!("🎭 Role-play 시작: {}", request.context), now),
            RoleplayMessage::new(Speaker::Ai, opening, now + 1000),
        ],
        total_score: 0,
        completed_turns: 0,
        start_time: now,
    };
    save_session(state, &session).await?;
    info!(session_id = %session.id, user_id, "Role-play session started");

    Ok(Json(json!({
        "success": true,
        "session": session,
        "message": "새로운 Role-play 세션이 시작되었습니다.",
    })))
}

async fn send_message(state: &AppState, user_id: &str, request: &RoleplayRequest) -> ApiResult<Json<Value>> {
    let mut session = load_session(state, user_id, request.session_id.as_deref()).await?;
    let message = request.message.clone().unwrap_or_default();
    let transcript = session.recent_transcript();
    let now = time::now_millis();
    session.messages.push(RoleplayMessage::new(Speaker::User, message.clone(), now));

    let prompt = format!(
        "You are Christine, a patient and encouraging English conversation teacher conducting a role-play session.

Scenario: {}
Context: {}
Difficulty: {difficulty}

Guidelines:
- Respond naturally to continue the conversation
- Match the scenario and context
- Use appropriate difficulty level for {difficulty} learners
- Be encouraging and helpful
- Keep responses 1-3 sentences
- Stay in character for the role-play scenario

Recent conversation:
{transcript}

Student just said: {message}

Respond as Christine in the role-play scenario:",
        session.scenario,
        session.context,
        difficulty = session.difficulty,
    );
    let reply = match complete_text(state.llm.as_ref(), vec![ChatMessage::system(prompt)], 0.8, 300).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => EMPTY_REPLY_FALLBACK.to_string(),
        Err(e) => {
            warn!("Role-play reply failed: {}", e);
            REPLY_FALLBACK.to_string()
        }
    };
    session.messages.push(RoleplayMessage::new(Speaker::Ai, reply, now + 1000));
    session.completed_turns += 1;
    save_session(state, &session).await?;

    Ok(Json(json!({
        "success": true,
        "session": session,
        "message": "메시지가 전송되었습니다.",
    })))
}

async fn get_feedback(state: &AppState, user_id: &str, request: &RoleplayRequest) -> ApiResult<Json<Value>> {
    let mut session = load_session(state, user_id, request.session_id.as_deref()).await?;
    let message_id = request.message_id.as_deref().unwrap_or_default();
    let index = session
        .messages
        .iter()
        .position(|m| m.id == message_id && m.role == Speaker::User)
        .ok_or_else(|| ApiError::NotFound("메시지를 찾을 수 없습니다.".to_string()))?;
    let content = session.messages[index].content.clone();

    let prompt = format!(
        r#"You are Christine, an expert English teacher providing feedback on student conversation.

Analyze this student message in the context of the role-play scenario and provide constructive feedback.

Scenario: {}
Context: {}
Student message: "{content}"

Provide feedback in this JSON format:
{{
  "score": 8,
  "naturalness": "자연스러운 표현입니다. 원어민이 실제로 사용하는 표현이에요.",
  "suggestions": ["Consider using 'I'd like to' instead of 'I want to' for more politeness", "Try adding 'please' to make it sound more polite"],
  "improvedVersion": "I'd like to check in, please."
}}

Score: 1-10 (naturalness and appropriateness)
Naturalness: Korean explanation of how natural the expression sounds
Suggestions: 2-3 practical improvement tips in English
ImprovedVersion: (optional) better version if significant improvement is needed"#,
        session.scenario, session.context,
    );
    let feedback = match complete_json::<MessageFeedback>(
        state.llm.as_ref(),
        vec![ChatMessage::system(prompt)],
        0.3,
        500,
    )
    .await
    {
        Ok(feedback) => feedback,
        Err(e) => {
            warn!("Role-play feedback failed: {}", e);
            fallback_feedback(&content)
        }
    };

    session.messages[index].feedback = Some(feedback.clone());
    save_session(state, &session).await?;

    Ok(Json(json!({
        "success": true,
        "session": session,
        "feedback": feedback,
        "message": "피드백이 생성되었습니다.",
    })))
}

/// POST /api/influencers/christine/roleplay
pub async fn roleplay(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<RoleplayRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = acting_user(&user, &request.user_id, MISSING_USER)?;
    match request.action.as_deref() {
        Some("start_conversation") => start_conversation(&state, user_id, &request).await,
        Some("send_message") => send_message(&state, user_id, &request).await,
        Some("get_feedback") => get_feedback(&state, user_id, &request).await,
        _ => Err(unsupported()),
    }
}

// ============================================================================
// Core phrases
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeQuestion {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub original_phrase: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestions {
    questions: Vec<PracticeQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorePhraseRequest {
    pub action: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub week: String,
    #[serde(default)]
    pub phrases: Vec<String>,
    pub count: Option<usize>,
    #[serde(default)]
    pub questions: Vec<PracticeQuestion>,
    #[serde(default)]
    pub user_answers: HashMap<String, String>,
}

/// Fill-in-blank questions built without the model: the middle word is blanked
pub fn fallback_questions(phrases: &[String], count: usize, now_ms: i64) -> Vec<PracticeQuestion> {
    phrases
        .iter()
        .take(count)
        .enumerate()
        .filter_map(|(i, phrase)| {
            let words: Vec<&str> = phrase.split(' ').collect();
            if words.len() < 3 {
                return None;
            }
            let key_index = words.len() / 2;
            let key_word = words[key_index];
            let blanked = words
                .iter()
                .enumerate()
                .map(|(idx, w)| if idx == key_index { "____" } else { *w })
                .collect::<Vec<_>>()
                .join(" ");
            let mut options: Vec<String> = Vec::new();
            for option in [key_word, "is", "the", "can"] {
                if !options.iter().any(|o| o == option) {
                    options.push(option.to_string());
                }
            }
            Some(PracticeQuestion {
                id: format!("fallback-{}-{}", now_ms, i),
                kind: "fill_blank".to_string(),
                original_phrase: phrase.clone(),
                question: format!("다음 빈칸에 알맞은 단어를 선택하세요: \"{}\"", blanked),
                answer: key_word.to_string(),
                options: Some(options),
                explanation: Some("문맥에 맞는 단어를 선택해주세요.".to_string()),
            })
        })
        .collect()
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut current = Vec::with_capacity(b.len() + 1);
        current.push(i + 1);
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current.push(substitution.min(previous[j + 1] + 1).min(current[j] + 1));
        }
        previous = current;
    }
    previous[b.len()]
}

/// 1 for equal strings, 0.9 when one contains the other, else edit-distance based
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.contains(b) || b.contains(a) {
        return 0.9;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longer = a.len().max(b.len());
    if longer == 0 {
        return 1.0;
    }
    (longer - levenshtein(&a, &b)) as f64 / longer as f64
}

/// (correct, completed ids) over the answered questions
pub fn grade(questions: &[PracticeQuestion], answers: &HashMap<String, String>) -> (usize, Vec<String>) {
    let mut correct = 0;
    let mut completed = Vec::new();
    for question in questions {
        let Some(answer) = answers.get(&question.id).filter(|a| !a.is_empty()) else {
            continue;
        };
        completed.push(question.id.clone());
        let is_correct = if question.options.is_some() {
            *answer == question.answer
        } else {
            similarity(&answer.trim().to_lowercase(), &question.answer.trim().to_lowercase())
                > SIMILARITY_THRESHOLD
        };
        if is_correct {
            correct += 1;
        }
    }
    (correct, completed)
}

async fn core_phrase_progress(state: &AppState, user_id: &str, query: &TutorQuery) -> ApiResult<Json<Value>> {
    let month = query.month.as_deref().unwrap_or_default();
    let week = query.week.as_deref().unwrap_or_default();
    let hash = state
        .store
        .hgetall(&keys::christine_core_phrase(user_id, month, week))
        .await?;
    if hash.is_empty() {
        return Ok(Json(json!({ "success": true, "progress": null })));
    }

    let completed: Vec<String> = hash
        .get("completedQuestions")
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();
    let number = |field: &str| hash.get(field).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
    Ok(Json(json!({
        "success": true,
        "progress": {
            "monthKey": month,
            "weekKey": week,
            "completedQuestions": completed,
            "score": number("score"),
            "lastStudied": number("lastStudied"),
        }
    })))
}

async fn generate_questions(state: &AppState, request: &CorePhraseRequest) -> ApiResult<Json<Value>> {
    let count = request.count.unwrap_or(10).clamp(1, MAX_GENERATED);
    let system = format!(
        r#"You are Christine, an expert English conversation teacher specializing in practical English patterns for Korean learners.

Create {count} diverse practice questions based on the given phrases from {month} {week} curriculum.

Generate 3 types of questions:
1. Fill-in-blank: Remove 1-2 key words and provide multiple choice options
2. Complete sentence: Give a situation and ask to complete using the pattern
3. Variation: Ask for alternative ways to express the same meaning

For each question, provide:
- type: "fill_blank", "complete_sentence", or "variation"
- originalPhrase: the source phrase
- question: the question text in Korean
- answer: the correct answer
- options: array of 4 choices (for multiple choice questions)
- explanation: helpful tip in Korean

Respond in JSON format:
{{
  "questions": [
    {{
      "type": "fill_blank",
      "originalPhrase": "I'd like to check in.",
      "question": "다음 빈칸에 알맞은 단어를 선택하세요: I'd ____ to check in.",
      "answer": "like",
      "options": ["like", "want", "need", "wish"],
      "explanation": "'I'd like to'는 정중한 요청 표현입니다."
    }}
  ]
}}"#,
        month = request.month,
        week = request.week,
    );
    let user = format!(
        "Create practice questions for these phrases:\n{}\n\nTheme: {} {}\nFocus on practical usage and natural conversation patterns.",
        request.phrases.join("\n"),
        request.month,
        request.week,
    );

    let now = time::now_millis();
    let questions = match complete_json::<GeneratedQuestions>(
        state.llm.as_ref(),
        vec![ChatMessage::system(system), ChatMessage::user(user)],
        0.7,
        2000,
    )
    .await
    {
        Ok(reply) => reply
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| PracticeQuestion {
                id: format!("{}-{}", now, i),
                ..q
            })
            .collect(),
        Err(e) => {
            warn!("Core phrase generation failed, using fill-in-blank fallback: {}", e);
            fallback_questions(&request.phrases, count, now)
        }
    };

    Ok(Json(json!({
        "success": true,
        "message": format!("{}개의 문제가 생성되었습니다.", questions.len()),
        "questions": questions,
    })))
}

async fn calculate_results(state: &AppState, user_id: &str, request: &CorePhraseRequest) -> ApiResult<Json<Value>> {
    let (correct, completed) = grade(&request.questions, &request.user_answers);
    let total = request.questions.len();
    let score = if total == 0 {
        0
    } else {
        (correct as f64 / total as f64 * 100.0).round() as i64
    };
    let now = time::now_millis();

    state
        .store
        .hset(
            &keys::christine_core_phrase(user_id, &request.month, &request.week),
            &[
                ("completedQuestions", serde_json::to_string(&completed).unwrap_or_default()),
                ("score", score.to_string()),
                ("lastStudied", now.to_string()),
            ],
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "progress": {
            "monthKey": request.month,
            "weekKey": request.week,
            "completedQuestions": completed,
            "score": score,
            "lastStudied": now,
        },
        "correctCount": correct,
        "totalQuestions": total,
        "message": format!("{}/{} 정답! {}점을 획득했습니다.", correct, total, score),
    })))
}

/// GET /api/influencers/christine/core-phrase
pub async fn core_phrase_get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<TutorQuery>,
) -> ApiResult<Json<Value>> {
    let user_id = acting_user(&user, &query.user_id, MISSING_USER)?;
    match query.action.as_deref() {
        Some("progress") => core_phrase_progress(&state, user_id, &query).await,
        _ => Err(unsupported()),
    }
}

/// POST /api/influencers/christine/core-phrase
pub async fn core_phrase_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CorePhraseRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = acting_user(&user, &request.user_id, MISSING_USER)?;
    match request.action.as_deref() {
        Some("generate_questions") => generate_questions(&state, &request).await,
        Some("calculate_results") => calculate_results(&state, user_id, &request).await,
        _ => Err(unsupported()),
    }
}

pub fn christine_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/influencers/christine/vocabulary",
            get(vocabulary_get).post(vocabulary_post),
        )
        .route("/api/influencers/christine/roleplay", post(roleplay))
        .route(
            "/api/influencers/christine/core-phrase",
            get(core_phrase_get).post(core_phrase_post),
        )
}
