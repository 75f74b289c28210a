//! Study tools: study plan, study type diagnosis and course recommendation

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use yaktoon_common::models::Influencer;
use yaktoon_medsky::llm::ChatMessage;

use super::complete_text;
use super::influencers::load_all_influencers;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const EMPTY_REPLY: &str = "죄송합니다. 응답을 생성할 수 없습니다.";
const RECOMMENDATION_COUNT: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

const STUDY_PLAN_PROMPT: &str = "당신은 RootEdu 학습 계획 전문 AI 어시스턴트입니다. 학생들의 학습 목표와 상황에 맞는 맞춤형 학습 계획을 제공해야 합니다.

**학습 계획 제공 기준:**
1. **목표 설정 (SMART 기준)**: 구체적, 측정 가능, 달성 가능, 관련성, 기한 설정
2. **주간 계획 분할**: 월간 목표를 주별로 세분화
3. **일일 실행 계획**: 구체적이고 실현 가능한 일일 학습량
4. **진도 체크 방법**: 정기적인 진도 점검과 피드백 시스템
5. **복습 사이클**: 효율적인 복습 타이밍과 방법

**응답 스타일:**
- 친근하고 격려적인 톤 사용
- 구체적이고 실행 가능한 계획 제시
- 학생의 수준과 상황에 맞는 맞춤형 조언
- 단계별로 명확하게 구분된 계획
- 이모지를 활용한 가독성 있는 응답
- 한국어로 응답

**주의사항:**
- 현실적이고 지속 가능한 계획 제공
- 과목별 특성에 맞는 학습 방법 제시
- 시간 관리와 동기부여를 고려한 계획
- 정기적인 점검과 조정 방안 포함

항상 학생의 성공과 만족을 최우선으로 하여 최적의 학습 계획을 제공하세요.";

const STUDY_TYPE_PROMPT: &str = "당신은 RootEdu 공부 유형 진단 전문 AI 어시스턴트입니다. 16가지 공부 유형을 기반으로 학생들의 공부 스타일을 진단하고 맞춤형 학습 전략을 제공해야 합니다.

**16가지 공부 유형 (4축 기반):**

**1. 공부 환경 (Study Environment)**
- 🏠 솔로형 (Solo): 혼자 공부하는 것을 선호
- 👥 그룹형 (Group): 다른 사람과 함께 공부하는 것을 선호

**2. 공부 접근 방식 (Study Approach)**
- 📅 계획형 (Planner): 체계적이고 계획적인 공부
- 🔥 즉흥형 (Spontaneous): 상황에 따라 즉흥적으로 공부

**3. 학습 스타일 (Learning Style)**
- 🧠 이론형 (Conceptual): 개념과 원리를 중시
- 🛠️ 실전형 (Practical): 실제 문제풀이와 실습을 중시

**4. 집중 패턴 (Concentration Pattern)**
- ⏳ 장시간 몰입형 (Marathoner): 오랫동안 집중해서 공부
- ⚡ 단기 집중형 (Sprinter): 짧은 시간에 집중해서 공부

**응답 스타일:**
- 친근하고 격려적인 톤 사용
- 학생의 답변을 바탕으로 유형 진단
- 유형별 맞춤 학습 전략 제시
- 구체적이고 실용적인 조언
- 이모지를 활용한 가독성 있는 응답
- 한국어로 응답

**주의사항:**
- 학생의 답변을 종합적으로 분석하여 유형 진단
- 유형의 장점과 단점을 균형있게 설명
- 개인별 맞춤 학습 방법 제시
- 학습 환경과 스타일 최적화 방안 포함";

fn require_message(request: &ToolRequest) -> ApiResult<&str> {
    request
        .message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("메시지가 필요합니다.".to_string()))
}

/// System prompt, client history (`ai` → `assistant`), then the new message
pub fn build_messages(system: String, history: &[HistoryEntry], message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history.iter().map(|entry| {
        let role = if entry.role == "ai" { "assistant" } else { entry.role.as_str() };
        ChatMessage::new(role, entry.content.clone())
    }));
    messages.push(ChatMessage::user(message));
    messages
}

async fn respond(state: &AppState, messages: Vec<ChatMessage>, max_tokens: u32) -> ApiResult<Json<Value>> {
    match complete_text(state.llm.as_ref(), messages, 0.7, max_tokens).await {
        Ok(reply) if !reply.trim().is_empty() => Ok(Json(json!({ "response": reply }))),
        Ok(_) => Ok(Json(json!({ "response": EMPTY_REPLY }))),
        Err(e) => {
            warn!("Tool completion failed: {}", e);
            Err(ApiError::Internal("AI 응답 생성 중 오류가 발생했습니다.".to_string()))
        }
    }
}

/// POST /api/tools/study-plan
pub async fn study_plan(
    State(state): State<AppState>,
    Json(request): Json<ToolRequest>,
) -> ApiResult<Json<Value>> {
    let message = require_message(&request)?;
    let messages = build_messages(STUDY_PLAN_PROMPT.to_string(), &request.history, message);
    respond(&state, messages, 1000).await
}

/// POST /api/tools/study-type
pub async fn study_type(
    State(state): State<AppState>,
    Json(request): Json<ToolRequest>,
) -> ApiResult<Json<Value>> {
    let message = require_message(&request)?;
    let messages = build_messages(STUDY_TYPE_PROMPT.to_string(), &request.history, message);
    respond(&state, messages, 1200).await
}

/// Relevance of an influencer to a free-text request
pub fn relevance_score(influencer: &Influencer, message: &str) -> f64 {
    let message = message.to_lowercase();
    let mut score = 0.0;

    let tag_hits = influencer
        .tags
        .iter()
        .filter(|tag| message.contains(&tag.to_lowercase()))
        .count();
    score += 10.0 * tag_hits as f64;

    if influencer.description.to_lowercase().contains(&message) {
        score += 5.0;
    }
    if influencer.bio.to_lowercase().contains(&message) {
        score += 3.0;
    }

    score += (influencer.stats.followers as f64 / 1000.0).min(10.0);
    score += (2.0 * influencer.stats.total_courses() as f64).min(10.0);
    score
}

/// The best-matching influencers, highest score first
pub fn top_influencers(mut influencers: Vec<Influencer>, message: &str) -> Vec<Influencer> {
    let mut scored: Vec<(f64, Influencer)> = influencers
        .drain(..)
        .map(|inf| (relevance_score(&inf, message), inf))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(RECOMMENDATION_COUNT)
        .map(|(_, inf)| inf)
        .collect()
}

/// Thousands separators, as shown to Korean readers
fn grouped(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

/// Prompt block describing the recommended influencers
pub fn influencer_context(influencers: &[Influencer]) -> String {
    influencers
        .iter()
        .map(|inf| {
            let handle = if inf.instagram.is_empty() { &inf.username } else { &inf.instagram };
            format!(
                "인플루언서: {} (@{})\n소개: {}\n상세 설명: {}\n전문 분야: {}\n팔로워: {}명\n무료 강좌: {}개\n유료 강좌: {}개",
                inf.name,
                handle,
                inf.bio,
                inf.description,
                inf.tags.join(", "),
                grouped(inf.stats.followers),
                inf.stats.free_courses,
                inf.stats.paid_courses,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn recommendation_prompt(context: &str) -> String {
    format!(
        "당신은 RootEdu 강좌 추천 전문 AI 어시스턴트입니다. 실제 인플루언서 데이터를 기반으로 학생들에게 최적의 강좌를 추천해야 합니다.

현재 RootEdu에 등록된 인플루언서 정보:
{context}

추천 기준:
- 현재 실력 수준 (초급/중급/고급)
- 목표 성취 수준 (기초/실력향상/고득점/특별활동)
- 선호하는 학습 방식 (이론중심/실전문제/토론형/프로젝트형)
- 가능한 학습 시간 (30분/1시간/2시간 이상)
- 특별히 보완하고 싶은 부분 (개념이해/문제풀이/시험전략/실습)

응답 스타일:
- 친근하고 격려적인 톤 사용
- 실제 존재하는 인플루언서만 추천
- 각 인플루언서의 특징과 장점을 구체적으로 설명
- 학생의 동기부여와 성공 가능성 강조
- 이모지를 활용한 가독성 있는 응답
- 한국어로 응답

주의사항:
- 위에 제공된 인플루언서 데이터만 사용하여 추천
- 존재하지 않는 인플루언서는 언급하지 않음
- 학생의 수준과 목표에 맞는 구체적인 추천
- 학습 동기와 지속성을 고려한 추천

항상 학생의 성공과 만족을 최우선으로 하여 최적의 인플루언서를 추천하세요."
    )
}

/// POST /api/tools/course-recommendation
pub async fn course_recommendation(
    State(state): State<AppState>,
    Json(request): Json<ToolRequest>,
) -> ApiResult<Json<Value>> {
    let message = require_message(&request)?;

    let influencers = load_all_influencers(state.store.as_ref()).await?;
    let top = top_influencers(influencers, message);
    let system = recommendation_prompt(&influencer_context(&top));

    let messages = build_messages(system, &request.history, message);
    respond(&state, messages, 1500).await
}

pub fn tool_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tools/study-plan", post(study_plan))
        .route("/api/tools/study-type", post(study_type))
        .route("/api/tools/course-recommendation", post(course_recommendation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaktoon_common::models::InfluencerStats;

    fn influencer(slug: &str, tags: &[&str], bio: &str, followers: i64, courses: i64) -> Influencer {
        Influencer {
            slug: slug.to_string(),
            name: slug.to_string(),
            bio: bio.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            stats: InfluencerStats {
                followers,
                paid_courses: courses,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_relevance_score_components() {
        let inf = influencer("t", &["영어", "수능"], "영어", 25_000, 3);
        // two tags, bio contains the message, followers capped, courses 6
        assert_eq!(relevance_score(&inf, "영어"), 10.0 + 3.0 + 10.0 + 6.0);
        assert_eq!(relevance_score(&inf, "수능 영어 공부"), 20.0 + 10.0 + 6.0);

        let small = influencer("s", &[], "", 500, 0);
        assert_eq!(relevance_score(&small, "anything"), 0.5);
    }

    #[test]
    fn test_tag_match_is_case_insensitive() {
        let inf = influencer("t", &["TOEIC"], "", 0, 0);
        assert_eq!(relevance_score(&inf, "toeic 점수 올리기"), 10.0);
    }

    #[test]
    fn test_top_influencers_keeps_best_five() {
        let influencers: Vec<_> = (0..8)
            .map(|i| influencer(&format!("i{}", i), &[], "", i * 1000, 0))
            .collect();
        let top = top_influencers(influencers, "수학");
        let slugs: Vec<_> = top.iter().map(|i| i.slug.as_str()).collect();
        assert_eq!(slugs, ["i7", "i6", "i5", "i4", "i3"]);
    }

    #[test]
    fn test_history_roles_are_mapped() {
        let history = vec![
            HistoryEntry { role: "user".into(), content: "q".into() },
            HistoryEntry { role: "ai".into(), content: "a".into() },
        ];
        let messages = build_messages("sys".into(), &history, "next");
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "next");
    }

    #[test]
    fn test_context_lists_stats() {
        let mut inf = influencer("terry", &["영어"], "영어 선생님", 12_345, 2);
        inf.username = "terry_en".to_string();
        let ctx = influencer_context(&[inf]);
        assert!(ctx.contains("인플루언서: terry (@terry_en)"));
        assert!(ctx.contains("팔로워: 12,345명"));
        assert!(ctx.contains("유료 강좌: 2개"));
    }
}
