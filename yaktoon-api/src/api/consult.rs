//! Consultant assistant chat over one student's analysis
//!
//! The analysis is flattened into a Korean evidence context that the model must
//! cite from. The client keeps the conversation and sends it back each turn.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use yaktoon_medsky::llm::ChatMessage;

use super::{complete_text, llm_failure, required};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::AppState;

const EMPTY_REPLY: &str = "죄송합니다. 응답을 생성할 수 없습니다.";

/// Validation feedback categories in the order they are presented
const INSIGHT_SECTIONS: &[(&str, &str)] = &[
    ("blue_highlight", "진로 역량 강조 포인트"),
    ("red_line", "구체적 노력 기록"),
    ("blue_line", "연계 탐구 활동"),
    ("black_line", "개선 필요 사항 - 구체성 부족"),
    ("red_check", "추가 검토 필요 사항"),
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultRequest {
    pub message: Option<String>,
    pub analysis_data: Option<Value>,
    pub student_name: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Counts reported in the summary block of the context
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EvidenceCounts {
    pub strengths: usize,
    pub weaknesses: usize,
    pub activities: usize,
    pub abilities: usize,
}

fn text<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Scalar field as display text, strings unquoted
fn shown(value: &Value, field: &str, default: &str) -> String {
    match value.get(field) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    }
}

fn rows<'a>(value: &'a Value, pointer: &str) -> &'a [Value] {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Build the evidence context for a student's analysis
pub fn build_evidence_context(analysis: &Value, student_name: Option<&str>) -> (String, EvidenceCounts) {
    let mut lines: Vec<String> = Vec::new();
    let mut counts = EvidenceCounts::default();

    lines.push("===== 학생 기본 정보 =====".to_string());
    lines.push(format!("- 이름: {}", student_name.filter(|n| !n.is_empty()).unwrap_or("익명 학생")));
    if let Some(total) = analysis.get("totalActivities").filter(|v| !v.is_null()) {
        lines.push(format!("- 총 활동 수: {}개", total));
    }
    if let Some(field) = text(analysis, "mainField") {
        lines.push(format!("- 주요 관심 분야: {}", field));
    }
    if let Some(career) = text(analysis, "recommendedCareer") {
        lines.push(format!("- AI 추천 진로: {}", career));
    }

    let activities = rows(analysis, "/extractedData/creativeActivities/창의적체험활동상황");
    if !activities.is_empty() {
        lines.push("\n===== 창의적 체험활동 상세 =====".to_string());
        for (i, activity) in activities.iter().enumerate() {
            lines.push(format!("\n[{}] {} 활동:", i + 1, shown(activity, "영역", "")));
            lines.push(format!("   학년: {}", shown(activity, "학년", "N/A")));
            lines.push(format!("   시간: {}", shown(activity, "시간", "N/A")));
            lines.push(format!("   특기사항: {}", shown(activity, "특기사항", "기록 없음")));
            if text(activity, "특기사항").is_some() {
                counts.activities += 1;
            }
        }
    }

    let subjects = rows(analysis, "/extractedData/academicDevelopments/교과학습발달상황");
    if !subjects.is_empty() {
        lines.push("\n===== 교과 학습 발달 상황 =====".to_string());
        let mut grouped: BTreeMap<String, Vec<&Value>> = BTreeMap::new();
        for subject in subjects {
            grouped.entry(shown(subject, "과목", "")).or_default().push(subject);
        }
        for (name, records) in grouped {
            lines.push(format!("\n{}:", name));
            for r in records {
                lines.push(format!(
                    "   - {}학년 {}학기: 성취도 {}, 석차등급 {}",
                    shown(r, "학년", ""),
                    shown(r, "학기", ""),
                    shown(r, "성취도", ""),
                    shown(r, "석차등급", "N/A"),
                ));
            }
        }
    }

    let abilities = rows(analysis, "/extractedData/detailedAbilities/세부특기사항");
    if !abilities.is_empty() {
        lines.push("\n===== 세부능력 및 특기사항 (전체) =====".to_string());
        for ability in abilities {
            lines.push(format!(
                "\n[{}] ({}학년 {}학기):\n{}\n---",
                shown(ability, "과목", ""),
                shown(ability, "학년", ""),
                shown(ability, "학기", ""),
                shown(ability, "특기사항", ""),
            ));
            counts.abilities += 1;
        }
    }

    let behaviour = rows(analysis, "/extractedData/behaviorDevelopment/행동특성및종합의견");
    if !behaviour.is_empty() {
        lines.push("\n===== 행동특성 및 종합의견 =====".to_string());
        for record in behaviour {
            lines.push(format!("\n{}학년: {}", shown(record, "학년", ""), shown(record, "특기사항", "")));
        }
    }

    if let Some(validation) = analysis.get("validationAnalysis") {
        lines.push("\n===== AI 분석 인사이트 상세 =====".to_string());
        for (category, heading) in INSIGHT_SECTIONS {
            let feedbacks = rows(validation, &format!("/{}/Feedbacks", category));
            if feedbacks.is_empty() {
                continue;
            }
            lines.push(format!("\n[{}]", heading));
            for (i, feedback) in feedbacks.iter().enumerate() {
                let body = text(feedback, "Text")
                    .map(str::to_string)
                    .unwrap_or_else(|| feedback.as_str().map(str::to_string).unwrap_or_else(|| feedback.to_string()));
                lines.push(format!("{}. {}", i + 1, body));
                if *category != "red_check" {
                    if let Some(context) = text(feedback, "Context") {
                        lines.push(format!("   맥락: {}", context));
                    }
                }
            }
            match *category {
                "blue_highlight" | "red_line" => counts.strengths += feedbacks.len(),
                "black_line" => counts.weaknesses += feedbacks.len(),
                _ => {}
            }
        }
    }

    lines.push("\n===== 요약 통계 =====".to_string());
    lines.push(format!("- 강점 포인트: {}개", counts.strengths));
    lines.push(format!("- 개선 포인트: {}개", counts.weaknesses));
    lines.push(format!("- 기록된 활동: {}개", counts.activities));
    lines.push(format!("- 세부능력 기록: {}개", counts.abilities));

    let mut ctx = lines.join("\n");
    ctx.push('\n');
    (ctx, counts)
}

/// System prompt for the consultant assistant
pub fn consultant_prompt(context: &str) -> String {
    format!(
        "당신은 대학 입시 컨설팅 전문가를 지원하는 AI 분석 어시스턴트입니다.\n\
         학생의 생활기록부 데이터와 AI 분석 결과를 기반으로 증거 기반(Evidence-Based) 상담 가이드를 제공합니다.\n\n\
         {context}\n\
         ===== 핵심 응답 원칙 =====\n\
         1. **증거 기반 답변**: 모든 평가와 조언은 반드시 생활기록부의 구체적 데이터를 인용하여 제시\n\
         2. **데이터 우선**: \"생활기록부에 따르면...\", \"X학년 Y활동에서 보여준...\" 등 구체적 근거 제시\n\
         3. **정량적 분석**: 가능한 한 숫자와 통계를 활용\n\
         4. **균형잡힌 관점**: 강점과 개선점을 모두 객관적 데이터로 뒷받침\n\n\
         ===== 답변 구조 가이드 =====\n\
         1. **현황 진단**: 생활기록부 데이터 기반 현재 상태 분석\n\
         2. **강점 분석**: 세부능력 특기사항과 창의적 체험활동의 구체적 근거, AI가 식별한 진로역량 포인트 활용\n\
         3. **개선 영역**: 구체성이 부족한 활동, 연계성이 약한 부분\n\
         4. **전략적 제안**: 목표 진로와의 갭 분석, 남은 기간 활용 전략\n\
         5. **상담 포인트**: 학부모/학생에게 전달할 핵심 메시지와 실행 가능한 액션 아이템\n\n\
         ===== 응답 시 필수 포함 사항 =====\n\
         - 생활기록부 원문 인용 (최소 2-3개)\n\
         - 정량적 데이터 (활동 수, 성적 변화율 등)\n\
         - AI 분석에서 도출된 인사이트\n\n\
         ===== 금지 사항 =====\n\
         - 추상적이거나 일반적인 조언\n\
         - 데이터 없는 추측이나 가정\n\
         - 생활기록부에 없는 내용 추가\n\n\
         모든 답변은 컨설턴트가 학부모/학생 상담 시 즉시 활용 가능하도록 구체적이고 실용적이어야 하며, \
         반드시 생활기록부 데이터를 근거로 제시해야 합니다."
    )
}

/// POST /api/dashboard/chat
pub async fn consult(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(request): Json<ConsultRequest>,
) -> ApiResult<Json<Value>> {
    let message = required(&request.message, "Message is required")?;

    let context = match request.analysis_data.as_ref().filter(|a| !a.is_null()) {
        Some(analysis) => build_evidence_context(analysis, request.student_name.as_deref()).0,
        None => String::new(),
    };

    let mut messages = Vec::with_capacity(request.messages.len() + 2);
    messages.push(ChatMessage::system(consultant_prompt(&context)));
    messages.extend(request.messages);
    messages.push(ChatMessage::user(message));

    let reply = complete_text(state.llm.as_ref(), messages, 0.7, 2000)
        .await
        .map_err(llm_failure)?;
    let reply = if reply.trim().is_empty() {
        EMPTY_REPLY.to_string()
    } else {
        reply
    };

    Ok(Json(json!({ "reply": reply })))
}

pub fn consult_routes() -> Router<crate::AppState> {
    Router::new().route("/api/dashboard/chat", post(consult))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> Value {
        json!({
            "mainField": "생명과학",
            "extractedData": {
                "creativeActivities": { "창의적체험활동상황": [
                    { "영역": "자율활동", "학년": 1, "시간": 40, "특기사항": "학급 회장으로 활동" },
                    { "영역": "동아리활동", "학년": 2 }
                ]},
                "academicDevelopments": { "교과학습발달상황": [
                    { "과목": "수학", "학년": 1, "학기": 1, "성취도": "A", "석차등급": "2" },
                    { "과목": "수학", "학년": 1, "학기": 2, "성취도": "B" }
                ]},
                "detailedAbilities": { "세부특기사항": [
                    { "과목": "생명과학", "학년": 2, "학기": 1, "특기사항": "효소 실험 설계" }
                ]}
            },
            "validationAnalysis": {
                "blue_highlight": { "Feedbacks": [ { "Text": "진로 연계", "Context": "생명과학 탐구" } ] },
                "red_line": { "Feedbacks": [ "꾸준한 노력" ] },
                "black_line": { "Feedbacks": [ { "Text": "구체성 부족" } ] },
                "red_check": { "Feedbacks": [ { "Text": "확인 필요", "Context": "생략됨" } ] }
            }
        })
    }

    #[test]
    fn test_context_sections_and_counts() {
        let (ctx, counts) = build_evidence_context(&analysis(), Some("김학생"));

        assert_eq!(
            counts,
            EvidenceCounts {
                strengths: 2,
                weaknesses: 1,
                activities: 1,
                abilities: 1,
            }
        );
        assert!(ctx.contains("- 이름: 김학생"));
        assert!(ctx.contains("- 주요 관심 분야: 생명과학"));
        assert!(ctx.contains("[1] 자율활동 활동:"));
        assert!(ctx.contains("   특기사항: 기록 없음"));
        assert!(ctx.contains("   - 1학년 2학기: 성취도 B, 석차등급 N/A"));
        assert!(ctx.contains("[진로 역량 강조 포인트]\n1. 진로 연계\n   맥락: 생명과학 탐구"));
        assert!(ctx.contains("[구체적 노력 기록]\n1. 꾸준한 노력"));
        assert!(!ctx.contains("생략됨"));
        assert!(ctx.contains("- 강점 포인트: 2개"));
    }

    #[test]
    fn test_context_for_empty_analysis() {
        let (ctx, counts) = build_evidence_context(&json!({}), None);
        assert!(ctx.contains("- 이름: 익명 학생"));
        assert!(!ctx.contains("AI 분석 인사이트"));
        assert_eq!(counts, EvidenceCounts::default());
        assert_eq!(
            ctx,
            "===== 학생 기본 정보 =====\n- 이름: 익명 학생\n\n\
             ===== 요약 통계 =====\n- 강점 포인트: 0개\n- 개선 포인트: 0개\n\
             - 기록된 활동: 0개\n- 세부능력 기록: 0개\n"
        );
    }
}
