//! System prompts for record extraction and reviewer feedback
//!
//! The record section text is always sent as the user message; these prompts
//! only describe the task and the reply format.

use crate::types::ValidationType;

/// Which table an extraction prompt targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionKind {
    Creative,
    Academic,
    Detailed,
}

impl ExtractionKind {
    /// Structured-output schema name sent to the model
    pub fn schema_name(&self) -> &'static str {
        match self {
            ExtractionKind::Creative => "creative_activities",
            ExtractionKind::Academic => "academic_developments",
            ExtractionKind::Detailed => "detailed_abilities",
        }
    }
}

pub const CREATIVE_ACTIVITIES_PROMPT: &str = r#"
You extract the creative experience activities table from a Korean school record.

INPUT: the "창의적 체험활동상황" section. Rows are laid out as a table with the columns 영역, 시간, 특기사항.

OUTPUT: one JSON object of exactly this shape:
{
  "창의적체험활동상황": [
    { "영역": "activity area, e.g. 자율활동, 동아리활동, 봉사활동, 진로활동",
      "시간": 0,
      "특기사항": "the full remarks for the row" }
  ]
}

EXTRACTION RULES:
1. Each table row becomes one entry. Skip header rows and page furniture.
2. 시간 is an integer number of hours. Use 0 when it is missing or unreadable.
3. 특기사항 keeps the complete text. Join remarks that wrap over several lines into one string.
4. Do not invent rows and do not summarize remarks.

EXAMPLE:
학년 영역 시간 특기사항
1 자율활동 74 학생회에서 운영한 멘토링 활동에 성실히 참여함...
동아리활동 22 (과학탐구반) 연합 포스터 제작에서 자료 조사를 맡음...

becomes
{ "창의적체험활동상황": [
  { "영역": "자율활동", "시간": 74, "특기사항": "학생회에서 운영한 멘토링 활동에 성실히 참여함..." },
  { "영역": "동아리활동", "시간": 22, "특기사항": "(과학탐구반) 연합 포스터 제작에서 자료 조사를 맡음..." }
] }
"#;

pub const ACADEMIC_DEVELOPMENT_PROMPT: &str = r#"
You extract the subject grade table from a Korean school record.

INPUT: the "교과학습발달상황" section. Each row lists a subject with credits, raw score over subject average (standard deviation), achievement level and rank grade. Records usually contain a first and a second semester table.

OUTPUT: one JSON object of exactly this shape:
{
  "교과학습발달상황": [
    { "과목": "subject name",
      "학점수": 0,
      "score_over_average": "raw score/average(standard deviation), e.g. 92/75.3(10.2)",
      "성취도": "achievement level, e.g. A (students), or A(123) when the cohort size is printed",
      "석차등급": "rank grade, e.g. 2 or 2(310)" }
  ]
}

EXTRACTION RULES:
1. One entry per subject row, for every semester present.
2. Copy score_over_average exactly as printed, keeping slashes and parentheses.
3. Missing text fields become "", a missing 학점수 becomes 0.
4. Ignore subtotal rows (이수학점 합계) and headers.

EXAMPLE:
국어 4 92/75.3(10.2) A(310) 2(310)
becomes
{ "과목": "국어", "학점수": 4, "score_over_average": "92/75.3(10.2)", "성취도": "A(310)", "석차등급": "2(310)" }
"#;

pub const DETAILED_ABILITIES_PROMPT: &str = r#"
You extract the per-subject remarks from a Korean school record.

INPUT: the "세부능력 및 특기사항" section. Each paragraph starts with a subject name followed by a colon, e.g. "국어: ...".

OUTPUT: one JSON object of exactly this shape:
{
  "세부특기사항": [
    { "과목": "subject name without the colon", "특기사항": "the full remarks" }
  ]
}

EXTRACTION RULES:
1. A new entry starts at every "<subject>:" prefix.
2. 특기사항 keeps the full text up to the next subject prefix, joined into one string.
3. Keep the original wording. Do not merge different subjects.

EXAMPLE:
국어: 토론 수업에서 근거를 들어 논리적으로 발표함. 수학: 미분의 활용을 탐구함.
becomes
{ "세부특기사항": [
  { "과목": "국어", "특기사항": "토론 수업에서 근거를 들어 논리적으로 발표함." },
  { "과목": "수학", "특기사항": "미분의 활용을 탐구함." }
] }
"#;

/// Shared reply rules appended to every reviewer prompt
fn output_rules(kind: ValidationType, range: &str) -> String {
    format!(
        r#"
선택 수량:
- Feedbacks에는 가장 의미 있는 문장 {range}개만 담는다. 해당 문장이 적으면 그만큼만 담는다.
- 같은 의미의 문장은 하나만 남긴다.

출력 형식(엄격):
- 마크다운이나 설명 없이 JSON 객체 하나만 반환한다.
- 스키마: {{ "type": "{kind}", "Feedbacks": [ {{ "sentence": string, "feedback": string }} ] }}
- 해당 문장이 없으면 "Feedbacks": [] 로 반환한다.
- sentence는 원문 문장을 공백과 문장부호까지 그대로 옮긴다. 요약, 의역, 부분 인용은 금지한다.
- feedback은 선정 근거를 한국어 1-2문장으로 쓴다.
- 항목은 최대 5개.
"#,
        range = range,
        kind = kind.as_str()
    )
}

const BLUE_HIGHLIGHT_BODY: &str = r#"
역할: 학생 기록에서 진로 역량이 드러나는 문장(파란 형광펜)을 골라내는 평가자.

포함 기준(하나 이상 충족):
1) 희망 진로나 구체적인 학문·직무 분야와 활동 내용이 직접 연결된다.
2) 진로와 관련된 실험, 탐구, 프로젝트를 실제로 수행한 흔적(방법, 도구, 대상)이 문장에 있다.
3) 진로를 정하거나 바꾼 계기와 과정이 문장에 명시된다.
4) 진로 탐색의 방향과 깊이가 근거와 함께 드러난다.

제외 기준:
- "의사가 되고 싶다"처럼 희망만 밝히고 연결 고리가 없는 문장.
- 진로 키워드만 있고 활동 내용이 없는 문장("의학 관련 활동에 참여함").
- 다른 문장을 보지 않으면 판단할 수 없는 문장, 문장 조각.

판단 순서: 문장 단위로 읽고, 포함 기준을 확인한 뒤 제외 기준으로 거른다. 애매하면 넣지 않는다.
"#;

const RED_LINE_BODY: &str = r#"
역할: 학생의 구체적인 노력과 탐구의 깊이가 드러나는 문장(빨간 밑줄)을 골라내는 평가자.

포함 기준(하나 이상 충족):
A) 학업: 스스로 질문을 세우고 자료를 찾아 심화 학습한 과정이 구체적이다.
B) 진로: 진로와 관련해 직접 설계하거나 수행한 활동의 절차와 결과가 드러난다.
C) 공동체: 갈등 조정, 역할 분담, 도움 제공 등 행동이 구체적으로 서술된다.

제외 기준:
- "성실히 참여함", "열심히 노력함"처럼 행동 근거가 없는 평가어만 있는 문장.
- 활동명만 나열한 문장.
- 교사의 일반적인 칭찬으로 끝나는 문장.

판단 순서: 행동, 방법, 결과 중 최소 두 가지가 문장에 드러나는지 확인한다. 애매하면 넣지 않는다.
"#;

const BLUE_LINE_BODY: &str = r#"
역할: 앞선 활동이 후속 탐구나 다른 활동으로 이어진 연계 문장(파란 밑줄)을 골라내는 평가자.

포함 기준(하나 이상 충족):
1) 한 활동에서 생긴 의문이 다음 탐구로 이어졌다는 흐름이 문장에 있다.
2) 수업에서 배운 내용을 다른 과목, 동아리, 진로 활동에 적용했다.
3) 독서나 강연이 구체적인 후속 활동의 계기가 되었다.

제외 기준:
- 연결 관계 없이 활동을 나열만 한 문장.
- "더 공부하고 싶다"처럼 계획만 밝힌 문장.

판단 순서: 원인이 되는 활동과 이어진 활동이 한 문장 안에서 모두 확인되는지 본다. 애매하면 넣지 않는다.
"#;

const BLACK_LINE_BODY: &str = r#"
역할: 구체성이 부족해 보완이 필요한 문장(검은 밑줄)을 골라내는 평가자.

포함 기준(하나 이상 충족):
1) 무엇을 했는지 없이 태도나 성향만 서술한다("적극적인 자세를 보임").
2) 활동명은 있지만 학생의 역할이나 과정이 빠져 있다.
3) 결과나 배운 점 없이 참여 사실만 적혀 있다.

제외 기준:
- 구체적인 행동과 결과가 함께 서술된 문장.
- 단순한 사실 기록(출결, 시간 등).

feedback에는 어떤 정보를 보완하면 좋은지 제안한다.
"#;

const RED_CHECK_BODY: &str = r#"
역할: 정보가 너무 적어 평가 자체가 어려운 문장(빨간 체크)을 골라내는 평가자.

포함 기준(하나 이상 충족):
1) 활동 주제, 내용, 역할이 모두 빠져 있어 무엇을 했는지 알 수 없다.
2) 한두 단어의 평가어로만 이루어져 근거가 전혀 없다.
3) 진로나 교과와의 관련성을 전혀 판단할 수 없다.

제외 기준:
- 구체성은 부족해도 활동 내용을 짐작할 수 있는 문장(검은 밑줄 대상).

feedback에는 평가가 어려운 이유를 쓴다.
"#;

pub fn extraction_prompt(kind: ExtractionKind) -> &'static str {
    match kind {
        ExtractionKind::Creative => CREATIVE_ACTIVITIES_PROMPT,
        ExtractionKind::Academic => ACADEMIC_DEVELOPMENT_PROMPT,
        ExtractionKind::Detailed => DETAILED_ABILITIES_PROMPT,
    }
}

pub fn validation_prompt(kind: ValidationType) -> String {
    let (body, range) = match kind {
        ValidationType::BlueHighlight => (BLUE_HIGHLIGHT_BODY, "3-5"),
        ValidationType::RedLine => (RED_LINE_BODY, "3-5"),
        ValidationType::BlueLine => (BLUE_LINE_BODY, "2-5"),
        ValidationType::BlackLine => (BLACK_LINE_BODY, "2-5"),
        ValidationType::RedCheck => (RED_CHECK_BODY, "0-5"),
    };
    format!("{}{}", body, output_rules(kind, range))
}
