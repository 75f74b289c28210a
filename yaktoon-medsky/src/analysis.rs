//! Derived statistics over a completed analysis
//!
//! Pure functions: scores from feedback counts, and per-row enrichment of the
//! extracted tables (normalized domain, subject category, keyword tags).

use crate::types::{
    AcademicDevelopment, CreativeActivity, DetailedAbility, ExtractedData, ValidationAnalysis,
    ValidationType,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Overall statistics
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryScores {
    pub blue_highlight: u32,
    pub red_line: u32,
    pub blue_line: u32,
    pub black_line: u32,
    pub red_check: u32,
}

impl CategoryScores {
    fn set(&mut self, kind: ValidationType, score: u32) {
        match kind {
            ValidationType::BlueHighlight => self.blue_highlight = score,
            ValidationType::RedLine => self.red_line = score,
            ValidationType::BlueLine => self.blue_line = score,
            ValidationType::BlackLine => self.black_line = score,
            ValidationType::RedCheck => self.red_check = score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatistics {
    pub total_activities: usize,
    pub total_activity_hours: f64,
    pub total_subjects: usize,
    pub activity_domains: Vec<String>,
    pub subject_count: usize,
    /// 0-100
    pub validation_score: u32,
    pub category_scores: CategoryScores,
    pub strength_areas: Vec<String>,
    pub improvement_areas: Vec<String>,
}

fn activities(data: &ExtractedData) -> &[CreativeActivity] {
    data.creative_activities.as_deref().unwrap_or_default()
}

fn academics(data: &ExtractedData) -> &[AcademicDevelopment] {
    data.academic_developments.as_deref().unwrap_or_default()
}

fn abilities(data: &ExtractedData) -> &[DetailedAbility] {
    data.detailed_abilities.as_deref().unwrap_or_default()
}

/// Distinct activity areas in first-seen order
fn distinct_domains(activities: &[CreativeActivity]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    activities
        .iter()
        .filter(|a| seen.insert(a.area.as_str()))
        .map(|a| a.area.clone())
        .collect()
}

pub fn calculate_analysis_statistics(
    data: &ExtractedData,
    validation: &ValidationAnalysis,
) -> AnalysisStatistics {
    let activities = activities(data);
    let category_scores = category_scores(validation);
    let (strength_areas, improvement_areas) = key_areas(validation, data);

    AnalysisStatistics {
        total_activities: activities.len(),
        total_activity_hours: activities.iter().map(|a| a.hours).sum(),
        total_subjects: academics(data).len(),
        activity_domains: distinct_domains(activities)
            .into_iter()
            .filter(|d| !d.is_empty())
            .collect(),
        subject_count: abilities(data).len(),
        validation_score: overall_score(&category_scores),
        category_scores,
        strength_areas,
        improvement_areas,
    }
}

/// Share of all feedbacks per type
///
/// Positive markings score their percentage; negative markings lose two
/// points per percent, floored at zero.
pub fn category_scores(validation: &ValidationAnalysis) -> CategoryScores {
    let total = validation.total_feedbacks();
    let mut scores = CategoryScores::default();
    if total == 0 {
        return scores;
    }

    for kind in ValidationType::ALL {
        let pct = validation.count(kind) as f64 / total as f64 * 100.0;
        let score = if kind.is_positive() {
            pct.round()
        } else {
            (100.0 - pct * 2.0).max(0.0).round()
        };
        scores.set(kind, score as u32);
    }
    scores
}

pub fn overall_score(scores: &CategoryScores) -> u32 {
    let positive = (scores.blue_highlight as f64 * 0.4
        + scores.red_line as f64 * 0.35
        + scores.blue_line as f64 * 0.25)
        * 0.7;
    let negative = (scores.black_line as f64 * 0.6 + scores.red_check as f64 * 0.4) * 0.3;
    (positive + negative).round() as u32
}

fn key_areas(validation: &ValidationAnalysis, data: &ExtractedData) -> (Vec<String>, Vec<String>) {
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();

    if distinct_domains(activities(data)).len() >= 3 {
        strengths.push("활동 영역 다양성".to_string());
    }
    if abilities(data).len() >= 5 {
        strengths.push("교과 영역 폭넓음".to_string());
    }

    if validation.count(ValidationType::BlueHighlight) > 2 {
        strengths.push("진로 역량".to_string());
    }
    if validation.count(ValidationType::RedLine) > 2 {
        strengths.push("구체적 노력".to_string());
    }
    if validation.count(ValidationType::BlueLine) > 1 {
        strengths.push("연계성".to_string());
    }
    if validation.count(ValidationType::BlackLine) > 3 {
        improvements.push("구체성 부족".to_string());
    }
    if validation.count(ValidationType::RedCheck) > 2 {
        improvements.push("정보 부족".to_string());
    }

    (strengths, improvements)
}

// ============================================================================
// Activities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedActivity {
    #[serde(flatten)]
    pub activity: CreativeActivity,
    pub domain: String,
    pub highlights: Vec<String>,
    pub competency_areas: Vec<String>,
}

static HIGHLIGHT_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?:개발|설계|구현|제작|창작|기획)(?:함|하였음|했음)").unwrap(),
        Regex::new(r"(?:발표|참여|주도|리더십|협력)(?:함|하였음|했음)").unwrap(),
        Regex::new(r"(?:수상|선정|인정|평가)(?:됨|되었음|받음|받았음)").unwrap(),
    ]
});

const COMPETENCY_KEYWORDS: &[(&str, &[&str])] = &[
    ("창의성", &["창의", "혁신", "아이디어", "새로운"]),
    ("리더십", &["리더", "주도", "이끌", "책임"]),
    ("협업", &["협력", "팀워크", "함께", "공동"]),
    ("문제해결", &["해결", "분석", "탐구", "연구"]),
    ("의사소통", &["발표", "토론", "소통", "설명"]),
    ("전문성", &["전문", "깊이", "심화", "고급"]),
];

/// Short area names ("자율") expand to the full heading ("자율활동")
pub fn normalize_domain(area: &str) -> String {
    match area {
        "자율" => "자율활동".to_string(),
        "동아리" => "동아리활동".to_string(),
        "봉사" => "봉사활동".to_string(),
        "진로" => "진로활동".to_string(),
        other => other.to_string(),
    }
}

/// Up to `per_pattern` matches of each pattern, `total` overall
fn collect_matches(patterns: &[Regex], text: &str, per_pattern: usize, total: usize) -> Vec<String> {
    patterns
        .iter()
        .flat_map(|re| {
            re.find_iter(text)
                .take(per_pattern)
                .map(|m| m.as_str().trim().to_string())
        })
        .take(total)
        .collect()
}

fn keyword_tags(text: &str, table: &[(&str, &[&str])]) -> Vec<String> {
    let text = text.to_lowercase();
    table
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

pub fn process_activities(data: &ExtractedData) -> Vec<ProcessedActivity> {
    activities(data)
        .iter()
        .map(|activity| ProcessedActivity {
            domain: normalize_domain(&activity.area),
            highlights: collect_matches(&*HIGHLIGHT_PATTERNS, &activity.remarks, 2, 3),
            competency_areas: keyword_tags(&activity.remarks, COMPETENCY_KEYWORDS),
            activity: activity.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DomainStats {
    pub count: usize,
    pub hours: f64,
    pub activities: Vec<ProcessedActivity>,
}

pub fn activity_stats_by_domain(activities: &[ProcessedActivity]) -> BTreeMap<String, DomainStats> {
    let mut stats: BTreeMap<String, DomainStats> = BTreeMap::new();
    for activity in activities {
        let entry = stats.entry(activity.domain.clone()).or_default();
        entry.count += 1;
        entry.hours += activity.activity.hours;
        entry.activities.push(activity.clone());
    }
    stats
}

// ============================================================================
// Academics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Average,
    NeedsImprovement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedAcademic {
    #[serde(flatten)]
    pub academic: AcademicDevelopment,
    pub category: String,
    pub performance_level: PerformanceLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_grade: Option<u32>,
}

const SUBJECT_CATEGORIES: &[(&str, &[&str])] = &[
    ("국어/문학", &["국어", "문학", "화법", "작문", "독서"]),
    ("수학", &["수학", "미적분", "확률", "통계", "기하"]),
    ("영어", &["영어", "English", "실용영어"]),
    ("과학", &["물리", "화학", "생물", "지구과학", "과학"]),
    ("사회", &["사회", "역사", "지리", "정치", "경제", "윤리", "한국사"]),
    ("예체능", &["음악", "미술", "체육", "예술"]),
];

pub fn categorize_subject(subject: &str) -> String {
    SUBJECT_CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| subject.contains(k)))
        .map(|(category, _)| category.to_string())
        .unwrap_or_else(|| "기타".to_string())
}

/// Leading integer of a string, ignoring leading whitespace ("2(310)" → 2)
fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Achievement letter first, then rank grade
pub fn evaluate_performance(achievement: &str, rank: &str) -> PerformanceLevel {
    match achievement {
        "A" => return PerformanceLevel::Excellent,
        "B" => return PerformanceLevel::Good,
        "C" => return PerformanceLevel::Average,
        _ => {}
    }
    match leading_number(rank) {
        Some(r) if r <= 2 => PerformanceLevel::Excellent,
        Some(r) if r <= 4 => PerformanceLevel::Good,
        Some(r) if r <= 6 => PerformanceLevel::Average,
        _ => PerformanceLevel::NeedsImprovement,
    }
}

pub fn process_academics(data: &ExtractedData) -> Vec<ProcessedAcademic> {
    academics(data)
        .iter()
        .map(|academic| ProcessedAcademic {
            category: categorize_subject(&academic.subject),
            performance_level: evaluate_performance(&academic.achievement, &academic.rank),
            numeric_grade: if academic.score_over_average.starts_with(|c: char| c.is_ascii_digit()) {
                leading_number(&academic.score_over_average)
            } else {
                None
            },
            academic: academic.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryStats {
    pub count: usize,
    pub subjects: Vec<ProcessedAcademic>,
}

pub fn academic_stats_by_category(academics: &[ProcessedAcademic]) -> BTreeMap<String, CategoryStats> {
    let mut stats: BTreeMap<String, CategoryStats> = BTreeMap::new();
    for academic in academics {
        let entry = stats.entry(academic.category.clone()).or_default();
        entry.count += 1;
        entry.subjects.push(academic.clone());
    }
    stats
}

// ============================================================================
// Detailed abilities
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetencyLevel {
    High,
    Medium,
    Basic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedAbility {
    #[serde(flatten)]
    pub ability: DetailedAbility,
    pub category: String,
    pub key_strengths: Vec<String>,
    pub skill_areas: Vec<String>,
    pub competency_level: CompetencyLevel,
}

static STRENGTH_PATTERNS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r"우수한?\s*[\w\s]+").unwrap(),
        Regex::new(r"뛰어난?\s*[\w\s]+").unwrap(),
        Regex::new(r"탁월한?\s*[\w\s]+").unwrap(),
        Regex::new(r"깊이\s*있는?\s*[\w\s]+").unwrap(),
    ]
});

const SKILL_KEYWORDS: &[(&str, &[&str])] = &[
    ("분석력", &["분석", "해석", "논리"]),
    ("창의력", &["창의", "독창", "아이디어"]),
    ("탐구력", &["탐구", "연구", "조사"]),
    ("표현력", &["표현", "발표", "설명"]),
    ("응용력", &["응용", "활용", "적용"]),
    ("이해력", &["이해", "파악", "습득"]),
];

const HIGH_LEVEL_MARKERS: &[&str] = &["우수", "뛰어난", "탁월", "깊이", "심화", "고차원"];
const BASIC_LEVEL_MARKERS: &[&str] = &["기초", "기본", "단순", "부족"];

pub fn evaluate_competency_level(remarks: &str) -> CompetencyLevel {
    let text = remarks.to_lowercase();
    if HIGH_LEVEL_MARKERS.iter().any(|m| text.contains(m)) {
        CompetencyLevel::High
    } else if BASIC_LEVEL_MARKERS.iter().any(|m| text.contains(m)) {
        CompetencyLevel::Basic
    } else {
        CompetencyLevel::Medium
    }
}

pub fn process_detailed_abilities(data: &ExtractedData) -> Vec<ProcessedAbility> {
    abilities(data)
        .iter()
        .map(|ability| ProcessedAbility {
            category: categorize_subject(&ability.subject),
            key_strengths: collect_matches(&*STRENGTH_PATTERNS, &ability.remarks, 2, 3),
            skill_areas: keyword_tags(&ability.remarks, SKILL_KEYWORDS),
            competency_level: evaluate_competency_level(&ability.remarks),
            ability: ability.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Feedback;

    fn feedbacks(n: usize) -> Vec<Feedback> {
        (0..n)
            .map(|i| Feedback {
                sentence: format!("s{}", i),
                feedback: "f".to_string(),
            })
            .collect()
    }

    fn analysis(counts: [usize; 5]) -> ValidationAnalysis {
        let mut analysis = ValidationAnalysis::default();
        for (kind, n) in ValidationType::ALL.into_iter().zip(counts) {
            analysis.get_mut(kind).feedbacks = feedbacks(n);
        }
        analysis
    }

    fn activity(area: &str, hours: f64, remarks: &str) -> CreativeActivity {
        CreativeActivity {
            area: area.to_string(),
            hours,
            remarks: remarks.to_string(),
        }
    }

    #[test]
    fn test_category_scores() {
        // 4+3+2+1+0 = 10 feedbacks
        let scores = category_scores(&analysis([4, 3, 2, 1, 0]));
        assert_eq!(scores.blue_highlight, 40);
        assert_eq!(scores.red_line, 30);
        assert_eq!(scores.blue_line, 20);
        assert_eq!(scores.black_line, 80);
        assert_eq!(scores.red_check, 100);

        // round((40*.4 + 30*.35 + 20*.25)*.7 + (80*.6 + 100*.4)*.3) = round(22.05 + 26.4)
        assert_eq!(overall_score(&scores), 48);
    }

    #[test]
    fn test_scores_are_zero_without_feedback() {
        let scores = category_scores(&ValidationAnalysis::default());
        assert_eq!(scores, CategoryScores::default());
        assert_eq!(overall_score(&scores), 0);
    }

    #[test]
    fn test_negative_scores_floor_at_zero() {
        let scores = category_scores(&analysis([0, 0, 0, 3, 1]));
        assert_eq!(scores.black_line, 0);
        assert_eq!(scores.red_check, 50);
    }

    #[test]
    fn test_statistics_and_key_areas() {
        let data = ExtractedData {
            creative_activities: Some(vec![
                activity("자율활동", 10.0, ""),
                activity("동아리활동", 20.0, ""),
                activity("진로활동", 5.5, ""),
                activity("자율활동", 2.0, ""),
            ]),
            academic_developments: Some(vec![AcademicDevelopment::default(); 2]),
            detailed_abilities: Some(vec![DetailedAbility::default(); 5]),
        };
        let stats = calculate_analysis_statistics(&data, &analysis([3, 3, 2, 4, 3]));
        assert_eq!(stats.total_activities, 4);
        assert_eq!(stats.total_activity_hours, 37.5);
        assert_eq!(stats.activity_domains, vec!["자율활동", "동아리활동", "진로활동"]);
        assert_eq!(stats.total_subjects, 2);
        assert_eq!(stats.subject_count, 5);
        assert_eq!(
            stats.strength_areas,
            vec!["활동 영역 다양성", "교과 영역 폭넓음", "진로 역량", "구체적 노력", "연계성"]
        );
        assert_eq!(stats.improvement_areas, vec!["구체성 부족", "정보 부족"]);
    }

    #[test]
    fn test_process_activities() {
        let data = ExtractedData {
            creative_activities: Some(vec![activity(
                "동아리",
                12.0,
                "앱을 개발함. 서버를 설계하였음. UI를 구현했음. 팀과 협력함. 대회에서 수상함.",
            )]),
            ..Default::default()
        };
        let processed = process_activities(&data);
        assert_eq!(processed[0].domain, "동아리활동");
        assert_eq!(processed[0].highlights, vec!["개발함", "설계하였음", "협력함"]);
        assert_eq!(processed[0].competency_areas, vec!["협업"]);

        let json = serde_json::to_value(&processed[0]).unwrap();
        assert_eq!(json["영역"], "동아리");
        assert_eq!(json["competencyAreas"][0], "협업");

        let stats = activity_stats_by_domain(&processed);
        assert_eq!(stats["동아리활동"].count, 1);
        assert_eq!(stats["동아리활동"].hours, 12.0);
    }

    #[test]
    fn test_academic_categories_and_performance() {
        assert_eq!(categorize_subject("문학"), "국어/문학");
        assert_eq!(categorize_subject("미적분"), "수학");
        assert_eq!(categorize_subject("실용영어"), "영어");
        assert_eq!(categorize_subject("생활과 윤리"), "사회");
        assert_eq!(categorize_subject("정보"), "기타");

        assert_eq!(evaluate_performance("A", "9"), PerformanceLevel::Excellent);
        assert_eq!(evaluate_performance("B", ""), PerformanceLevel::Good);
        assert_eq!(evaluate_performance("", "2(310)"), PerformanceLevel::Excellent);
        assert_eq!(evaluate_performance("A(120)", "4"), PerformanceLevel::Good);
        assert_eq!(evaluate_performance("", "6"), PerformanceLevel::Average);
        assert_eq!(evaluate_performance("", "7"), PerformanceLevel::NeedsImprovement);
        assert_eq!(evaluate_performance("P", "-"), PerformanceLevel::NeedsImprovement);

        let data = ExtractedData {
            academic_developments: Some(vec![AcademicDevelopment {
                subject: "물리학Ⅰ".to_string(),
                credits: 3.0,
                score_over_average: "88/70.1(12.3)".to_string(),
                achievement: "B".to_string(),
                rank: "3".to_string(),
            }]),
            ..Default::default()
        };
        let processed = process_academics(&data);
        assert_eq!(processed[0].category, "과학");
        assert_eq!(processed[0].numeric_grade, Some(88));
        let json = serde_json::to_value(&processed[0]).unwrap();
        assert_eq!(json["performanceLevel"], "good");
        assert_eq!(json["과목"], "물리학Ⅰ");

        let stats = academic_stats_by_category(&processed);
        assert_eq!(stats["과학"].count, 1);
    }

    #[test]
    fn test_process_detailed_abilities() {
        let data = ExtractedData {
            detailed_abilities: Some(vec![
                DetailedAbility {
                    subject: "국어".to_string(),
                    remarks: "우수한 분석 능력을 보임. 깊이 있는 탐구를 수행함.".to_string(),
                },
                DetailedAbility {
                    subject: "체육".to_string(),
                    remarks: "기초 체력을 기름.".to_string(),
                },
                DetailedAbility {
                    subject: "음악".to_string(),
                    remarks: "합창에 참여함.".to_string(),
                },
            ]),
            ..Default::default()
        };
        let processed = process_detailed_abilities(&data);
        assert_eq!(processed[0].key_strengths, vec!["우수한 분석 능력을 보임", "깊이 있는 탐구를 수행함"]);
        assert_eq!(processed[0].skill_areas, vec!["분석력", "탐구력"]);
        assert_eq!(processed[0].competency_level, CompetencyLevel::High);
        assert_eq!(processed[1].category, "예체능");
        assert_eq!(processed[1].competency_level, CompetencyLevel::Basic);
        assert_eq!(processed[2].competency_level, CompetencyLevel::Medium);
    }
}
