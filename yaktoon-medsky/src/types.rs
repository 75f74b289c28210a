//! Student record analysis types
//!
//! Field names of the extracted tables keep the Korean column headers of the
//! record, since clients and stored analyses use them as JSON keys.

use serde::{Deserialize, Serialize};

// ============================================================================
// Processing status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStage {
    Uploading,
    Parsing,
    Extracting,
    Analyzing,
    Validating,
    Completed,
    Error,
}

impl ProcessingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStage::Uploading => "uploading",
            ProcessingStage::Parsing => "parsing",
            ProcessingStage::Extracting => "extracting",
            ProcessingStage::Analyzing => "analyzing",
            ProcessingStage::Validating => "validating",
            ProcessingStage::Completed => "completed",
            ProcessingStage::Error => "error",
        }
    }

    /// Completed or failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStage::Completed | ProcessingStage::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub stage: ProcessingStage,
    /// 0-100
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingStatus {
    pub fn new(stage: ProcessingStage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress,
            message: message.into(),
            error: None,
        }
    }

    /// Error status: progress resets and the message doubles as the error text
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            stage: ProcessingStage::Error,
            progress: 0,
            error: Some(message.clone()),
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_sections: Option<TextSections>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<ExtractedData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_analysis: Option<ValidationAnalysis>,
}

impl ProcessingResult {
    pub fn new(status: ProcessingStatus) -> Self {
        Self {
            status,
            parsed_text: None,
            text_sections: None,
            extracted_data: None,
            validation_analysis: None,
        }
    }
}

// ============================================================================
// Record sections
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextSections {
    /// 6. 창의적 체험활동상황
    pub creative_activities: String,
    /// 7. 교과학습발달상황
    pub academic_development: String,
    /// 세부능력 및 특기사항
    pub detailed_abilities: String,
    /// 8. 독서활동상황
    pub reading_activities: String,
    /// 9. 행동특성 및 종합의견
    pub behavioral_characteristics: String,
}

// ============================================================================
// Extracted tables
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreativeActivity {
    #[serde(rename = "영역")]
    pub area: String,
    #[serde(rename = "시간", default)]
    pub hours: f64,
    #[serde(rename = "특기사항", default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcademicDevelopment {
    #[serde(rename = "과목")]
    pub subject: String,
    #[serde(rename = "학점수", default)]
    pub credits: f64,
    /// e.g. "92/75.3(10.2)"
    #[serde(default)]
    pub score_over_average: String,
    #[serde(rename = "성취도", default)]
    pub achievement: String,
    #[serde(rename = "석차등급", default)]
    pub rank: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedAbility {
    #[serde(rename = "과목")]
    pub subject: String,
    #[serde(rename = "특기사항", default)]
    pub remarks: String,
}

/// LLM reply wrappers, one per extraction schema
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CreativeActivitiesReply {
    #[serde(rename = "창의적체험활동상황", default)]
    pub items: Vec<CreativeActivity>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AcademicDevelopmentsReply {
    #[serde(rename = "교과학습발달상황", default)]
    pub items: Vec<AcademicDevelopment>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DetailedAbilitiesReply {
    #[serde(rename = "세부특기사항", default)]
    pub items: Vec<DetailedAbility>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_activities: Option<Vec<CreativeActivity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic_developments: Option<Vec<AcademicDevelopment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_abilities: Option<Vec<DetailedAbility>>,
}

// ============================================================================
// Validation feedback
// ============================================================================

/// The five reviewer markings applied to record sentences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    /// Sentences showing career-related competence
    BlueHighlight,
    /// Concrete effort and depth
    RedLine,
    /// Follow-up inquiry linking activities
    BlueLine,
    /// Vague statements
    BlackLine,
    /// Too little information to evaluate
    RedCheck,
}

impl ValidationType {
    pub const ALL: [ValidationType; 5] = [
        ValidationType::BlueHighlight,
        ValidationType::RedLine,
        ValidationType::BlueLine,
        ValidationType::BlackLine,
        ValidationType::RedCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationType::BlueHighlight => "blue_highlight",
            ValidationType::RedLine => "red_line",
            ValidationType::BlueLine => "blue_line",
            ValidationType::BlackLine => "black_line",
            ValidationType::RedCheck => "red_check",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Markings that count for the student
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            ValidationType::BlueHighlight | ValidationType::RedLine | ValidationType::BlueLine
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default)]
    pub sentence: String,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(rename = "type")]
    pub kind: ValidationType,
    #[serde(rename = "Feedbacks", default)]
    pub feedbacks: Vec<Feedback>,
}

impl ValidationResult {
    pub fn empty(kind: ValidationType) -> Self {
        Self {
            kind,
            feedbacks: Vec::new(),
        }
    }
}

/// One [`ValidationResult`] per marking type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationAnalysis {
    pub blue_highlight: ValidationResult,
    pub red_line: ValidationResult,
    pub blue_line: ValidationResult,
    pub black_line: ValidationResult,
    pub red_check: ValidationResult,
}

impl Default for ValidationAnalysis {
    fn default() -> Self {
        Self {
            blue_highlight: ValidationResult::empty(ValidationType::BlueHighlight),
            red_line: ValidationResult::empty(ValidationType::RedLine),
            blue_line: ValidationResult::empty(ValidationType::BlueLine),
            black_line: ValidationResult::empty(ValidationType::BlackLine),
            red_check: ValidationResult::empty(ValidationType::RedCheck),
        }
    }
}

impl ValidationAnalysis {
    pub fn get(&self, kind: ValidationType) -> &ValidationResult {
        match kind {
            ValidationType::BlueHighlight => &self.blue_highlight,
            ValidationType::RedLine => &self.red_line,
            ValidationType::BlueLine => &self.blue_line,
            ValidationType::BlackLine => &self.black_line,
            ValidationType::RedCheck => &self.red_check,
        }
    }

    pub fn get_mut(&mut self, kind: ValidationType) -> &mut ValidationResult {
        match kind {
            ValidationType::BlueHighlight => &mut self.blue_highlight,
            ValidationType::RedLine => &mut self.red_line,
            ValidationType::BlueLine => &mut self.blue_line,
            ValidationType::BlackLine => &mut self.black_line,
            ValidationType::RedCheck => &mut self.red_check,
        }
    }

    pub fn count(&self, kind: ValidationType) -> usize {
        self.get(kind).feedbacks.len()
    }

    pub fn total_feedbacks(&self) -> usize {
        ValidationType::ALL.iter().map(|t| self.count(*t)).sum()
    }
}
