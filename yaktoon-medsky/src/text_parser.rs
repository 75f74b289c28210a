//! Record section extraction
//!
//! A Korean school record lists its parts under numbered headings. Each section
//! runs from its heading up to (not including) the heading that follows it.
//! When the following heading is missing the section is reported empty, except
//! for the last section which runs to the end of the text.

use crate::types::TextSections;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static CREATIVE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"6\.\s*창의적\s*체험활동상황").unwrap());
static ACADEMIC_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"7\.\s*교과학습발달상황").unwrap());
static DETAILED_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"세부능력\s*및\s*특기사항").unwrap());
static READING_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"8\.\s*독서활동상황").unwrap());
static BEHAVIORAL_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"9\.\s*행동특성\s*및\s*종합의견").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static LINE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\d+→?").unwrap());
static PAGE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\f\r]").unwrap());
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*([,.;:!?])\s*").unwrap());
static OPEN_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(\s*").unwrap());
static CLOSE_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\)\s*").unwrap());

/// Text from the first `start` heading up to the next `end` heading
///
/// `end = None` takes everything to the end of the text.
fn slice_between(content: &str, start: &Regex, end: Option<&Regex>) -> String {
    let Some(start_match) = start.find(content) else {
        return String::new();
    };
    let section = match end {
        Some(end) => match end.find_at(content, start_match.end()) {
            Some(end_match) => &content[start_match.start()..end_match.start()],
            None => return String::new(),
        },
        None => &content[start_match.start()..],
    };
    section.trim().to_string()
}

pub fn parse_creative_activities(content: &str) -> String {
    slice_between(content, &CREATIVE_START, Some(&ACADEMIC_START))
}

pub fn parse_academic_development(content: &str) -> String {
    slice_between(content, &ACADEMIC_START, Some(&DETAILED_START))
}

pub fn parse_detailed_abilities(content: &str) -> String {
    slice_between(content, &DETAILED_START, Some(&READING_START))
}

pub fn parse_reading_activities(content: &str) -> String {
    slice_between(content, &READING_START, Some(&BEHAVIORAL_START))
}

pub fn parse_behavioral_characteristics(content: &str) -> String {
    slice_between(content, &BEHAVIORAL_START, None)
}

pub fn parse_all_sections(content: &str) -> TextSections {
    TextSections {
        creative_activities: parse_creative_activities(content),
        academic_development: parse_academic_development(content),
        detailed_abilities: parse_detailed_abilities(content),
        reading_activities: parse_reading_activities(content),
        behavioral_characteristics: parse_behavioral_characteristics(content),
    }
}

/// Normalize PDF extraction artifacts in one section
///
/// Collapses whitespace, drops a leading line number and form feeds, and
/// normalizes spacing around punctuation and parentheses.
pub fn clean_text_section(text: &str) -> String {
    let text = WHITESPACE.replace_all(text, " ");
    let text = LINE_NUMBER.replace_all(&text, "");
    let text = PAGE_BREAK.replace_all(&text, "");
    let text = PUNCTUATION.replace_all(&text, "$1 ");
    let text = OPEN_PAREN.replace_all(&text, "(");
    let text = CLOSE_PAREN.replace_all(&text, ") ");
    text.trim().to_string()
}

pub fn clean_all_sections(sections: &TextSections) -> TextSections {
    TextSections {
        creative_activities: clean_text_section(&sections.creative_activities),
        academic_development: clean_text_section(&sections.academic_development),
        detailed_abilities: clean_text_section(&sections.detailed_abilities),
        reading_activities: clean_text_section(&sections.reading_activities),
        behavioral_characteristics: clean_text_section(&sections.behavioral_characteristics),
    }
}

/// Names of the sections the analysis cannot run without, if empty
pub fn validate_parsed_sections(sections: &TextSections) -> Vec<&'static str> {
    [
        ("creativeActivities", &sections.creative_activities),
        ("academicDevelopment", &sections.academic_development),
        ("detailedAbilities", &sections.detailed_abilities),
    ]
    .into_iter()
    .filter(|(_, text)| text.trim().is_empty())
    .map(|(name, _)| name)
    .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionCounts {
    pub creative_activities: usize,
    pub academic_development: usize,
    pub detailed_abilities: usize,
    pub reading_activities: usize,
    pub behavioral_characteristics: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStats {
    pub total_characters: usize,
    pub section_counts: SectionCounts,
    pub empty_sections: Vec<&'static str>,
}

/// Character counts per section, for logging
pub fn section_stats(sections: &TextSections) -> SectionStats {
    let named = [
        ("creativeActivities", sections.creative_activities.chars().count()),
        ("academicDevelopment", sections.academic_development.chars().count()),
        ("detailedAbilities", sections.detailed_abilities.chars().count()),
        ("readingActivities", sections.reading_activities.chars().count()),
        ("behavioralCharacteristics", sections.behavioral_characteristics.chars().count()),
    ];

    SectionStats {
        total_characters: named.iter().map(|(_, n)| n).sum(),
        section_counts: SectionCounts {
            creative_activities: named[0].1,
            academic_development: named[1].1,
            detailed_abilities: named[2].1,
            reading_activities: named[3].1,
            behavioral_characteristics: named[4].1,
        },
        empty_sections: named.iter().filter(|(_, n)| *n == 0).map(|(name, _)| *name).collect(),
    }
}
