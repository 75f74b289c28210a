//! English study quizzes built from the sentences of an uploaded PDF
//!
//! The model proposes blanks, key sentences and vocabulary; this module turns
//! its reply into answerable quizzes. Without a usable reply a basic quiz is
//! built from the sentences alone.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

const MAX_SENTENCES: usize = 15;
/// Sentences sent to the model
pub const PROMPT_SENTENCES: usize = 10;

static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());
static PLAIN_ENGLISH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z\s,'-]+$").unwrap());

const COMMON_WORDS: [&str; 10] = [
    "important",
    "different",
    "necessary",
    "possible",
    "available",
    "significant",
    "effective",
    "successful",
    "various",
    "essential",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillInBlank {
    pub sentence: String,
    pub blanks: Vec<String>,
    pub options: Vec<Vec<String>>,
    /// Index of each blank's answer in its options; -1 when the model left it out
    pub correct: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordOrder {
    pub original_sentence: String,
    pub scrambled_words: Vec<String>,
    pub correct_order: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyItem {
    pub word: String,
    pub meaning: String,
    pub context: String,
    pub options: Vec<String>,
    pub correct: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizData {
    pub original_text: String,
    pub sentences: Vec<String>,
    pub fill_in_blank_quiz: Vec<FillInBlank>,
    pub word_order_quiz: Vec<WordOrder>,
    pub vocabulary_quiz: Vec<VocabularyItem>,
}

/// Model reply; every list is required
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelQuiz {
    pub fill_in_blank_quiz: Vec<ModelBlank>,
    pub important_sentences: Vec<String>,
    pub vocabulary_words: Vec<ModelWord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBlank {
    pub sentence: String,
    pub blank_words: Vec<String>,
    pub options: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelWord {
    pub word: String,
    pub meaning: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub distractors: Vec<String>,
}

/// Plain English sentences of 5 to 25 words, at most 15
pub fn extract_sentences(text: &str) -> Vec<String> {
    let flattened = LINE_BREAKS.replace_all(text, " ");
    let normalized = WHITESPACE.replace_all(&flattened, " ");
    SENTENCE_END
        .split(&normalized)
        .map(str::trim)
        .filter(|s| {
            let len = s.chars().count();
            let words = s.split(' ').count();
            len > 20 && len < 200 && PLAIN_ENGLISH.is_match(s) && (5..=25).contains(&words)
        })
        .take(MAX_SENTENCES)
        .map(str::to_string)
        .collect()
}

/// The text shown to the model, and recorded as the quiz's source
pub fn prompt_text(sentences: &[String]) -> String {
    let head = &sentences[..sentences.len().min(PROMPT_SENTENCES)];
    format!("{}.", head.join(". "))
}

fn index_of(options: &[String], answer: &str) -> i64 {
    options
        .iter()
        .position(|o| o == answer)
        .map_or(-1, |i| i as i64)
}

fn word_order(sentence: &str, max_words: usize, rng: &mut impl Rng) -> WordOrder {
    let words: Vec<String> = sentence
        .split(' ')
        .filter(|w| !w.is_empty())
        .take(max_words)
        .map(str::to_string)
        .collect();
    let correct_order = (0..words.len()).collect();
    let mut scrambled_words = words;
    scrambled_words.shuffle(rng);
    WordOrder {
        original_sentence: sentence.to_string(),
        scrambled_words,
        correct_order,
    }
}

/// Quizzes from a model reply
pub fn assemble(reply: ModelQuiz, sentences: &[String], rng: &mut impl Rng) -> QuizData {
    let fill_in_blank_quiz = reply
        .fill_in_blank_quiz
        .into_iter()
        .map(|q| {
            let correct = q
                .blank_words
                .iter()
                .enumerate()
                .map(|(i, word)| q.options.get(i).map_or(-1, |opts| index_of(opts, word)))
                .collect();
            FillInBlank {
                sentence: q.sentence,
                blanks: q.blank_words,
                options: q.options,
                correct,
            }
        })
        .collect();

    let word_order_quiz = reply
        .important_sentences
        .iter()
        .take(4)
        .map(|s| word_order(s, usize::MAX, &mut *rng))
        .collect();

    let vocabulary_quiz = reply
        .vocabulary_words
        .into_iter()
        .map(|v| {
            let mut options = Vec::with_capacity(v.distractors.len() + 1);
            options.push(v.meaning.clone());
            options.extend(v.distractors);
            options.shuffle(&mut *rng);
            let correct = index_of(&options, &v.meaning);
            VocabularyItem {
                word: v.word,
                meaning: v.meaning,
                context: v.context,
                options,
                correct,
            }
        })
        .collect();

    QuizData {
        original_text: prompt_text(sentences),
        sentences: sentences.to_vec(),
        fill_in_blank_quiz,
        word_order_quiz,
        vocabulary_quiz,
    }
}

fn basic_blank(sentence: &str, rng: &mut impl Rng) -> FillInBlank {
    let words: Vec<&str> = sentence.split(' ').collect();
    let wanted = (words.len() / 8).clamp(2, 3);
    let candidates: Vec<usize> = (0..words.len())
        .filter(|&i| words[i].chars().count() >= 3)
        .collect();
    let mut positions: Vec<usize> = candidates
        .choose_multiple(rng, wanted.min(candidates.len()))
        .copied()
        .collect();
    positions.sort_unstable();

    let blanks: Vec<String> = positions.iter().map(|&i| words[i].to_string()).collect();
    let blanked = words
        .iter()
        .enumerate()
        .map(|(i, w)| if positions.contains(&i) { "___" } else { *w })
        .collect::<Vec<_>>()
        .join(" ");

    let options: Vec<Vec<String>> = blanks
        .iter()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut choices = vec![word.clone()];
            choices.extend(
                COMMON_WORDS
                    .iter()
                    .filter(|w| **w != lower)
                    .take(3)
                    .map(|w| w.to_string()),
            );
            choices.shuffle(&mut *rng);
            choices
        })
        .collect();
    let correct = blanks
        .iter()
        .zip(&options)
        .map(|(word, opts)| index_of(opts, word))
        .collect();

    FillInBlank {
        sentence: blanked,
        blanks,
        options,
        correct,
    }
}

fn fixed_vocabulary() -> Vec<VocabularyItem> {
    let item = |word: &str, meaning: &str, context: &str, options: [&str; 4], correct: i64| VocabularyItem {
        word: word.to_string(),
        meaning: meaning.to_string(),
        context: context.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct,
    };
    vec![
        item("education", "교육", "Education is important", ["교육", "경제", "사회", "기술"], 0),
        item("important", "중요한", "This is important", ["쉬운", "중요한", "어려운", "재미있는"], 1),
        item("development", "발전", "Economic development", ["문제", "해결", "발전", "계획"], 2),
    ]
}

/// Quizzes built from the sentences alone
pub fn basic(sentences: &[String], rng: &mut impl Rng) -> QuizData {
    let fill_in_blank_quiz = sentences.iter().take(5).map(|s| basic_blank(s, &mut *rng)).collect();
    let word_order_quiz = sentences.iter().take(3).map(|s| word_order(s, 8, &mut *rng)).collect();
    QuizData {
        original_text: format!("{}.", sentences.join(". ")),
        sentences: sentences.to_vec(),
        fill_in_blank_quiz,
        word_order_quiz,
        vocabulary_quiz: fixed_vocabulary(),
    }
}
