//! Spaced-repetition study decks for the English tutors
//!
//! Scheduling is SM-2 with a fixed answer quality of 4 for correct answers. Each
//! tutor keeps its cards under its own key family, described by a [`Deck`].

use rand::seq::SliceRandom;
use serde::Deserialize;
use yaktoon_common::models::{HashRecord, StudyWord};
use yaktoon_common::{keys, time, Result, Store};

pub const INITIAL_EASINESS: f64 = 2.5;
const MIN_EASINESS: f64 = 1.3;
/// Answer quality recorded for a correct answer (0-5)
const CORRECT_QUALITY: f64 = 4.0;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// A word as proposed by the model or a fallback list
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WordDraft {
    pub word: String,
    pub meaning: String,
    pub example: String,
    pub translation: String,
    pub pronunciation: Option<String>,
    pub difficulty: Option<String>,
}

impl WordDraft {
    pub fn new(word: &str, meaning: &str, example: &str, translation: &str) -> Self {
        Self {
            word: word.to_string(),
            meaning: meaning.to_string(),
            example: example.to_string(),
            translation: translation.to_string(),
            ..Default::default()
        }
    }

    pub fn pronunciation(mut self, pronunciation: &str) -> Self {
        self.pronunciation = Some(pronunciation.to_string());
        self
    }

    pub fn difficulty(mut self, difficulty: &str) -> Self {
        self.difficulty = Some(difficulty.to_string());
        self
    }
}

/// A fresh card, due for review one day after `now_ms`
pub fn new_card(draft: WordDraft, category: &str, index: usize, now_ms: i64) -> StudyWord {
    StudyWord {
        id: format!("{}-{}", now_ms, index),
        word: draft.word,
        meaning: draft.meaning,
        example: draft.example,
        translation: draft.translation,
        category: category.to_string(),
        pronunciation: draft.pronunciation,
        difficulty: draft.difficulty,
        created_at: now_ms,
        next_review_date: now_ms.saturating_add(DAY_MS),
        interval: 1,
        easiness_factor: INITIAL_EASINESS,
        ..Default::default()
    }
}

pub fn is_due(word: &StudyWord, now_ms: i64) -> bool {
    word.next_review_date <= now_ms
}

/// Reschedule a card after an answer
pub fn review(word: &mut StudyWord, correct: bool, now_ms: i64) {
    if correct {
        word.correct_count += 1;
        word.interval = match word.correct_count {
            1 => 1,
            2 => 3,
            _ => (word.interval as f64 * word.easiness_factor).round() as i64,
        };
        let lapse = 5.0 - CORRECT_QUALITY;
        word.easiness_factor += 0.1 - lapse * (0.08 + lapse * 0.02);
    } else {
        word.incorrect_count += 1;
        word.interval = 1;
        word.easiness_factor = (word.easiness_factor - 0.2).max(MIN_EASINESS);
    }
    word.next_review_date = now_ms.saturating_add(word.interval.saturating_mul(DAY_MS));
    word.last_reviewed = Some(now_ms);
}

/// Key layout of one tutor's deck
pub struct Deck {
    word: fn(&str, &str) -> String,
    all: fn(&str) -> String,
    studied: fn(&str, &str) -> String,
}

pub const CHRISTINE: Deck = Deck {
    word: keys::christine_word,
    all: keys::christine_words,
    studied: keys::christine_studied,
};

pub const TERRY: Deck = Deck {
    word: keys::terry_word,
    all: keys::terry_words,
    studied: keys::terry_studied,
};

impl Deck {
    /// Store a card and add it to the user's deck
    pub async fn save(&self, store: &dyn Store, user_id: &str, word: &StudyWord) -> Result<()> {
        store.hset(&(self.word)(user_id, &word.id), &word.to_fields()).await?;
        store.sadd(&(self.all)(user_id), &word.id).await?;
        Ok(())
    }

    pub async fn load(&self, store: &dyn Store, user_id: &str, word_id: &str) -> Result<Option<StudyWord>> {
        let hash = store.hgetall(&(self.word)(user_id, word_id)).await?;
        if hash.is_empty() {
            return Ok(None);
        }
        Ok(Some(StudyWord::from_hash(&hash)))
    }

    /// Cards for the given ids; ids without a stored card are skipped
    pub async fn load_many(&self, store: &dyn Store, user_id: &str, ids: &[String]) -> Result<Vec<StudyWord>> {
        let mut words = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(word) = self.load(store, user_id, id).await? {
                words.push(word);
            }
        }
        Ok(words)
    }

    pub async fn all(&self, store: &dyn Store, user_id: &str) -> Result<Vec<StudyWord>> {
        let ids = store.smembers(&(self.all)(user_id)).await?;
        self.load_many(store, user_id, &ids).await
    }

    pub async fn due(&self, store: &dyn Store, user_id: &str, now_ms: i64) -> Result<Vec<StudyWord>> {
        let mut words = self.all(store, user_id).await?;
        words.retain(|w| is_due(w, now_ms));
        Ok(words)
    }

    /// Due cards in random order, at most `limit`
    pub async fn due_sample(
        &self,
        store: &dyn Store,
        user_id: &str,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<StudyWord>> {
        let mut words = self.due(store, user_id, now_ms).await?;
        words.shuffle(&mut rand::thread_rng());
        words.truncate(limit);
        Ok(words)
    }

    /// Reschedule a card, save it and count it as studied today
    pub async fn record_answer(
        &self,
        store: &dyn Store,
        user_id: &str,
        word: &mut StudyWord,
        correct: bool,
    ) -> Result<()> {
        let now = time::now();
        review(word, correct, now.timestamp_millis());
        store.hset(&(self.word)(user_id, &word.id), &word.to_fields()).await?;
        store
            .sadd(&(self.studied)(user_id, &time::day_label(&now)), &word.id)
            .await?;
        Ok(())
    }

    pub async fn studied_today(&self, store: &dyn Store, user_id: &str) -> Result<usize> {
        let day = time::day_label(&time::now());
        Ok(store.smembers(&(self.studied)(user_id, &day)).await?.len())
    }

    pub async fn size(&self, store: &dyn Store, user_id: &str) -> Result<usize> {
        Ok(store.smembers(&(self.all)(user_id)).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaktoon_common::MemoryStore;

    const NOW: i64 = 1_700_000_000_000;

    fn card() -> StudyWord {
        new_card(WordDraft::new("hello", "안녕하세요", "Hello!", "안녕!"), "smalltalk", 0, NOW)
    }

    #[test]
    fn test_new_card_defaults() {
        let word = card();
        assert_eq!(word.id, format!("{}-0", NOW));
        assert_eq!(word.interval, 1);
        assert_eq!(word.easiness_factor, INITIAL_EASINESS);
        assert_eq!(word.next_review_date, NOW + DAY_MS);
        assert!(!is_due(&word, NOW));
        assert!(is_due(&word, NOW + DAY_MS));
    }

    #[test]
    fn test_correct_answers_grow_interval() {
        let mut word = card();
        review(&mut word, true, NOW);
        assert_eq!((word.correct_count, word.interval), (1, 1));
        review(&mut word, true, NOW);
        assert_eq!(word.interval, 3);
        review(&mut word, true, NOW);
        // round(3 × 2.5); quality 4 leaves the easiness unchanged
        assert_eq!(word.interval, 8);
        assert!((word.easiness_factor - 2.5).abs() < 1e-9);
        assert_eq!(word.next_review_date, NOW + 8 * DAY_MS);
        assert_eq!(word.last_reviewed, Some(NOW));
    }

    #[test]
    fn test_wrong_answer_resets_and_floors_easiness() {
        let mut word = card();
        word.interval = 20;
        for _ in 0..10 {
            review(&mut word, false, NOW);
        }
        assert_eq!(word.incorrect_count, 10);
        assert_eq!(word.interval, 1);
        assert_eq!(word.easiness_factor, MIN_EASINESS);
        assert_eq!(word.next_review_date, NOW + DAY_MS);
    }

    #[tokio::test]
    async fn test_deck_due_and_studied() {
        let store = MemoryStore::new();
        let mut due = card();
        due.next_review_date = 0;
        let mut later = new_card(WordDraft::new("bye", "안녕히", "", ""), "smalltalk", 1, NOW);
        later.next_review_date = i64::MAX;
        TERRY.save(&store, "u1", &due).await.unwrap();
        TERRY.save(&store, "u1", &later).await.unwrap();

        assert_eq!(TERRY.size(&store, "u1").await.unwrap(), 2);
        assert_eq!(CHRISTINE.size(&store, "u1").await.unwrap(), 0);
        let due_words = TERRY.due(&store, "u1", NOW).await.unwrap();
        assert_eq!(due_words.len(), 1);
        assert_eq!(due_words[0].word, "hello");

        let mut word = TERRY.load(&store, "u1", &due.id).await.unwrap().unwrap();
        TERRY.record_answer(&store, "u1", &mut word, true).await.unwrap();
        assert_eq!(TERRY.studied_today(&store, "u1").await.unwrap(), 1);
        let stored = TERRY.load(&store, "u1", &due.id).await.unwrap().unwrap();
        assert_eq!(stored.correct_count, 1);
        assert!(TERRY.load(&store, "u1", "missing").await.unwrap().is_none());
    }
}
