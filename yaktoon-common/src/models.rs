//! Domain models stored as Redis hashes
//!
//! Hash values are strings. Numbers are parsed leniently (unparseable → 0) and
//! structured fields (`tags`, `stats`) are JSON strings inside the hash.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Conversion between a model and its Redis hash fields
pub trait HashRecord: Sized {
    fn from_hash(hash: &HashMap<String, String>) -> Self;
    fn to_fields(&self) -> Vec<(&'static str, String)>;
}

fn text(hash: &HashMap<String, String>, field: &str) -> String {
    hash.get(field).cloned().unwrap_or_default()
}

fn opt_text(hash: &HashMap<String, String>, field: &str) -> Option<String> {
    hash.get(field).filter(|v| !v.is_empty()).cloned()
}

fn number(hash: &HashMap<String, String>, field: &str) -> i64 {
    hash.get(field)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|v| v as i64)
        .unwrap_or(0)
}

fn json_or_default<T: serde::de::DeserializeOwned + Default>(
    hash: &HashMap<String, String>,
    field: &str,
) -> T {
    hash.get(field)
        .and_then(|v| serde_json::from_str(v).ok())
        .unwrap_or_default()
}

/// Parse a hash value that may hold JSON; falls back to the raw string
pub fn json_or_string(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Student,
    Parent,
    Influencer,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Student => "student",
            UserType::Parent => "parent",
            UserType::Influencer => "influencer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(UserType::Student),
            "parent" => Some(UserType::Parent),
            "influencer" => Some(UserType::Influencer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Login name
    pub user_id: String,
    pub student_phone_number: String,
    pub parent_phone_number: String,
    /// Absent on accounts created by self-registration
    pub user_type: Option<UserType>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: i64,
    pub role: Option<String>,
    pub influencer_slug: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }

    pub fn is_influencer(&self) -> bool {
        self.user_type == Some(UserType::Influencer)
    }
}

impl HashRecord for User {
    fn from_hash(hash: &HashMap<String, String>) -> Self {
        Self {
            id: text(hash, "id"),
            name: text(hash, "name"),
            email: text(hash, "email"),
            user_id: text(hash, "userId"),
            student_phone_number: text(hash, "studentPhoneNumber"),
            parent_phone_number: text(hash, "parentPhoneNumber"),
            user_type: hash.get("userType").and_then(|t| UserType::parse(t)),
            password_hash: text(hash, "passwordHash"),
            created_at: number(hash, "createdAt"),
            role: opt_text(hash, "role"),
            influencer_slug: opt_text(hash, "influencerSlug"),
        }
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("id", self.id.clone()),
            ("name", self.name.clone()),
            ("email", self.email.clone()),
            ("passwordHash", self.password_hash.clone()),
            ("createdAt", self.created_at.to_string()),
        ];
        if !self.user_id.is_empty() {
            fields.push(("userId", self.user_id.clone()));
        }
        if !self.student_phone_number.is_empty() {
            fields.push(("studentPhoneNumber", self.student_phone_number.clone()));
        }
        if !self.parent_phone_number.is_empty() {
            fields.push(("parentPhoneNumber", self.parent_phone_number.clone()));
        }
        if let Some(user_type) = self.user_type {
            fields.push(("userType", user_type.as_str().to_string()));
        }
        if let Some(role) = &self.role {
            fields.push(("role", role.clone()));
        }
        if let Some(slug) = &self.influencer_slug {
            fields.push(("influencerSlug", slug.clone()));
        }
        fields
    }
}

// ============================================================================
// Influencers and products
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InfluencerStats {
    #[serde(default)]
    pub followers: i64,
    #[serde(default)]
    pub free_courses: i64,
    #[serde(default)]
    pub paid_courses: i64,
    /// Any other counters (rating, reviews, students...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InfluencerStats {
    pub fn total_courses(&self) -> i64 {
        self.free_courses + self.paid_courses
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Influencer {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub username: String,
    pub instagram: String,
    pub avatar: String,
    pub bio: String,
    pub description: String,
    pub tags: Vec<String>,
    pub stats: InfluencerStats,
}

impl HashRecord for Influencer {
    fn from_hash(hash: &HashMap<String, String>) -> Self {
        let slug = text(hash, "slug");
        Self {
            id: opt_text(hash, "id").unwrap_or_else(|| slug.clone()),
            slug,
            name: text(hash, "name"),
            username: text(hash, "username"),
            instagram: text(hash, "instagram"),
            avatar: text(hash, "avatar"),
            bio: text(hash, "bio"),
            description: text(hash, "description"),
            tags: json_or_default(hash, "tags"),
            stats: json_or_default(hash, "stats"),
        }
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("slug", self.slug.clone()),
            ("name", self.name.clone()),
            ("username", self.username.clone()),
            ("instagram", self.instagram.clone()),
            ("avatar", self.avatar.clone()),
            ("bio", self.bio.clone()),
            ("description", self.description.clone()),
            ("tags", serde_json::to_string(&self.tags).unwrap_or_else(|_| "[]".to_string())),
            ("stats", serde_json::to_string(&self.stats).unwrap_or_else(|_| "{}".to_string())),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub influencer_slug: String,
    pub title: String,
    pub price: i64,
    /// beginner | intermediate | advanced
    pub level: String,
    pub thumbnail: String,
    pub summary: String,
    pub description: Option<String>,
    pub created_at: i64,
}

impl HashRecord for Product {
    fn from_hash(hash: &HashMap<String, String>) -> Self {
        Self {
            id: text(hash, "id"),
            influencer_slug: text(hash, "influencerSlug"),
            title: text(hash, "title"),
            price: number(hash, "price"),
            level: text(hash, "level"),
            thumbnail: text(hash, "thumbnail"),
            summary: text(hash, "summary"),
            description: opt_text(hash, "description"),
            created_at: number(hash, "createdAt"),
        }
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("id", self.id.clone()),
            ("influencerSlug", self.influencer_slug.clone()),
            ("title", self.title.clone()),
            ("price", self.price.to_string()),
            ("level", self.level.clone()),
            ("thumbnail", self.thumbnail.clone()),
            ("summary", self.summary.clone()),
            ("createdAt", self.created_at.to_string()),
        ];
        if let Some(description) = &self.description {
            fields.push(("description", description.clone()));
        }
        fields
    }
}

// ============================================================================
// Community
// ============================================================================

pub const COMMUNITY_TYPES: &[&str] = &[
    "elementary",
    "middle",
    "high",
    "elementary-parent",
    "middle-parent",
    "high-parent",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostStats {
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub comments: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub community_type: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub created_at: i64,
    pub stats: PostStats,
}

impl HashRecord for Post {
    fn from_hash(hash: &HashMap<String, String>) -> Self {
        Self {
            id: text(hash, "id"),
            author_id: text(hash, "authorId"),
            community_type: text(hash, "communityType"),
            title: text(hash, "title"),
            body: text(hash, "body"),
            tags: json_or_default(hash, "tags"),
            created_at: number(hash, "createdAt"),
            stats: json_or_default(hash, "stats"),
        }
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("authorId", self.author_id.clone()),
            ("communityType", self.community_type.clone()),
            ("title", self.title.clone()),
            ("body", self.body.clone()),
            ("tags", serde_json::to_string(&self.tags).unwrap_or_else(|_| "[]".to_string())),
            ("createdAt", self.created_at.to_string()),
            ("stats", serde_json::to_string(&self.stats).unwrap_or_else(|_| "{}".to_string())),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: i64,
}

impl HashRecord for Comment {
    fn from_hash(hash: &HashMap<String, String>) -> Self {
        Self {
            id: text(hash, "id"),
            post_id: text(hash, "postId"),
            author_id: text(hash, "authorId"),
            body: text(hash, "body"),
            created_at: number(hash, "createdAt"),
        }
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("postId", self.post_id.clone()),
            ("authorId", self.author_id.clone()),
            ("body", self.body.clone()),
            ("createdAt", self.created_at.to_string()),
        ]
    }
}

// ============================================================================
// Purchases
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub product_id: String,
    pub influencer_slug: String,
    pub purchased_at: String,
    pub status: String,
    pub expires_at: String,
}

impl HashRecord for Purchase {
    fn from_hash(hash: &HashMap<String, String>) -> Self {
        Self {
            product_id: text(hash, "productId"),
            influencer_slug: text(hash, "influencerSlug"),
            purchased_at: text(hash, "purchasedAt"),
            status: text(hash, "status"),
            expires_at: text(hash, "expiresAt"),
        }
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("productId", self.product_id.clone()),
            ("influencerSlug", self.influencer_slug.clone()),
            ("purchasedAt", self.purchased_at.clone()),
            ("status", self.status.clone()),
            ("expiresAt", self.expires_at.clone()),
        ]
    }
}

// ============================================================================
// Study decks
// ============================================================================

/// A vocabulary card in a tutor's spaced-repetition deck
///
/// Times are epoch milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudyWord {
    pub id: String,
    pub word: String,
    pub meaning: String,
    pub example: String,
    pub translation: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub created_at: i64,
    pub next_review_date: i64,
    /// Days until the next review
    pub interval: i64,
    pub easiness_factor: f64,
    pub correct_count: i64,
    pub incorrect_count: i64,
    pub last_reviewed: Option<i64>,
}

impl HashRecord for StudyWord {
    fn from_hash(hash: &HashMap<String, String>) -> Self {
        Self {
            id: text(hash, "id"),
            word: text(hash, "word"),
            meaning: text(hash, "meaning"),
            example: text(hash, "example"),
            translation: text(hash, "translation"),
            category: text(hash, "category"),
            subcategory: opt_text(hash, "subcategory"),
            pronunciation: opt_text(hash, "pronunciation"),
            difficulty: opt_text(hash, "difficulty"),
            level: opt_text(hash, "level"),
            created_at: number(hash, "createdAt"),
            next_review_date: number(hash, "nextReviewDate"),
            interval: number(hash, "interval"),
            easiness_factor: hash
                .get("easinessFactor")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(2.5),
            correct_count: number(hash, "correctCount"),
            incorrect_count: number(hash, "incorrectCount"),
            last_reviewed: opt_text(hash, "lastReviewed").map(|_| number(hash, "lastReviewed")),
        }
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("id", self.id.clone()),
            ("word", self.word.clone()),
            ("meaning", self.meaning.clone()),
            ("example", self.example.clone()),
            ("translation", self.translation.clone()),
            ("category", self.category.clone()),
            ("createdAt", self.created_at.to_string()),
            ("nextReviewDate", self.next_review_date.to_string()),
            ("interval", self.interval.to_string()),
            ("easinessFactor", self.easiness_factor.to_string()),
            ("correctCount", self.correct_count.to_string()),
            ("incorrectCount", self.incorrect_count.to_string()),
        ];
        let optional = [
            ("subcategory", &self.subcategory),
            ("pronunciation", &self.pronunciation),
            ("difficulty", &self.difficulty),
            ("level", &self.level),
        ];
        for (field, value) in optional {
            if let Some(value) = value {
                fields.push((field, value.clone()));
            }
        }
        if let Some(reviewed) = self.last_reviewed {
            fields.push(("lastReviewed", reviewed.to_string()));
        }
        fields
    }
}
