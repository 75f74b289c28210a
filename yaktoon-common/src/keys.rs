//! Redis key layout
//!
//! One function per key family. Handlers never format keys inline.

// Users and auth

pub fn user(user_id: &str) -> String {
    format!("user:{}", user_id)
}

/// Email → internal user id
pub fn user_by_email(email: &str) -> String {
    format!("user:email:{}", email)
}

/// Login name → internal user id
pub fn user_by_login(login: &str) -> String {
    format!("user:userId:{}", login)
}

pub fn user_purchases(user_id: &str) -> String {
    format!("user:{}:purchases", user_id)
}

pub fn user_purchase(user_id: &str, product_id: &str) -> String {
    format!("user:{}:purchase:{}", user_id, product_id)
}

pub fn auth_session(token: &str) -> String {
    format!("auth:session:{}", token)
}

// Catalog

pub const INFLUENCERS: &str = "influencers";
pub const INFLUENCERS_TRENDING: &str = "influencers:trending";

pub fn influencer(slug: &str) -> String {
    format!("influencer:{}", slug)
}

pub fn influencer_products(slug: &str) -> String {
    format!("influencer:{}:products", slug)
}

pub fn product(product_id: &str) -> String {
    format!("product:{}", product_id)
}

pub fn product_customers(product_id: &str) -> String {
    format!("product:{}:customers", product_id)
}

pub fn influencer_product_customers(slug: &str, product_id: &str) -> String {
    format!("influencer:{}:product:{}:customers", slug, product_id)
}

pub fn influencer_all_customers(slug: &str) -> String {
    format!("influencer:{}:all-customers", slug)
}

// Community

pub const COMMUNITY_POSTS: &str = "community:posts";

pub fn post(post_id: &str) -> String {
    format!("post:{}", post_id)
}

pub fn post_comments(post_id: &str) -> String {
    format!("post:{}:comments", post_id)
}

pub fn comment(comment_id: &str) -> String {
    format!("comment:{}", comment_id)
}

// Influencer messaging

pub fn conversation(slug: &str, user_id: &str) -> String {
    format!("influencer:{}:user:{}:conversation", slug, user_id)
}

pub fn user_message_ids(slug: &str, user_id: &str) -> String {
    format!("influencer:{}:user:{}:messages", slug, user_id)
}

pub fn message(slug: &str, message_id: &str) -> String {
    format!("influencer:{}:message:{}", slug, message_id)
}

pub fn message_response(slug: &str, message_id: &str) -> String {
    format!("influencer:{}:message:{}:response", slug, message_id)
}

pub fn message_draft(slug: &str, message_id: &str) -> String {
    format!("influencer:{}:message:{}:draft", slug, message_id)
}

pub fn pending_messages(slug: &str) -> String {
    format!("influencer:{}:pending_messages", slug)
}

pub fn responded_messages(slug: &str) -> String {
    format!("influencer:{}:responded_messages", slug)
}

pub fn message_stats(slug: &str) -> String {
    format!("influencer:{}:message_stats", slug)
}

pub fn review_request(slug: &str, request_id: &str) -> String {
    format!("influencer:{}:review_request:{}", slug, request_id)
}

pub fn review_requests(slug: &str) -> String {
    format!("influencer:{}:review_requests", slug)
}

pub fn notifications(slug: &str) -> String {
    format!("influencer:{}:notifications", slug)
}

// Student record analysis

pub fn analysis_data(slug: &str, session_id: &str) -> String {
    format!("{}:analysis_data:{}", slug, session_id)
}

pub fn analysis_data_pattern(slug: &str) -> String {
    format!("{}:analysis_data:*", slug)
}

/// Influencer namespace used for analyses stored automatically on completion
pub const ADMIN_NAMESPACE: &str = "yaktoon";

pub const ANALYSIS_SESSIONS: &str = "yaktoon:analysis_sessions";

pub fn analysis_metadata(session_id: &str) -> String {
    format!("analysis:{}:metadata", session_id)
}

pub fn medsky_session(session_id: &str) -> String {
    format!("medsky:session:{}", session_id)
}

pub const MEDSKY_SESSION_PATTERN: &str = "medsky:session:*";

pub fn profile(slug: &str, session_id: &str) -> String {
    format!("{}:profile:{}", slug, session_id)
}

// Saved consultant chats (dashboard)

pub fn student_chat(slug: &str, session_id: &str, chat_id: &str) -> String {
    format!("{}:student_chat:{}:{}", slug, session_id, chat_id)
}

pub fn student_chats(slug: &str, session_id: &str) -> String {
    format!("{}:student_chats:{}", slug, session_id)
}

pub fn chat_metadata(slug: &str, chat_id: &str) -> String {
    format!("{}:chat_metadata:{}", slug, chat_id)
}

// Record consultant chat sessions

pub fn chat_session(slug: &str, analysis_session_id: &str) -> String {
    format!("chat:{}:{}", slug, analysis_session_id)
}

pub fn chat_messages(chat_session_id: &str) -> String {
    format!("chat:messages:{}", chat_session_id)
}

pub fn chat_sessions(slug: &str) -> String {
    format!("chats:{}", slug)
}

/// Chat session id → the `chat:{slug}:{analysis}` hash key
pub fn chat_lookup(chat_session_id: &str) -> String {
    format!("chat:lookup:{}", chat_session_id)
}

// English tutor decks. Christine keys carry a prefix; terry's are the bare `vocab:` family.

pub fn christine_word(user_id: &str, word_id: &str) -> String {
    format!("christine:vocab:{}:word:{}", user_id, word_id)
}

pub fn christine_words(user_id: &str) -> String {
    format!("christine:vocab:{}:all", user_id)
}

pub fn christine_category(user_id: &str, category: &str) -> String {
    format!("christine:vocab:{}:category:{}", user_id, category)
}

pub fn christine_studied(user_id: &str, day: &str) -> String {
    format!("christine:vocab:{}:studied:{}", user_id, day)
}

pub fn christine_roleplay(session_id: &str) -> String {
    format!("christine:roleplay:{}", session_id)
}

pub fn christine_core_phrase(user_id: &str, month: &str, week: &str) -> String {
    format!("christine:core_phrase:{}:{}:{}", user_id, month, week)
}

pub fn terry_word(user_id: &str, word_id: &str) -> String {
    format!("vocab:{}:word:{}", user_id, word_id)
}

pub fn terry_words(user_id: &str) -> String {
    format!("vocab:{}:all", user_id)
}

pub fn terry_daily(user_id: &str, day: &str) -> String {
    format!("vocab:{}:daily:{}", user_id, day)
}

pub fn terry_studied(user_id: &str, day: &str) -> String {
    format!("vocab:{}:studied:{}", user_id, day)
}

pub fn terry_pdf_status(session_id: &str) -> String {
    format!("terry:session:{}:status", session_id)
}

pub fn terry_pdf_quiz(session_id: &str) -> String {
    format!("terry:session:{}:quiz", session_id)
}

// Assessments

pub fn career_activities(user_id: &str) -> String {
    format!("career-activities:{}", user_id)
}

pub fn college_adaptation(user_id: &str) -> String {
    format!("college-adaptation:{}", user_id)
}

/// Key patterns removed by a seed rollback
pub const SEED_PATTERNS: &[&str] = &[
    "influencer:*",
    INFLUENCERS,
    INFLUENCERS_TRENDING,
    "product:*",
    "post:*",
    COMMUNITY_POSTS,
];
