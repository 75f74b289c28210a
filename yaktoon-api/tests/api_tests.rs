//! Integration tests for yaktoon-api endpoints
//!
//! The router runs over a MemoryStore with scripted stand-ins for the language
//! model and the PDF parser, so nothing here needs Redis or network access.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use yaktoon_api::{auth, build_router, AppState};
use yaktoon_common::config::AppConfig;
use yaktoon_common::events::EventBus;
use yaktoon_common::models::{HashRecord, Influencer, InfluencerStats, Product, User, UserType};
use yaktoon_common::{keys, MemoryStore, Store};
use yaktoon_medsky::llm::{ChatModel, ChatRequest, LlmError};
use yaktoon_medsky::pdf::{PdfParser, UploadedFile};
use yaktoon_medsky::types::{ProcessingStage, ProcessingStatus};
use yaktoon_medsky::{MedskyError, MedskyService};

// ============================================================================
// Test doubles
// ============================================================================

/// Answers every completion with the same text, or fails when `reply` is None
struct ScriptedModel {
    reply: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.reply.clone().ok_or(LlmError::NotConfigured)
    }
}

struct FakeParser;

#[async_trait]
impl PdfParser for FakeParser {
    async fn parse(&self, _file: &UploadedFile) -> Result<String, MedskyError> {
        Ok("1. 인적·학적사항\n홍길동\n2. 출결상황\n결석 없음".to_string())
    }
}

const RECORD: &str = "학교생활기록부\n\
    6. 창의적 체험활동상황\n자율활동 12 학급 회장으로 활동함.\n\
    7. 교과학습발달상황\n국어 4 92/75.3(10.2) A 2\n\
    세부능력 및 특기사항\n국어: 토론 수업에서 논리적으로 발표함.\n\
    8. 독서활동상황\n데미안\n\
    9. 행동특성 및 종합의견\n성실함.";

/// Returns a student record that passes the record check
struct RecordParser;

#[async_trait]
impl PdfParser for RecordParser {
    async fn parse(&self, _file: &UploadedFile) -> Result<String, MedskyError> {
        Ok(RECORD.to_string())
    }
}

const ENGLISH_HANDOUT: &str = "Reading every day builds a strong vocabulary over time.\n\
    Students who practice speaking gain confidence in class.\n\
    Good habits make learning a new language much easier.";

/// Returns a short English handout
struct EnglishParser;

#[async_trait]
impl PdfParser for EnglishParser {
    async fn parse(&self, _file: &UploadedFile) -> Result<String, MedskyError> {
        Ok(ENGLISH_HANDOUT.to_string())
    }
}

/// Answers each structured extraction with a small valid payload
struct RecordModel;

#[async_trait]
impl ChatModel for RecordModel {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        let reply = match request.schema_name() {
            Some("creative_activities") => {
                json!({"창의적체험활동상황": [{"영역": "자율활동", "시간": 12, "특기사항": "회장"}]})
            }
            Some("academic_developments") => json!({"교과학습발달상황": []}),
            Some("detailed_abilities") => json!({"세부특기사항": [{"과목": "국어", "특기사항": "발표함"}]}),
            Some("validation_result") => json!({"type": "blue_line", "Feedbacks": [
                {"sentence": "학급 회장으로 활동함.", "feedback": "리더십"}
            ]}),
            _ => json!({}),
        };
        Ok(reply.to_string())
    }
}

struct TestApp {
    router: Router,
    store: Arc<dyn Store>,
    model: Arc<ScriptedModel>,
    medsky: Arc<MedskyService>,
}

/// Test helper: assemble the app from its parts
fn build_app(
    model: ScriptedModel,
    parser: Arc<dyn PdfParser>,
    analysis_model: Option<Arc<dyn ChatModel>>,
    credential_errors: Vec<String>,
    config: AppConfig,
) -> TestApp {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let model = Arc::new(model);
    let analysis_model: Arc<dyn ChatModel> = match analysis_model {
        Some(analysis_model) => analysis_model,
        None => model.clone(),
    };
    let events = EventBus::new(64);
    let medsky = Arc::new(
        MedskyService::new(store.clone(), parser, analysis_model, events.clone())
            .with_credential_errors(credential_errors),
    );
    let state = AppState::new(
        store.clone(),
        medsky.clone(),
        model.clone(),
        events,
        config,
    );
    TestApp {
        router: build_router(state),
        store,
        model,
        medsky,
    }
}

/// Test helper: build the app with the given model and credential problems
fn create_app_with(model: ScriptedModel, credential_errors: Vec<String>) -> TestApp {
    build_app(model, Arc::new(FakeParser), None, credential_errors, AppConfig::default())
}

/// Test helper: an app whose uploads run the whole analysis to completion
fn create_record_app() -> TestApp {
    build_app(
        ScriptedModel::replying("AI 답변입니다"),
        Arc::new(RecordParser),
        Some(Arc::new(RecordModel)),
        Vec::new(),
        AppConfig::default(),
    )
}

fn create_test_app() -> TestApp {
    create_app_with(ScriptedModel::replying("AI 답변입니다"), Vec::new())
}

/// Test helper: send a request, optionally with a bearer token and JSON body
async fn test_request(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

async fn extract_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    }
}

/// Test helper: store a user hash and issue a token for it
async fn login_as(app: &TestApp, user: User) -> String {
    app.store
        .hset(&keys::user(&user.id), &user.to_fields())
        .await
        .unwrap();
    auth::issue_token(app.store.as_ref(), &user.id, 3600)
        .await
        .unwrap()
}

async fn student_token(app: &TestApp) -> String {
    login_as(
        app,
        User {
            id: "student-1".to_string(),
            name: "김학생".to_string(),
            email: "student@example.com".to_string(),
            ..Default::default()
        },
    )
    .await
}

async fn admin_token(app: &TestApp) -> String {
    login_as(
        app,
        User {
            id: "admin-1".to_string(),
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            user_id: "admin".to_string(),
            role: Some("admin".to_string()),
            ..Default::default()
        },
    )
    .await
}

async fn influencer_token(app: &TestApp, slug: &str) -> String {
    login_as(
        app,
        User {
            id: format!("inf-{}", slug),
            name: slug.to_string(),
            email: format!("{}@example.com", slug),
            user_id: slug.to_string(),
            user_type: Some(UserType::Influencer),
            influencer_slug: Some(slug.to_string()),
            ..Default::default()
        },
    )
    .await
}

async fn seed_catalog(app: &TestApp) {
    let store = app.store.as_ref();
    for (slug, name, followers) in [("mentor-kim", "김멘토", 120_000), ("mentor-lee", "이멘토", 5_000)] {
        let influencer = Influencer {
            id: slug.to_string(),
            slug: slug.to_string(),
            name: name.to_string(),
            username: format!("@{}", slug),
            bio: format!("{} 입시 컨설팅", name),
            tags: vec!["입시".to_string()],
            stats: InfluencerStats {
                followers,
                ..Default::default()
            },
            ..Default::default()
        };
        store
            .hset(&keys::influencer(slug), &influencer.to_fields())
            .await
            .unwrap();
        store.sadd(keys::INFLUENCERS, slug).await.unwrap();
    }

    let product = Product {
        id: "prod-1".to_string(),
        influencer_slug: "mentor-kim".to_string(),
        title: "수시 전략 강의".to_string(),
        price: 99_000,
        level: "intermediate".to_string(),
        created_at: 1_700_000_000_000,
        ..Default::default()
    };
    store
        .hset(&keys::product(&product.id), &product.to_fields())
        .await
        .unwrap();
    store
        .sadd(&keys::influencer_products("mentor-kim"), &product.id)
        .await
        .unwrap();
}

// ============================================================================
// Health and auth
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();
    let (status, json) = test_request(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "yaktoon-api");
    assert_eq!(json["redis"], "ok");
}

#[tokio::test]
async fn test_register_login_me_logout() {
    let app = create_test_app();

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "name": "박학생", "email": "park@example.com", "password": "secret12" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(json["userId"].is_string());

    let (status, _) = test_request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "name": "박학생", "email": "park@example.com", "password": "secret12" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = test_request(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "park@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "park@example.com", "password": "secret12" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["user"].get("passwordHash").is_none());
    let token = json["token"].as_str().unwrap().to_string();

    let (status, json) = test_request(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["email"], "park@example.com");

    let (status, _) = test_request(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = test_request(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = create_test_app();
    let (status, json) = test_request(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "name": "a", "email": "a@example.com", "password": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

// ============================================================================
// Community posts
// ============================================================================

#[tokio::test]
async fn test_post_lifecycle() {
    let app = create_test_app();
    let token = student_token(&app).await;

    let (status, _) = test_request(
        &app,
        "POST",
        "/api/posts",
        None,
        Some(json!({ "title": "t", "body": "b" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = test_request(
        &app,
        "POST",
        "/api/posts",
        Some(&token),
        Some(json!({ "title": "수학 공부법", "body": "질문 있어요", "tags": ["수학"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let post_id = created["id"].as_str().unwrap().to_string();

    let (status, _) = test_request(
        &app,
        "POST",
        &format!("/api/posts/{}/comments", post_id),
        Some(&token),
        Some(json!({ "body": "좋은 질문이네요" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, detail) =
        test_request(&app, "GET", &format!("/api/posts/{}", post_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["post"]["communityType"], "high");
    assert_eq!(detail["post"]["stats"]["comments"], 1);
    assert_eq!(detail["post"]["stats"]["views"], 1);
    assert_eq!(detail["comments"][0]["body"], "좋은 질문이네요");

    let (status, page) = test_request(&app, "GET", "/api/posts?communityType=high", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], post_id.as_str());
}

#[tokio::test]
async fn test_post_unknown_community_rejected() {
    let app = create_test_app();
    let token = student_token(&app).await;
    let (status, _) = test_request(
        &app,
        "POST",
        "/api/posts",
        Some(&token),
        Some(json!({ "title": "t", "body": "b", "communityType": "space" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = test_request(&app, "GET", "/api/posts/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_influencer_listing_and_detail() {
    let app = create_test_app();
    seed_catalog(&app).await;

    let (status, page) = test_request(&app, "GET", "/api/influencers?sort=popular", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"][0]["slug"], "mentor-kim");

    let (status, page) = test_request(&app, "GET", "/api/influencers?q=%EC%9D%B4", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["slug"], "mentor-lee");

    let (status, detail) = test_request(&app, "GET", "/api/influencers/mentor-kim", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["products"][0]["title"], "수시 전략 강의");

    let (status, _) = test_request(&app, "GET", "/api/influencers/nobody", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_influencer_product_lookup() {
    let app = create_test_app();
    seed_catalog(&app).await;

    let (status, json) = test_request(
        &app,
        "GET",
        "/api/influencers/mentor-kim/products/prod-1",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["product"]["price"], 99_000);

    let (status, json) = test_request(
        &app,
        "GET",
        "/api/influencers/mentor-lee/products/prod-1",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Product not found for this influencer");

    let (status, json) = test_request(&app, "GET", "/api/influencer/mentor-kim/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["products"][0]["productId"], "prod-1");

    let (status, _) = test_request(&app, "POST", "/api/products/prod-1/purchase", None, None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

// ============================================================================
// Purchases
// ============================================================================

#[tokio::test]
async fn test_purchase_tracking_and_access() {
    let app = create_test_app();
    seed_catalog(&app).await;
    let token = student_token(&app).await;

    let (status, _) = test_request(&app, "GET", "/api/influencer/mentor-kim/check-access", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/purchases/track",
        Some(&token),
        Some(json!({ "productId": "prod-1", "influencerSlug": "mentor-kim" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["purchase"]["status"], "active");

    let (status, _) = test_request(
        &app,
        "POST",
        "/api/purchases/track",
        Some(&token),
        Some(json!({ "productId": "prod-1", "influencerSlug": "mentor-kim" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = test_request(&app, "GET", "/api/purchases/track", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["purchases"].as_array().unwrap().len(), 1);

    let (status, json) = test_request(&app, "GET", "/api/influencer/mentor-kim/check-access", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hasAccess"], true);
    assert_eq!(json["products"][0]["productId"], "prod-1");

    let (status, json) = test_request(&app, "GET", "/api/user/my-influencers", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.to_string().contains("mentor-kim"));
}

#[tokio::test]
async fn test_purchase_unknown_product() {
    let app = create_test_app();
    let token = student_token(&app).await;
    let (status, _) = test_request(
        &app,
        "POST",
        "/api/purchases/track",
        Some(&token),
        Some(json!({ "productId": "nope", "influencerSlug": "mentor-kim" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Messaging and dashboard
// ============================================================================

#[tokio::test]
async fn test_message_review_and_response_flow() {
    let app = create_test_app();
    let student = student_token(&app).await;
    let influencer = influencer_token(&app, "mentor-kim").await;

    let (status, sent) = test_request(
        &app,
        "POST",
        "/api/influencer/mentor-kim/send-message",
        Some(&student),
        Some(json!({ "message": "내신 관리 어떻게 하나요?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["aiResponse"], "AI 답변입니다");
    let ai_message_id = sent["aiMessageId"].as_str().unwrap().to_string();

    let (status, json) = test_request(&app, "GET", "/api/influencer/mentor-kim/messages", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "customer");
    assert_eq!(messages[1]["role"], "ai");

    let (status, review) = test_request(
        &app,
        "POST",
        "/api/influencer/mentor-kim/request-review",
        Some(&student),
        Some(json!({
            "aiMessageId": ai_message_id,
            "originalMessage": "내신 관리 어떻게 하나요?",
            "aiResponse": "AI 답변입니다",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let review_id = review["reviewRequestId"].as_str().unwrap().to_string();

    // Students cannot read another influencer's dashboard
    let (status, _) = test_request(&app, "GET", "/api/dashboard/mentor-kim/review-requests", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = test_request(&app, "GET", "/api/dashboard/mentor-kim/review-requests", Some(&influencer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reviewRequests"][0]["id"], review_id.as_str());

    let (status, _) = test_request(
        &app,
        "POST",
        "/api/dashboard/mentor-kim/send-response",
        Some(&influencer),
        Some(json!({
            "reviewRequestId": review_id,
            "response": "직접 답변드립니다",
            "isReviewResponse": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = test_request(&app, "GET", "/api/dashboard/mentor-kim/review-requests", Some(&influencer), None).await;
    assert!(json["reviewRequests"].as_array().unwrap().is_empty());

    let (_, json) = test_request(&app, "GET", "/api/influencer/mentor-kim/messages", Some(&student), None).await;
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["reviewRequested"], true);
    assert_eq!(messages[2]["role"], "influencer");
    assert_eq!(messages[2]["content"], "직접 답변드립니다");
}

#[tokio::test]
async fn test_review_response_without_student_is_rejected() {
    let app = create_test_app();
    let influencer = influencer_token(&app, "mentor-kim").await;
    app.store
        .hset(
            &keys::review_request("mentor-kim", "review-1"),
            &[("id", "review-1".to_string()), ("userId", String::new())],
        )
        .await
        .unwrap();

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/dashboard/mentor-kim/send-response",
        Some(&influencer),
        Some(json!({
            "reviewRequestId": "review-1",
            "response": "직접 답변드립니다",
            "isReviewResponse": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Review request has no student");
    assert!(!app
        .store
        .exists(&keys::conversation("mentor-kim", ""))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_send_message_falls_back_when_model_fails() {
    let app = create_app_with(ScriptedModel::failing(), Vec::new());
    let student = student_token(&app).await;

    let (status, sent) = test_request(
        &app,
        "POST",
        "/api/influencer/mentor-kim/send-message",
        Some(&student),
        Some(json!({ "message": "안녕하세요" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(sent["aiResponse"].as_str().unwrap().contains("김학생님"));
}

#[tokio::test]
async fn test_dashboard_analysis_results_and_profile() {
    let app = create_test_app();
    let influencer = influencer_token(&app, "mentor-kim").await;
    app.store
        .set_json(
            &keys::analysis_data("mentor-kim", "medsky_1700000000000_abc"),
            &json!({
                "userInfo": { "id": "student-1", "name": "김학생" },
                "result": { "extractedData": { "careerAspirations": "의사" } },
                "completedAt": "2024-01-01T00:00:00.000Z",
            }),
        )
        .await
        .unwrap();

    let (status, json) = test_request(&app, "GET", "/api/dashboard/mentor-kim/analysis-results", Some(&influencer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.to_string().contains("김학생"));

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/dashboard/mentor-kim/generate-profile",
        Some(&influencer),
        Some(json!({ "sessionId": "medsky_1700000000000_abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.to_string().contains("AI 답변입니다"));
}

#[tokio::test]
async fn test_saved_student_chats() {
    let app = create_test_app();
    let influencer = influencer_token(&app, "mentor-kim").await;

    let (status, _) = test_request(
        &app,
        "POST",
        "/api/dashboard/mentor-kim/chat/save",
        Some(&influencer),
        Some(json!({
            "sessionId": "medsky_1_a",
            "chatId": "chat-1",
            "studentName": "김학생",
            "messages": [{ "role": "user", "content": "진로 상담" }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = test_request(
        &app,
        "GET",
        "/api/dashboard/mentor-kim/chat/list?sessionId=medsky_1_a",
        Some(&influencer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["chats"][0]["title"], "진로 상담");

    let (status, json) = test_request(
        &app,
        "GET",
        "/api/dashboard/mentor-kim/chat/chat-1?sessionId=medsky_1_a",
        Some(&influencer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["metadata"]["messageCount"], 1);

    let (status, _) = test_request(
        &app,
        "GET",
        "/api/dashboard/mentor-kim/chat/list",
        Some(&influencer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// AI chat and tools
// ============================================================================

#[tokio::test]
async fn test_chat_session_round_trip() {
    let app = create_test_app();
    let token = student_token(&app).await;

    let (status, init) = test_request(
        &app,
        "POST",
        "/api/chat/initialize",
        Some(&token),
        Some(json!({ "analysisSessionId": "medsky_1_a", "influencerSlug": "mentor-kim" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let chat_id = init["chatSessionId"].as_str().unwrap().to_string();

    let (_, again) = test_request(
        &app,
        "POST",
        "/api/chat/initialize",
        Some(&token),
        Some(json!({ "analysisSessionId": "medsky_1_a", "influencerSlug": "mentor-kim" })),
    )
    .await;
    assert_eq!(again["chatSessionId"], chat_id.as_str());

    let (status, reply) = test_request(
        &app,
        "POST",
        "/api/chat/message",
        Some(&token),
        Some(json!({ "chatSessionId": chat_id, "message": "강점이 뭔가요?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"], "AI 답변입니다");

    // system prompt plus the single user message
    let requests = app.model.requests.lock().unwrap();
    let last = requests.last().unwrap();
    assert_eq!(last.messages.len(), 2);
    assert_eq!(last.messages[1].content, "강점이 뭔가요?");
    drop(requests);

    let (status, _) = test_request(
        &app,
        "POST",
        "/api/chat/message",
        Some(&token),
        Some(json!({ "chatSessionId": "unknown", "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_study_tools() {
    let app = create_test_app();

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/tools/study-plan",
        None,
        Some(json!({ "message": "고2 수학 계획", "history": [{ "role": "ai", "content": "안녕하세요" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["response"], "AI 답변입니다");

    let (status, json) = test_request(&app, "POST", "/api/tools/study-type", None, Some(json!({ "message": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "메시지가 필요합니다.");
}

#[tokio::test]
async fn test_tools_report_model_failure() {
    let app = create_app_with(ScriptedModel::failing(), Vec::new());
    let (status, _) = test_request(
        &app,
        "POST",
        "/api/tools/course-recommendation",
        None,
        Some(json!({ "message": "수학 강의 추천" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// ============================================================================
// Medsky
// ============================================================================

fn multipart_request(uri: &str, token: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "yaktoon-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"record.pdf\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(
        format!(
            "\r\n--{boundary}\r\nContent-Disposition: form-data; name=\"productId\"\r\n\r\nprod-1\r\n--{boundary}--\r\n"
        )
        .as_bytes(),
    );

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap()
}

fn fake_pdf() -> Vec<u8> {
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(4096, b' ');
    bytes
}

#[tokio::test]
async fn test_medsky_upload_creates_session() {
    let app = create_test_app();
    let token = student_token(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/api/medsky/process", &token, "application/pdf", &fake_pdf()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["success"], true);
    assert!(json["result"].is_null());
    let session_id = json["sessionId"].as_str().unwrap().to_string();
    assert!(session_id.starts_with("medsky_"));

    let status_uri = format!("/api/medsky/status?sessionId={}", session_id);
    let (status, json) = test_request(&app, "GET", &status_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["status"]["stage"].is_string());

    let (status, json) = test_request(&app, "GET", &status_uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

/// Test helper: poll the status endpoint until the session finishes
async fn wait_for_terminal(app: &TestApp, token: &str, session_id: &str) -> Value {
    let uri = format!("/api/medsky/status?sessionId={}", session_id);
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (_, json) = test_request(app, "GET", &uri, Some(token), None).await;
            let stage = json["status"]["stage"].as_str().unwrap_or_default().to_string();
            if stage == "completed" || stage == "error" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("analysis did not finish")
}

/// Test helper: read an SSE response to its end, failing if it never closes
async fn read_event_stream(app: &TestApp, token: &str, session_id: &str) -> String {
    let request = Request::builder()
        .uri(format!("/api/medsky/events?sessionId={}", session_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = tokio::time::timeout(Duration::from_secs(5), response.into_body().collect())
        .await
        .expect("event stream did not close")
        .unwrap()
        .to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_medsky_completed_analysis_flow() {
    let app = create_record_app();
    let token = student_token(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/api/medsky/process", &token, "application/pdf", &fake_pdf()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response.into_body()).await;
    let session_id = json["sessionId"].as_str().unwrap().to_string();

    let json = wait_for_terminal(&app, &token, &session_id).await;
    assert_eq!(json["status"]["stage"], "completed");
    assert_eq!(json["status"]["progress"], 100);

    let (status, json) = test_request(
        &app,
        "GET",
        &format!("/api/medsky/process?sessionId={}", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"]["status"]["stage"], "completed");
    assert_eq!(
        json["result"]["extractedData"]["creativeActivities"][0]["영역"],
        "자율활동"
    );
    assert!(json["result"]["validationAnalysis"].is_object());

    let (status, json) = test_request(
        &app,
        "GET",
        &format!("/api/medsky/statistics?sessionId={}", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["statistics"]["totalActivities"], 1);
    assert_eq!(json["statistics"]["totalActivityHours"], 12.0);
    assert!(json["activities"].is_array());
    assert!(json["abilities"].is_array());

    // A finished session replays its final status and closes
    let body = read_event_stream(&app, &token, &session_id).await;
    assert!(body.contains("event: ConnectionStatus"));
    assert!(body.contains("event: MedskyStatusChanged"));
    assert!(body.contains("\"stage\":\"completed\""));
}

#[tokio::test]
async fn test_medsky_statistics_conflict_while_incomplete() {
    let app = create_test_app();
    let token = student_token(&app).await;
    let session_id = app.medsky.create_session().await;

    let (status, json) = test_request(
        &app,
        "GET",
        &format!("/api/medsky/statistics?sessionId={}", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Analysis is not complete");
}

#[tokio::test]
async fn test_medsky_events_follow_session_until_terminal() {
    let app = create_test_app();
    let token = student_token(&app).await;
    let session_id = app.medsky.create_session().await;

    let medsky = app.medsky.clone();
    let id = session_id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        medsky
            .update_status(&id, ProcessingStatus::new(ProcessingStage::Parsing, 10, "PDF 파일 파싱 중..."))
            .await;
        medsky
            .update_status(&id, ProcessingStatus::failed("boom"))
            .await;
    });

    let body = read_event_stream(&app, &token, &session_id).await;
    let uploading = body.find("\"stage\":\"uploading\"").unwrap();
    let parsing = body.find("\"stage\":\"parsing\"").unwrap();
    let error = body.find("\"stage\":\"error\"").unwrap();
    assert!(uploading < parsing && parsing < error);

    let (status, _) = test_request(
        &app,
        "GET",
        "/api/medsky/events?sessionId=medsky_1_missing",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_medsky_upload_rejects_non_pdf() {
    let app = create_test_app();
    let token = student_token(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/api/medsky/process", &token, "text/plain", b"hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["error"], "Only PDF files are allowed");
}

#[tokio::test]
async fn test_medsky_upload_requires_configuration() {
    let app = create_app_with(
        ScriptedModel::replying("{}"),
        vec!["LLAMA_API_KEY environment variable is required".to_string()],
    );
    let token = student_token(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/api/medsky/process", &token, "application/pdf", &fake_pdf()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = extract_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().starts_with("Configuration error: "));
}

#[tokio::test]
async fn test_medsky_session_lookups() {
    let app = create_test_app();
    let token = student_token(&app).await;

    let (status, _) = test_request(&app, "GET", "/api/medsky/process", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = test_request(&app, "GET", "/api/medsky/process?sessionId=medsky_1_x", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Session not found");

    let (status, _) = test_request(&app, "GET", "/api/medsky/status?sessionId=medsky_1_x", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = test_request(&app, "GET", "/api/medsky/statistics?sessionId=medsky_1_x", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_medsky_health_reports_healthy() {
    let app = create_test_app();
    let (status, json) = test_request(&app, "GET", "/api/medsky/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["configuration"]["isValid"], true);
}

#[tokio::test]
async fn test_save_analysis_permissions() {
    let app = create_test_app();
    let student = student_token(&app).await;
    let influencer = influencer_token(&app, "mentor-kim").await;
    let body = json!({
        "influencerSlug": "mentor-kim",
        "sessionId": "medsky_1700000000000_abc",
        "analysisData": { "userInfo": { "name": "김학생" } },
    });

    let (status, _) = test_request(&app, "POST", "/api/medsky/save-analysis", Some(&student), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = test_request(&app, "POST", "/api/medsky/save-analysis", Some(&influencer), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "mentor-kim:analysis_data:medsky_1700000000000_abc");

    let stored: Option<Value> = app
        .store
        .get_json("mentor-kim:analysis_data:medsky_1700000000000_abc")
        .await
        .unwrap();
    assert_eq!(stored.unwrap()["userInfo"]["name"], "김학생");

    let (status, _) = test_request(
        &app,
        "POST",
        "/api/medsky/save-analysis",
        Some(&influencer),
        Some(json!({ "influencerSlug": "mentor-kim" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Admin analytics
// ============================================================================

#[tokio::test]
async fn test_admin_analytics_listing_and_delete() {
    let app = create_test_app();
    let admin = admin_token(&app).await;
    let student = student_token(&app).await;

    for (sid, name) in [("medsky_1700000000000_a", "첫번째"), ("medsky_1800000000000_b", "두번째")] {
        app.store
            .set_json(
                &keys::analysis_data(keys::ADMIN_NAMESPACE, sid),
                &json!({ "sessionId": sid, "userInfo": { "name": name } }),
            )
            .await
            .unwrap();
        app.store.sadd(keys::ANALYSIS_SESSIONS, sid).await.unwrap();
    }

    let (status, _) = test_request(&app, "GET", "/api/admin/medsky-analytics", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = test_request(&app, "GET", "/api/admin/medsky-analytics?limit=1", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pagination"]["total"], 2);
    assert_eq!(json["pagination"]["totalPages"], 2);
    assert_eq!(json["data"][0]["sessionId"], "medsky_1800000000000_b");

    let (status, json) = test_request(
        &app,
        "GET",
        "/api/admin/medsky-analytics?sessionId=medsky_1700000000000_a",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["userInfo"]["name"], "첫번째");

    let (status, _) = test_request(&app, "DELETE", "/api/admin/medsky-analytics", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = test_request(
        &app,
        "DELETE",
        "/api/admin/medsky-analytics?sessionId=medsky_1700000000000_a",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = test_request(
        &app,
        "GET",
        "/api/admin/medsky-analytics?sessionId=medsky_1700000000000_a",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Influencer tutors
// ============================================================================

const CHRISTINE_VOCABULARY: &str = "/api/influencers/christine/vocabulary";
const CHRISTINE_ROLEPLAY: &str = "/api/influencers/christine/roleplay";
const CHRISTINE_CORE_PHRASE: &str = "/api/influencers/christine/core-phrase";
const TERRY_VOCABULARY: &str = "/api/influencers/terry/vocabulary";
const TERRY_PDF: &str = "/api/influencers/terry/process-pdf";

#[tokio::test]
async fn test_christine_vocabulary_flow() {
    let app = create_app_with(ScriptedModel::failing(), Vec::new());
    let token = student_token(&app).await;

    let (status, json) = test_request(
        &app,
        "POST",
        CHRISTINE_VOCABULARY,
        Some(&token),
        Some(json!({
            "action": "generate_study_words",
            "userId": "student-1",
            "category": "travel",
            "count": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let words = json["words"].as_array().unwrap().clone();
    assert_eq!(words.len(), 2);
    assert_eq!(words[0]["word"], "hello");
    assert_eq!(words[0]["subcategory"], "general");
    assert_eq!(words[0]["easinessFactor"], 2.5);

    let progress_uri = format!("{}?userId=student-1&action=progress", CHRISTINE_VOCABULARY);
    let (status, json) = test_request(&app, "GET", &progress_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["progress"]["totalWords"], 2);
    assert_eq!(json["progress"]["dueCount"], 0);
    assert_eq!(json["progress"]["todayStudied"], 0);
    assert_eq!(json["progress"]["categoryProgress"]["travel"], 2);

    let (status, json) = test_request(
        &app,
        "POST",
        CHRISTINE_VOCABULARY,
        Some(&token),
        Some(json!({
            "action": "check_answer",
            "userId": "student-1",
            "wordId": words[0]["id"],
            "userAnswer": " 안녕하세요 "
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isCorrect"], true);
    assert_eq!(json["updatedWord"]["correctCount"], 1);

    let (_, json) = test_request(
        &app,
        "POST",
        CHRISTINE_VOCABULARY,
        Some(&token),
        Some(json!({
            "action": "check_answer",
            "userId": "student-1",
            "wordId": words[1]["id"],
            "userAnswer": ""
        })),
    )
    .await;
    assert_eq!(json["isCorrect"], false);
    assert_eq!(json["correctAnswer"], "감사합니다");

    let (_, json) = test_request(&app, "GET", &progress_uri, Some(&token), None).await;
    assert_eq!(json["progress"]["todayStudied"], 2);
}

#[tokio::test]
async fn test_tutor_routes_act_only_for_the_caller() {
    let app = create_test_app();
    let student = student_token(&app).await;
    let admin = admin_token(&app).await;

    let (status, _) = test_request(
        &app,
        "GET",
        &format!("{}?userId=student-1&action=progress", CHRISTINE_VOCABULARY),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = test_request(
        &app,
        "GET",
        &format!("{}?userId=someone-else&action=progress", CHRISTINE_VOCABULARY),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = test_request(
        &app,
        "GET",
        &format!("{}?action=progress", TERRY_VOCABULARY),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "사용자 ID가 필요합니다.");

    let (status, _) = test_request(
        &app,
        "GET",
        &format!("{}?userId=student-1&action=progress", TERRY_VOCABULARY),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = test_request(
        &app,
        "GET",
        &format!("{}?userId=student-1&action=dance", CHRISTINE_VOCABULARY),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "지원하지 않는 액션입니다.");
}

#[tokio::test]
async fn test_christine_roleplay_flow() {
    let app = create_app_with(ScriptedModel::failing(), Vec::new());
    let token = student_token(&app).await;
    let admin = admin_token(&app).await;

    let (status, json) = test_request(
        &app,
        "POST",
        CHRISTINE_ROLEPLAY,
        Some(&token),
        Some(json!({
            "action": "start_conversation",
            "userId": "student-1",
            "scenario": "hotel",
            "context": "Checking in at a hotel"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = json["session"]["id"].as_str().unwrap().to_string();
    assert_eq!(json["session"]["difficulty"], "intermediate");
    assert_eq!(json["session"]["messages"][0]["role"], "system");
    assert_eq!(
        json["session"]["messages"][1]["content"],
        "Hello! Let's start our role-play practice. How can I help you today?"
    );

    let (status, json) = test_request(
        &app,
        "POST",
        CHRISTINE_ROLEPLAY,
        Some(&token),
        Some(json!({
            "action": "send_message",
            "userId": "student-1",
            "sessionId": session_id,
            "message": "I want check in"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["session"]["completedTurns"], 1);
    let messages = json["session"]["messages"].as_array().unwrap().clone();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[3]["content"], "That sounds good. What would you like to say next?");

    let (status, json) = test_request(
        &app,
        "POST",
        CHRISTINE_ROLEPLAY,
        Some(&token),
        Some(json!({
            "action": "get_feedback",
            "userId": "student-1",
            "sessionId": session_id,
            "messageId": messages[2]["id"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["feedback"]["score"].as_f64(), Some(7.0));
    assert_eq!(json["session"]["messages"][2]["feedback"]["improvedVersion"], "I want check in");

    // AI messages get no feedback
    let (status, _) = test_request(
        &app,
        "POST",
        CHRISTINE_ROLEPLAY,
        Some(&token),
        Some(json!({
            "action": "get_feedback",
            "userId": "student-1",
            "sessionId": session_id,
            "messageId": messages[3]["id"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Sessions are only visible to their owner
    let (status, json) = test_request(
        &app,
        "POST",
        CHRISTINE_ROLEPLAY,
        Some(&admin),
        Some(json!({
            "action": "send_message",
            "userId": "admin-1",
            "sessionId": session_id,
            "message": "hi"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "세션을 찾을 수 없습니다.");
}

#[tokio::test]
async fn test_christine_core_phrase_results() {
    let app = create_app_with(ScriptedModel::failing(), Vec::new());
    let token = student_token(&app).await;

    let (status, json) = test_request(
        &app,
        "POST",
        CHRISTINE_CORE_PHRASE,
        Some(&token),
        Some(json!({
            "action": "generate_questions",
            "userId": "student-1",
            "month": "m1",
            "week": "w1",
            "phrases": ["I'd like to check in", "Hi there"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["questions"].as_array().unwrap().len(), 1);
    assert_eq!(json["questions"][0]["question"], "다음 빈칸에 알맞은 단어를 선택하세요: \"I'd like ____ check in\"");

    let progress_uri = format!("{}?userId=student-1&action=progress&month=m1&week=w1", CHRISTINE_CORE_PHRASE);
    let (_, json) = test_request(&app, "GET", &progress_uri, Some(&token), None).await;
    assert!(json["progress"].is_null());

    let (status, json) = test_request(
        &app,
        "POST",
        CHRISTINE_CORE_PHRASE,
        Some(&token),
        Some(json!({
            "action": "calculate_results",
            "userId": "student-1",
            "month": "m1",
            "week": "w1",
            "questions": [
                {"id": "q1", "type": "fill_blank", "answer": "like", "options": ["like", "want", "need", "wish"]},
                {"id": "q2", "type": "variation", "answer": "I would like to check in"},
                {"id": "q3", "type": "variation", "answer": "Could I get a room"}
            ],
            "userAnswers": {"q1": "like", "q2": "I would like to check in, please", "q3": ""}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["correctCount"], 2);
    assert_eq!(json["totalQuestions"], 3);
    assert_eq!(json["progress"]["score"], 67);

    let (_, json) = test_request(&app, "GET", &progress_uri, Some(&token), None).await;
    assert_eq!(json["progress"]["score"], 67);
    assert_eq!(json["progress"]["completedQuestions"], json!(["q1", "q2"]));
}

#[tokio::test]
async fn test_terry_daily_words_and_feedback() {
    let app = create_app_with(ScriptedModel::failing(), Vec::new());
    let token = student_token(&app).await;

    let (_, json) = test_request(
        &app,
        "GET",
        &format!("{}?userId=student-1&action=today", TERRY_VOCABULARY),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(json["words"], json!([]));

    let (status, json) = test_request(
        &app,
        "POST",
        TERRY_VOCABULARY,
        Some(&token),
        Some(json!({
            "action": "generate_daily",
            "userId": "student-1",
            "level": "beginner",
            "category": "daily",
            "count": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let words = json["words"].as_array().unwrap().clone();
    assert_eq!(words.len(), 2);
    assert_eq!(words[0]["word"], "important");
    assert_eq!(words[0]["level"], "beginner");

    let (_, json) = test_request(
        &app,
        "GET",
        &format!("{}?userId=student-1&action=today", TERRY_VOCABULARY),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(json["words"].as_array().unwrap().len(), 2);

    // the fallback feedback scores exactly the passing mark
    let (status, json) = test_request(
        &app,
        "POST",
        TERRY_VOCABULARY,
        Some(&token),
        Some(json!({
            "action": "feedback",
            "userId": "student-1",
            "wordId": words[1]["id"],
            "userSentence": "I develop apps."
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["feedback"]["score"].as_f64(), Some(70.0));
    assert_eq!(json["feedback"]["improvedSentence"], "I develop apps.");
    assert_eq!(json["message"], "훌륭합니다!");

    let (_, json) = test_request(
        &app,
        "GET",
        &format!("{}?userId=student-1&action=progress", TERRY_VOCABULARY),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(json["progress"]["totalWords"], 2);
    assert_eq!(json["progress"]["todayStudied"], 1);
    assert_eq!(json["progress"]["dueCount"], 0);
}

/// Test helper: upload a PDF to the quiz job and poll until it settles
async fn run_quiz_job(app: &TestApp, token: &str) -> Value {
    let response = app
        .router
        .clone()
        .oneshot(multipart_request(TERRY_PDF, token, "application/pdf", &fake_pdf()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["status"]["stage"], "uploading");
    let session_id = json["sessionId"].as_str().unwrap().to_string();

    let uri = format!("{}?sessionId={}", TERRY_PDF, session_id);
    for _ in 0..200 {
        let (status, json) = test_request(app, "GET", &uri, Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        let stage = json["status"]["stage"].as_str().unwrap_or_default().to_string();
        if stage == "completed" || stage == "error" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("quiz job did not finish");
}

#[tokio::test]
async fn test_terry_pdf_quiz_rejects_text_free_pdf() {
    let app = create_test_app();
    let token = student_token(&app).await;

    let json = run_quiz_job(&app, &token).await;
    assert_eq!(json["status"]["stage"], "error");
    assert_eq!(json["status"]["message"], "PDF 처리 중 오류가 발생했습니다.");
    assert!(json["status"]["error"].as_str().unwrap().contains("충분한 텍스트"));
    assert!(json.get("quizData").is_none());
}

#[tokio::test]
async fn test_terry_pdf_quiz_builds_basic_quiz_without_model() {
    let app = build_app(
        ScriptedModel::failing(),
        Arc::new(EnglishParser),
        None,
        Vec::new(),
        AppConfig::default(),
    );
    let token = student_token(&app).await;

    let json = run_quiz_job(&app, &token).await;
    assert_eq!(json["status"]["stage"], "completed");
    assert_eq!(json["status"]["progress"], 100);
    let quiz = &json["quizData"];
    assert_eq!(quiz["sentences"].as_array().unwrap().len(), 3);
    assert_eq!(quiz["fillInBlankQuiz"].as_array().unwrap().len(), 3);
    assert_eq!(quiz["wordOrderQuiz"].as_array().unwrap().len(), 3);
    assert!(!quiz["vocabularyQuiz"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_terry_pdf_quiz_validation() {
    let app = create_test_app();
    let token = student_token(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(TERRY_PDF, &token, "text/plain", b"hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = extract_json(response.into_body()).await;
    assert_eq!(json["error"], "PDF 파일만 업로드 가능합니다.");

    let (status, json) = test_request(&app, "GET", TERRY_PDF, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Session ID required");

    let (status, _) = test_request(
        &app,
        "GET",
        &format!("{}?sessionId=missing", TERRY_PDF),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = test_request(&app, "GET", &format!("{}?sessionId=x", TERRY_PDF), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Korean literature tutor
// ============================================================================

#[tokio::test]
async fn test_kor_artis_quiz_actions() {
    let app = create_test_app();

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/kor-artis/ai-quiz",
        None,
        Some(json!({"action": "explode", "word": "고즈넉하다"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid action");

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/kor-artis/ai-quiz",
        None,
        Some(json!({"action": "evaluate", "word": "고즈넉하다", "meaning": "고요하고 아늑하다", "userSentence": "산사는 고즈넉했다."})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], "AI 답변입니다");
    let requests = app.model.requests.lock().unwrap();
    let last = requests.last().unwrap();
    assert_eq!(last.temperature, Some(0.3));
    assert_eq!(last.max_tokens, Some(200));
}

#[tokio::test]
async fn test_kor_artis_fallbacks_when_model_fails() {
    let app = create_app_with(ScriptedModel::failing(), Vec::new());

    let (_, json) = test_request(
        &app,
        "POST",
        "/api/kor-artis/ai-quiz",
        None,
        Some(json!({"action": "generateBlank", "word": "고즈넉하다", "wrongOptions": ["소란하다"]})),
    )
    .await;
    assert_eq!(json["data"], "빈칸 퀴즈 생성 중 오류가 발생했습니다.");

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/kor-artis/context-evaluation",
        None,
        Some(json!({"originalText": "지문", "title": "제목"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "원본 텍스트와 사용자 요약이 필요합니다.");

    let (_, json) = test_request(
        &app,
        "POST",
        "/api/kor-artis/context-evaluation",
        None,
        Some(json!({"originalText": "지문", "userSummary": "요약", "title": "제목", "category": "인문"})),
    )
    .await;
    assert_eq!(json["data"], "문맥 평가 생성 중 오류가 발생했습니다.");

    let (status, _) = test_request(
        &app,
        "POST",
        "/api/kor-artis/question-generation",
        None,
        Some(json!({"originalText": "지문", "title": "제목"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/kor-artis/question-generation",
        None,
        Some(json!({"originalText": "지문", "title": "제목", "category": "인문"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], json!({"questions": []}));
    let requests = app.model.requests.lock().unwrap();
    assert_eq!(requests.last().unwrap().schema_name(), Some("question_generation"));
}

#[tokio::test]
async fn test_kice_data_reads_configured_file() {
    let missing = AppConfig {
        kice_data_path: std::env::temp_dir().join("yaktoon-kice-missing.json"),
        ..AppConfig::default()
    };
    let app = build_app(ScriptedModel::failing(), Arc::new(FakeParser), None, Vec::new(), missing);
    let (status, json) = test_request(&app, "GET", "/api/kor-artis/kice-data", None, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "데이터를 불러올 수 없습니다.");

    let path = std::env::temp_dir().join(format!("yaktoon-kice-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"passages": [{"title": "독서"}]}"#).unwrap();
    let config = AppConfig {
        kice_data_path: path.clone(),
        ..AppConfig::default()
    };
    let app = build_app(ScriptedModel::failing(), Arc::new(FakeParser), None, Vec::new(), config);
    let (status, json) = test_request(&app, "GET", "/api/kor-artis/kice-data", None, None).await;
    std::fs::remove_file(&path).ok();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["passages"][0]["title"], "독서");
}

// ============================================================================
// Assessments
// ============================================================================

#[tokio::test]
async fn test_career_activities_round_trip() {
    let app = create_test_app();
    let token = student_token(&app).await;

    let (status, _) = test_request(&app, "GET", "/api/career-activities", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = test_request(&app, "GET", "/api/career-activities", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["result"].is_null());

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/career-activities",
        Some(&token),
        Some(json!({"userId": "student-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing required fields");

    let answers = json!([
        {"questionId": "desired_career", "answer": "science"},
        {"questionId": "strengths", "answer": ["leadership"], "selectedOptions": ["leadership"]},
        {"questionId": "activity_preference", "answer": "team"}
    ]);
    let (status, _) = test_request(
        &app,
        "POST",
        "/api/career-activities",
        Some(&token),
        Some(json!({"userId": "someone-else", "answers": answers})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/career-activities",
        Some(&token),
        Some(json!({"userId": "student-1", "answers": answers})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = json["activities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["과학 연구 프로젝트", "과학 멘토링 및 과학관 봉사", "리더십 프로젝트"]);
    assert_eq!(json["result"]["userId"], "student-1");

    let (_, stored) = test_request(&app, "GET", "/api/career-activities", Some(&token), None).await;
    assert_eq!(stored["result"]["id"], json["result"]["id"]);
    assert!(stored["result"]["id"].as_str().unwrap().starts_with("career_"));
    assert_eq!(stored["result"]["answers"][1]["selectedOptions"], json!(["leadership"]));
    assert_eq!(stored["result"]["activities"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_college_adaptation_round_trip() {
    let app = create_test_app();
    let token = student_token(&app).await;

    let (status, json) = test_request(
        &app,
        "POST",
        "/api/college-adaptation",
        Some(&token),
        Some(json!({
            "userId": "student-1",
            "answers": [
                {"questionId": "academic_confidence", "score": 4},
                {"questionId": "social_skills", "score": 4},
                {"questionId": "stress_management", "score": 4},
                {"questionId": "burnout_risk", "score": 4}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"]["overallScore"], 80);
    assert_eq!(json["result"]["category"], "excellent");
    assert_eq!(json["result"]["burnoutRisk"], "low");
    assert_eq!(json["result"]["adaptationAreas"]["independence"], 0);

    let (status, stored) = test_request(&app, "GET", "/api/college-adaptation", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(stored["result"]["id"].as_str().unwrap().starts_with("adaptation_"));
    assert_eq!(stored["result"]["result"], json["result"]);
    assert_eq!(stored["result"]["answers"].as_array().unwrap().len(), 4);

    // Another student sees nothing
    let other = login_as(
        &app,
        User {
            id: "student-2".to_string(),
            name: "이학생".to_string(),
            email: "student2@example.com".to_string(),
            ..Default::default()
        },
    )
    .await;
    let (_, json) = test_request(&app, "GET", "/api/college-adaptation", Some(&other), None).await;
    assert!(json["result"].is_null());
}
