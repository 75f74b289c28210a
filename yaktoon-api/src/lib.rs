//! yaktoon-api library interface
//!
//! HTTP backend of the education platform: community, influencer catalog,
//! purchases, influencer messaging and dashboards, AI chat and study tools, the
//! influencer tutors, self-assessments and the student record analysis (medsky)
//! endpoints.

pub mod api;
pub mod assessments;
pub mod auth;
pub mod error;
pub mod pagination;
pub mod pdf_quiz;
pub mod srs;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use yaktoon_common::config::AppConfig;
use yaktoon_common::events::EventBus;
use yaktoon_common::Store;
use yaktoon_medsky::llm::ChatModel;
use yaktoon_medsky::MedskyService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Student record analysis sessions and pipeline
    pub medsky: Arc<MedskyService>,
    /// Model used by chat, messaging, profile and tool endpoints
    pub llm: Arc<dyn ChatModel>,
    pub events: EventBus,
    pub config: Arc<AppConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        medsky: Arc<MedskyService>,
        llm: Arc<dyn ChatModel>,
        events: EventBus,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            medsky,
            llm,
            events,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// Lifetime of issued bearer tokens
    pub fn token_ttl_secs(&self) -> u64 {
        self.config
            .auth_token_ttl_days
            .saturating_mul(yaktoon_common::store::DAY_SECS)
    }
}

/// Build application router
///
/// Every route passes through the token middleware; handlers that need a user
/// take an [`auth::AuthUser`] or [`auth::AdminUser`] extractor.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    Router::new()
        .merge(api::auth_routes())
        .merge(api::post_routes())
        .merge(api::influencer_routes())
        .merge(api::product_routes())
        .merge(api::purchase_routes())
        .merge(api::messaging_routes())
        .merge(api::dashboard_routes())
        .merge(api::chat_routes())
        .merge(api::tool_routes())
        .merge(api::christine_routes())
        .merge(api::terry_routes())
        .merge(api::kor_artis_routes())
        .merge(api::assessment_routes())
        .merge(api::medsky_routes())
        .merge(api::admin_routes())
        .merge(api::health_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
