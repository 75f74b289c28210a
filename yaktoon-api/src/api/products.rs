//! Product lookup

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use super::influencers::load_product;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/products/:id
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let product = load_product(state.store.as_ref(), &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    Ok(Json(json!({ "product": product })))
}

/// POST /api/products/:id/purchase
///
/// No payment provider is wired in; purchases are recorded through
/// `/api/purchases/track` instead.
pub async fn purchase_product(Path(_id): Path<String>) -> ApiResult<Json<Value>> {
    Err(ApiError::NotImplemented(
        "Payment processing is not available".to_string(),
    ))
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/api/products/:id", get(get_product))
        .route("/api/products/:id/purchase", post(purchase_product))
}
