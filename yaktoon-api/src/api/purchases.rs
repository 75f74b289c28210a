//! Purchase tracking and purchase-derived access

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::info;
use yaktoon_common::models::{HashRecord, Purchase, User};
use yaktoon_common::{keys, time, Store};

use super::required;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const PURCHASE_VALIDITY_DAYS: i64 = 365;

/// POST /api/purchases/track request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPurchaseRequest {
    pub product_id: Option<String>,
    pub influencer_slug: Option<String>,
    /// Only honoured for admins
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseListQuery {
    pub user_id: Option<String>,
}

/// A purchase with the product hash it refers to
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseWithProduct {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub product_data: HashMap<String, String>,
}

/// An influencer the user bought from, with what they bought
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedInfluencer {
    #[serde(flatten)]
    pub influencer: HashMap<String, String>,
    pub slug: String,
    pub purchased_products: Vec<Map<String, Value>>,
    pub total_purchases: usize,
    pub latest_purchase: String,
}

/// Product the user can open, from GET /api/influencer/:slug/check-access
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibleProduct {
    pub product_id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
}

/// Admins may act on behalf of another user
fn target_user<'a>(user: &'a User, requested: Option<&'a str>) -> &'a str {
    match requested.filter(|id| !id.is_empty()) {
        Some(id) if user.is_admin() => id,
        _ => &user.id,
    }
}

/// All purchases of a user joined with their product hashes, newest first
async fn load_purchases(store: &dyn Store, user_id: &str) -> ApiResult<Vec<PurchaseWithProduct>> {
    let mut purchases = Vec::new();
    for product_id in store.smembers(&keys::user_purchases(user_id)).await? {
        let details = store.hgetall(&keys::user_purchase(user_id, &product_id)).await?;
        if details.is_empty() {
            continue;
        }
        purchases.push(PurchaseWithProduct {
            purchase: Purchase::from_hash(&details),
            product_data: store.hgetall(&keys::product(&product_id)).await?,
        });
    }
    purchases.sort_by(|a, b| {
        time::sort_key(&b.purchase.purchased_at).cmp(&time::sort_key(&a.purchase.purchased_at))
    });
    Ok(purchases)
}

/// POST /api/purchases/track
pub async fn track_purchase(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<TrackPurchaseRequest>,
) -> ApiResult<Json<Value>> {
    let missing = "Missing required fields";
    let product_id = required(&request.product_id, missing)?;
    let influencer_slug = required(&request.influencer_slug, missing)?;
    let user_id = target_user(&user, request.user_id.as_deref());

    let store = state.store.as_ref();
    if store.hgetall(&keys::product(product_id)).await?.is_empty() {
        return Err(ApiError::NotFound("Product not found".to_string()));
    }

    let purchases_key = keys::user_purchases(user_id);
    if store.sismember(&purchases_key, product_id).await? {
        return Err(ApiError::BadRequest("Product already purchased".to_string()));
    }

    let now = time::now();
    let purchase = Purchase {
        product_id: product_id.to_string(),
        influencer_slug: influencer_slug.to_string(),
        purchased_at: time::to_iso(&now),
        status: "active".to_string(),
        expires_at: time::to_iso(&(now + Duration::days(PURCHASE_VALIDITY_DAYS))),
    };

    store.sadd(&purchases_key, product_id).await?;
    store
        .hset(&keys::user_purchase(user_id, product_id), &purchase.to_fields())
        .await?;
    store.sadd(&keys::product_customers(product_id), user_id).await?;
    store
        .sadd(&keys::influencer_product_customers(influencer_slug, product_id), user_id)
        .await?;
    store
        .sadd(&keys::influencer_all_customers(influencer_slug), user_id)
        .await?;

    let user_key = keys::user(user_id);
    if !store.exists(&user_key).await? {
        let (email, name) = if user_id == user.id {
            (user.email.clone(), user.name.clone())
        } else {
            (String::new(), String::new())
        };
        store
            .hset(
                &user_key,
                &[
                    ("id", user_id.to_string()),
                    ("userId", user_id.to_string()),
                    ("email", email),
                    ("name", name),
                    ("createdAt", time::now_millis().to_string()),
                ],
            )
            .await?;
    }

    info!(user_id, product_id, influencer_slug, "Tracked purchase");
    Ok(Json(serde_json::json!({
        "success": true,
        "purchase": purchase,
        "message": "구매가 성공적으로 기록되었습니다.",
    })))
}

/// GET /api/purchases/track
pub async fn list_purchases(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<PurchaseListQuery>,
) -> ApiResult<Json<Value>> {
    let user_id = target_user(&user, query.user_id.as_deref());
    let purchases = load_purchases(state.store.as_ref(), user_id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "userId": user_id,
        "purchases": purchases,
    })))
}

/// Group purchases by influencer, most recent purchase first
pub fn group_by_influencer(
    purchases: Vec<PurchaseWithProduct>,
    influencers: &HashMap<String, HashMap<String, String>>,
) -> Vec<PurchasedInfluencer> {
    let mut grouped: Vec<PurchasedInfluencer> = Vec::new();

    for PurchaseWithProduct { purchase, product_data } in purchases {
        if product_data.is_empty() {
            continue;
        }
        let slug = if purchase.influencer_slug.is_empty() {
            product_data.get("influencerSlug").cloned().unwrap_or_default()
        } else {
            purchase.influencer_slug.clone()
        };
        let Some(influencer) = influencers.get(&slug) else {
            continue;
        };

        let mut product: Map<String, Value> = product_data
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        if let Ok(Value::Object(details)) = serde_json::to_value(&purchase) {
            product.extend(details);
        }
        product.insert("productId".to_string(), Value::String(purchase.product_id.clone()));

        let index = match grouped.iter().position(|g| g.slug == slug) {
            Some(index) => index,
            None => {
                grouped.push(PurchasedInfluencer {
                    influencer: influencer.clone(),
                    slug: slug.clone(),
                    purchased_products: Vec::new(),
                    total_purchases: 0,
                    latest_purchase: purchase.purchased_at.clone(),
                });
                grouped.len() - 1
            }
        };
        let entry = &mut grouped[index];
        entry.purchased_products.push(product);
        entry.total_purchases += 1;
        if time::sort_key(&purchase.purchased_at) > time::sort_key(&entry.latest_purchase) {
            entry.latest_purchase = purchase.purchased_at;
        }
    }

    grouped.sort_by(|a, b| time::sort_key(&b.latest_purchase).cmp(&time::sort_key(&a.latest_purchase)));
    grouped
}

/// GET /api/user/my-influencers
pub async fn my_influencers(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let store = state.store.as_ref();
    let total_purchases = store.smembers(&keys::user_purchases(&user.id)).await?.len();
    let purchases = load_purchases(store, &user.id).await?;

    let mut influencers = HashMap::new();
    for purchase in &purchases {
        let slug = if purchase.purchase.influencer_slug.is_empty() {
            purchase.product_data.get("influencerSlug").cloned().unwrap_or_default()
        } else {
            purchase.purchase.influencer_slug.clone()
        };
        if slug.is_empty() || influencers.contains_key(&slug) {
            continue;
        }
        let hash = store.hgetall(&keys::influencer(&slug)).await?;
        if !hash.is_empty() {
            influencers.insert(slug, hash);
        }
    }

    let grouped = group_by_influencer(purchases, &influencers);
    Ok(Json(serde_json::json!({
        "success": true,
        "userId": user.id,
        "totalInfluencers": grouped.len(),
        "influencers": grouped,
        "totalPurchases": total_purchases,
    })))
}

/// GET /api/influencer/:slug/check-access
///
/// Customers are matched by user id first, then by email through the
/// customers' user hashes.
pub async fn check_access(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    let store = state.store.as_ref();
    let mut products = Vec::new();

    for product_id in store.smembers(&keys::influencer_products(&slug)).await? {
        let customers = store
            .smembers(&keys::influencer_product_customers(&slug, &product_id))
            .await?;

        let mut purchased = customers.iter().any(|c| *c == user.id);
        if !purchased && !user.email.is_empty() {
            for customer in &customers {
                let email = store.hget(&keys::user(customer), "email").await?;
                if email.as_deref() == Some(user.email.as_str()) {
                    purchased = true;
                    break;
                }
            }
        }
        if !purchased {
            continue;
        }

        let product = store.hgetall(&keys::product(&product_id)).await?;
        if product.is_empty() {
            continue;
        }
        products.push(AccessibleProduct {
            name: product
                .get("title")
                .filter(|t| !t.is_empty())
                .cloned()
                .unwrap_or_else(|| "Unknown Product".to_string()),
            description: product.get("description").cloned().unwrap_or_default(),
            price: product.get("price").and_then(|p| p.parse().ok()).unwrap_or(0),
            product_id,
        });
    }

    Ok(Json(serde_json::json!({
        "hasAccess": !products.is_empty(),
        "products": products,
    })))
}

pub fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route("/api/purchases/track", get(list_purchases).post(track_purchase))
        .route("/api/user/my-influencers", get(my_influencers))
        .route("/api/influencer/:slug/check-access", get(check_access))
}
