//! Influencer catalog: listing, search, profile pages and their products

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use yaktoon_common::models::{json_or_string, HashRecord, Influencer, Product};
use yaktoon_common::{keys, Store};

use crate::error::{ApiError, ApiResult};
use crate::pagination::Page;
use crate::AppState;

const DEFAULT_PAGE_SIZE: usize = 12;
const MAX_PAGE_SIZE: usize = 24;

/// GET /api/influencers query
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfluencerListQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    /// `popular` (default), `courses` or `recent`
    pub sort: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// GET /api/influencers/:slug response
#[derive(Debug, Serialize)]
pub struct InfluencerDetailResponse {
    pub influencer: Influencer,
    pub products: Vec<Product>,
}

/// Product summary for GET /api/influencer/:slug/products
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub product_id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image: Option<String>,
}

/// Load an influencer; entries without a name do not count
pub(crate) async fn load_influencer(store: &dyn Store, slug: &str) -> ApiResult<Option<Influencer>> {
    let hash = store.hgetall(&keys::influencer(slug)).await?;
    if hash.get("name").map_or(true, |n| n.is_empty()) {
        return Ok(None);
    }
    Ok(Some(Influencer::from_hash(&hash)))
}

/// Every influencer in the `influencers` set
pub(crate) async fn load_all_influencers(store: &dyn Store) -> ApiResult<Vec<Influencer>> {
    let mut influencers = Vec::new();
    for slug in store.smembers(keys::INFLUENCERS).await? {
        if let Some(influencer) = load_influencer(store, &slug).await? {
            influencers.push(influencer);
        }
    }
    Ok(influencers)
}

/// Load a product hash; products without a title do not count
pub(crate) async fn load_product(store: &dyn Store, product_id: &str) -> ApiResult<Option<Product>> {
    let hash = store.hgetall(&keys::product(product_id)).await?;
    if hash.get("title").map_or(true, |t| t.is_empty()) {
        return Ok(None);
    }
    Ok(Some(Product::from_hash(&hash)))
}

/// Apply search, category filter and sort order
pub fn filter_influencers(mut influencers: Vec<Influencer>, query: &InfluencerListQuery) -> Vec<Influencer> {
    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        let needle = q.to_lowercase();
        let hit = |s: &str| s.to_lowercase().contains(&needle);
        influencers.retain(|inf| {
            hit(&inf.name)
                || hit(&inf.username)
                || hit(&inf.bio)
                || hit(&inf.description)
                || inf.tags.iter().any(|t| hit(t))
        });
    }

    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        influencers.retain(|inf| inf.tags.iter().any(|t| t == category));
    }

    match query.sort.as_deref().unwrap_or("popular") {
        "popular" => influencers.sort_by(|a, b| b.stats.followers.cmp(&a.stats.followers)),
        "courses" => {
            influencers.sort_by(|a, b| b.stats.total_courses().cmp(&a.stats.total_courses()))
        }
        "recent" => influencers.sort_by(|a, b| b.id.cmp(&a.id)),
        _ => {}
    }

    influencers
}

/// GET /api/influencers
pub async fn list_influencers(
    State(state): State<AppState>,
    Query(query): Query<InfluencerListQuery>,
) -> ApiResult<Json<Page<Influencer>>> {
    let influencers = load_all_influencers(state.store.as_ref()).await?;
    let influencers = filter_influencers(influencers, &query);

    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    Ok(Json(Page::from_sorted(
        &influencers,
        query.page.unwrap_or(1),
        page_size,
    )))
}

/// GET /api/influencers/:slug
pub async fn get_influencer(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<InfluencerDetailResponse>> {
    let store = state.store.as_ref();
    let influencer = load_influencer(store, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Influencer not found".to_string()))?;

    let mut products = Vec::new();
    for product_id in store.smembers(&keys::influencer_products(&slug)).await? {
        if let Some(product) = load_product(store, &product_id).await? {
            products.push(product);
        }
    }
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(InfluencerDetailResponse { influencer, products }))
}

/// Raw product hash as JSON with typed numbers and embedded JSON fields decoded
pub fn product_detail_json(hash: &HashMap<String, String>) -> Value {
    let mut product = Map::new();
    for (field, raw) in hash {
        let value = match field.as_str() {
            "price" | "createdAt" | "updatedAt" => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or(Value::Null),
            "description" | "features" => json_or_string(raw),
            _ => Value::String(raw.clone()),
        };
        product.insert(field.clone(), value);
    }
    Value::Object(product)
}

/// GET /api/influencers/:slug/products/:product_id
pub async fn get_influencer_product(
    State(state): State<AppState>,
    Path((slug, product_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let hash = state.store.hgetall(&keys::product(&product_id)).await?;
    if hash.is_empty() {
        return Err(ApiError::NotFound("Product not found".to_string()));
    }
    if hash.get("influencerSlug").map(String::as_str) != Some(slug.as_str()) {
        return Err(ApiError::NotFound(
            "Product not found for this influencer".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({ "product": product_detail_json(&hash) })))
}

/// GET /api/influencer/:slug/products
pub async fn list_influencer_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    let store = state.store.as_ref();
    let mut products = Vec::new();
    for product_id in store.smembers(&keys::influencer_products(&slug)).await? {
        let hash = store.hgetall(&keys::product(&product_id)).await?;
        if hash.is_empty() {
            continue;
        }
        products.push(ProductSummary {
            name: hash
                .get("title")
                .filter(|t| !t.is_empty())
                .cloned()
                .unwrap_or_else(|| "Unknown Product".to_string()),
            description: hash.get("description").cloned().unwrap_or_default(),
            price: hash.get("price").and_then(|p| p.parse().ok()).unwrap_or(0),
            image: hash.get("image").cloned(),
            product_id,
        });
    }

    let total = products.len();
    Ok(Json(serde_json::json!({ "products": products, "total": total })))
}

pub fn influencer_routes() -> Router<AppState> {
    Router::new()
        .route("/api/influencers", get(list_influencers))
        .route("/api/influencers/:slug", get(get_influencer))
        .route(
            "/api/influencers/:slug/products/:product_id",
            get(get_influencer_product),
        )
        .route("/api/influencer/:slug/products", get(list_influencer_products))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaktoon_common::models::InfluencerStats;

    fn influencer(id: &str, name: &str, tags: &[&str], followers: i64, courses: i64) -> Influencer {
        Influencer {
            id: id.to_string(),
            slug: id.to_string(),
            name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            stats: InfluencerStats {
                followers,
                free_courses: courses,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn sample() -> Vec<Influencer> {
        vec![
            influencer("a", "Terry English", &["영어"], 500, 1),
            influencer("b", "Math Kim", &["수학", "입시"], 9000, 2),
            influencer("c", "Essay Lee", &["입시"], 100, 7),
        ]
    }

    fn slugs(list: &[Influencer]) -> Vec<&str> {
        list.iter().map(|i| i.slug.as_str()).collect()
    }

    #[test]
    fn test_default_sort_is_followers_desc() {
        let result = filter_influencers(sample(), &InfluencerListQuery::default());
        assert_eq!(slugs(&result), ["b", "a", "c"]);
    }

    #[test]
    fn test_courses_and_recent_sort() {
        let query = InfluencerListQuery {
            sort: Some("courses".to_string()),
            ..Default::default()
        };
        assert_eq!(slugs(&filter_influencers(sample(), &query)), ["c", "b", "a"]);

        let query = InfluencerListQuery {
            sort: Some("recent".to_string()),
            ..Default::default()
        };
        assert_eq!(slugs(&filter_influencers(sample(), &query)), ["c", "b", "a"]);
    }

    #[test]
    fn test_search_is_case_insensitive_and_covers_tags() {
        let query = InfluencerListQuery {
            q: Some("ENGLISH".to_string()),
            ..Default::default()
        };
        assert_eq!(slugs(&filter_influencers(sample(), &query)), ["a"]);

        let query = InfluencerListQuery {
            q: Some("입시".to_string()),
            ..Default::default()
        };
        assert_eq!(slugs(&filter_influencers(sample(), &query)), ["b", "c"]);
    }

    #[test]
    fn test_category_is_exact_tag_match() {
        let query = InfluencerListQuery {
            category: Some("수학".to_string()),
            ..Default::default()
        };
        assert_eq!(slugs(&filter_influencers(sample(), &query)), ["b"]);

        let query = InfluencerListQuery {
            category: Some("수".to_string()),
            ..Default::default()
        };
        assert!(filter_influencers(sample(), &query).is_empty());
    }

    #[test]
    fn test_product_detail_decodes_json_fields() {
        let hash: HashMap<String, String> = [
            ("id", "p1"),
            ("price", "30000"),
            ("description", r#"{"intro":"hi"}"#),
            ("features", "plain text"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let json = product_detail_json(&hash);
        assert_eq!(json["price"], 30000);
        assert_eq!(json["description"]["intro"], "hi");
        assert_eq!(json["features"], "plain text");
        assert_eq!(json["id"], "p1");
    }
}
