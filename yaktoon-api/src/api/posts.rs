//! Community posts and comments
//!
//! Posts are hashes at `post:{id}`, listed newest-first in `community:posts`.
//! Comments are hashes at `comment:{id}`, listed oldest-first in `post:{id}:comments`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use yaktoon_common::models::{Comment, HashRecord, Post, PostStats, COMMUNITY_TYPES};
use yaktoon_common::{ids, keys, time, Store};

use super::required;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::pagination::Page;
use crate::AppState;

const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_COMMUNITY: &str = "high";

/// GET /api/posts query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    /// `latest` (default) or `popular`
    pub sort: Option<String>,
    pub community_type: Option<String>,
}

/// POST /api/posts request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub community_type: Option<String>,
}

/// POST /api/posts/:id/comments request
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub body: Option<String>,
}

/// Id and timestamp of a newly created post or comment
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub id: String,
    pub created_at: i64,
}

/// GET /api/posts/:id response
#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    pub post: Post,
    pub comments: Vec<Comment>,
}

async fn load_post(store: &dyn Store, id: &str) -> ApiResult<Option<Post>> {
    let hash = store.hgetall(&keys::post(id)).await?;
    Ok((!hash.is_empty()).then(|| Post::from_hash(&hash)))
}

async fn save_stats(store: &dyn Store, post: &Post) -> ApiResult<()> {
    let stats = serde_json::to_string(&post.stats)
        .map_err(|e| ApiError::Internal(format!("Failed to encode stats: {}", e)))?;
    store.hset(&keys::post(&post.id), &[("stats", stats)]).await?;
    Ok(())
}

/// Sort posts in place: `popular` by likes, anything else newest first
pub fn sort_posts(posts: &mut [Post], sort: &str) {
    match sort {
        "popular" => posts.sort_by(|a, b| b.stats.likes.cmp(&a.stats.likes)),
        _ => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}

/// GET /api/posts
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> ApiResult<Json<Page<Post>>> {
    let store = state.store.as_ref();
    let ids = store.lall(keys::COMMUNITY_POSTS).await?;

    let mut posts = Vec::with_capacity(ids.len());
    for id in &ids {
        match load_post(store, id).await? {
            Some(post) => posts.push(post),
            None => debug!(post_id = %id, "Listed post has no hash"),
        }
    }

    if let Some(community) = query.community_type.as_deref().filter(|c| !c.is_empty()) {
        posts.retain(|p| p.community_type == community);
    }
    sort_posts(&mut posts, query.sort.as_deref().unwrap_or("latest"));

    Ok(Json(Page::from_sorted(
        &posts,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )))
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let title = required(&request.title, "Title is required")?;
    let body = required(&request.body, "Body is required")?;

    let community_type = request
        .community_type
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COMMUNITY);
    if !COMMUNITY_TYPES.contains(&community_type) {
        return Err(ApiError::BadRequest(format!(
            "Unknown community type: {}",
            community_type
        )));
    }

    let post = Post {
        id: ids::uuid(),
        author_id: user.id.clone(),
        community_type: community_type.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        tags: request.tags,
        created_at: time::now_millis(),
        stats: PostStats::default(),
    };

    let store = state.store.as_ref();
    store.hset(&keys::post(&post.id), &post.to_fields()).await?;
    store.lpush(keys::COMMUNITY_POSTS, &post.id).await?;

    info!(post_id = %post.id, author = %user.id, "Created post");
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: post.id,
            created_at: post.created_at,
        }),
    ))
}

/// GET /api/posts/:id
///
/// Counts a view on every read.
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PostDetailResponse>> {
    let store = state.store.as_ref();
    let mut post = load_post(store, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    post.stats.views = Some(post.stats.views.unwrap_or(0) + 1);
    save_stats(store, &post).await?;

    let mut comments = Vec::new();
    for comment_id in store.lall(&keys::post_comments(&id)).await? {
        let hash = store.hgetall(&keys::comment(&comment_id)).await?;
        if !hash.is_empty() {
            comments.push(Comment::from_hash(&hash));
        }
    }

    Ok(Json(PostDetailResponse { post, comments }))
}

/// POST /api/posts/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let body = required(&request.body, "Body is required")?;

    let store = state.store.as_ref();
    let mut post = load_post(store, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let comment = Comment {
        id: ids::uuid(),
        post_id: id.clone(),
        author_id: user.id,
        body: body.to_string(),
        created_at: time::now_millis(),
    };
    store.hset(&keys::comment(&comment.id), &comment.to_fields()).await?;
    store.rpush(&keys::post_comments(&id), &comment.id).await?;

    post.stats.comments += 1;
    save_stats(store, &post).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: comment.id,
            created_at: comment.created_at,
        }),
    ))
}

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/:id", get(get_post))
        .route("/api/posts/:id/comments", post(create_comment))
}
