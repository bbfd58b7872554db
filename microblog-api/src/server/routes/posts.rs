use crate::server::{Result, ServerError, ServerRouter, author::Author, json::Json};
use axum::extract::{Query, State};
use axum_extra::routing::{RouterExt, TypedPath};
use microblog_common::model::{
    Id,
    post::{NewPost, Post, PostMarker, UserId},
};
use microblog_storage::{PageLimit, PageToken, Storage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_patch(update_post)
        .typed_get(user_posts)
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct PostBody {
    text: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/v1/posts", rejection(ServerError))]
struct CreatePostPath();

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(storage): State<Arc<dyn Storage>>,
    Author(author_id): Author,
    Json(body): Json<PostBody>,
) -> Result<Json<Post>> {
    let post = storage
        .add_post(NewPost {
            text: body.text,
            author_id,
        })
        .await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/v1/posts/{id}", rejection(ServerError))]
struct PostByIdPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostByIdPath { id }: PostByIdPath,
    State(storage): State<Arc<dyn Storage>>,
) -> Result<Json<Post>> {
    let post = storage.get_post(id).await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/v1/posts/{id}", rejection(ServerError))]
struct UpdatePostPath {
    id: Id<PostMarker>,
}

async fn update_post(
    UpdatePostPath { id }: UpdatePostPath,
    State(storage): State<Arc<dyn Storage>>,
    Json(body): Json<PostBody>,
) -> Result<Json<Post>> {
    let post = storage.update_post(id, body.text).await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/v1/users/{user_id}/posts", rejection(ServerError))]
struct UserPostsPath {
    user_id: UserId,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct FeedQuery {
    page: Option<String>,
    size: Option<usize>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct FeedResponse {
    posts: Vec<Post>,
    #[serde(rename = "nextPage", skip_serializing_if = "Option::is_none")]
    next_page: Option<String>,
}

async fn user_posts(
    UserPostsPath { user_id }: UserPostsPath,
    State(storage): State<Arc<dyn Storage>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>> {
    let limit = match query.size {
        Some(size) => PageLimit::try_from(size)?,
        None => PageLimit::default(),
    };
    let token = query
        .page
        .map(|page| strip_user_prefix(&user_id, page))
        .transpose()?;

    let page = storage.user_posts(&user_id, token.as_ref(), limit).await?;

    let next_page = page.next.map(|next| format!("{user_id}:{next}"));
    Ok(Json(FeedResponse {
        posts: page.posts,
        next_page,
    }))
}

/// External tokens are scoped to the user whose feed they were issued for:
/// `<userId>:<cursor>` on the wire, bare cursor towards storage.
fn strip_user_prefix(user_id: &UserId, page: String) -> Result<PageToken> {
    let cursor = page
        .strip_prefix(user_id.get())
        .and_then(|rest| rest.strip_prefix(':'))
        .map(str::to_owned);

    match cursor {
        Some(cursor) => Ok(PageToken::new(cursor)),
        None => Err(ServerError::ForeignPageToken(page)),
    }
}
