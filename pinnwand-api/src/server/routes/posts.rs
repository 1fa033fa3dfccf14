use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use pinnwand_common::model::{
    Id,
    comment::Comment,
    engagement::Engagement,
    post::{CreatePost, Post, PostBody, PostMarker},
    user::UserMarker,
};
use pinnwand_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::UtcDateTime;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_posts)
        .typed_get(get_post)
        .typed_post(create_post)
        .typed_put(edit_post)
        .typed_delete(delete_post)
        .typed_put(like_post)
        .typed_put(unlike_post)
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct PostResponse {
    pub id: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub body: PostBody,
    pub created_at: UtcDateTime,
    pub likes: Vec<Engagement>,
    pub unlikes: Vec<Engagement>,
    pub comments: Vec<Comment>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        let likes = post.engagement().likes();
        let unlikes = post.engagement().unlikes();
        let comments = post.comments().comments().to_vec();

        Self {
            id: post.id,
            author: post.author,
            body: post.body,
            created_at: post.created_at,
            likes,
            unlikes,
            comments,
        }
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct GetPostsPath();

/// The feed: every post, most recent first.
async fn get_posts(
    GetPostsPath(): GetPostsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<PostResponse>>> {
    let posts = db.fetch_posts().await?;

    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct GetPostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    GetPostPath { id }: GetPostPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<PostResponse>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post.into()))
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct CreatePostRequest {
    body: PostBody,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/create", rejection(ServerError))]
struct CreatePostPath();

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<CreatePostRequest>,
) -> Result<Json<PostResponse>> {
    let post = db
        .create_post(&CreatePost {
            author: user.user_id(),
            body: request.body,
        })
        .await?;

    Ok(Json(post.into()))
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct EditPostRequest {
    body: PostBody,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct EditPostPath {
    id: Id<PostMarker>,
}

/// Replaces the post's text. Only the author may edit their post.
async fn edit_post(
    EditPostPath { id }: EditPostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<EditPostRequest>,
) -> Result<Json<PostResponse>> {
    let post = db
        .try_update_post(id, |post| {
            post.edit_body(user.user_id(), request.body)
                .map(|()| post.clone())
        })
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))??;

    Ok(Json(post.into()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct DeletePostPath {
    id: Id<PostMarker>,
}

async fn delete_post(
    DeletePostPath { id }: DeletePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    post.authorize_delete(user.user_id())?;
    db.delete_post(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct LikePostPath {
    id: Id<PostMarker>,
}

/// Toggles the caller's like on the post and responds with the updated
/// likes, most recent first.
async fn like_post(
    LikePostPath { id }: LikePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Engagement>>> {
    let likes = db
        .update_post(id, |post| post.like(user.user_id()))
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(likes))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/unlike", rejection(ServerError))]
struct UnlikePostPath {
    id: Id<PostMarker>,
}

async fn unlike_post(
    UnlikePostPath { id }: UnlikePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Engagement>>> {
    let unlikes = db
        .update_post(id, |post| post.unlike(user.user_id()))
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(unlikes))
}
