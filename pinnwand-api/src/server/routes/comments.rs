use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use pinnwand_common::model::{
    Id,
    comment::{Comment, CommentId, CommentText},
    post::PostMarker,
};
use pinnwand_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(add_comment)
        .typed_put(edit_comment)
        .typed_delete(delete_comment)
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct CommentRequest {
    text: CommentText,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct AddCommentPath {
    id: Id<PostMarker>,
}

/// Attaches a comment to the post and responds with the updated comment
/// list, most recent first.
async fn add_comment(
    AddCommentPath { id }: AddCommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<CommentRequest>,
) -> Result<Json<Vec<Comment>>> {
    // The comment snapshots the author's current handle and avatar.
    let author = db
        .fetch_user(user.user_id())
        .await?
        .ok_or(ServerError::UserByIdNotFound(user.user_id()))?;

    let comments = db
        .update_post(id, |post| {
            post.add_comment(&author, request.text);
            post.comments().comments().to_vec()
        })
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(comments))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments/{comment_id}", rejection(ServerError))]
struct EditCommentPath {
    id: Id<PostMarker>,
    comment_id: CommentId,
}

async fn edit_comment(
    EditCommentPath { id, comment_id }: EditCommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<CommentRequest>,
) -> Result<Json<Vec<Comment>>> {
    let comments = db
        .try_update_post(id, |post| {
            post.edit_comment(comment_id, user.user_id(), request.text)
                .map(|()| post.comments().comments().to_vec())
        })
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))??;

    Ok(Json(comments))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments/{comment_id}", rejection(ServerError))]
struct DeleteCommentPath {
    id: Id<PostMarker>,
    comment_id: CommentId,
}

async fn delete_comment(
    DeleteCommentPath { id, comment_id }: DeleteCommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Comment>>> {
    let comments = db
        .try_update_post(id, |post| {
            post.delete_comment(comment_id, user.user_id())
                .map(|()| post.comments().comments().to_vec())
        })
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))??;

    Ok(Json(comments))
}
