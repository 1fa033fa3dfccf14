use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json,
    routes::posts::PostResponse,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use pinnwand_common::model::{
    Id,
    auth::{AuthToken, Authentication},
    user::{CreateUser, User, UserMarker},
};
use pinnwand_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::UtcDateTime;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_user)
        .typed_get(get_user)
        .typed_get(get_user_posts)
        .typed_get(get_self)
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct CreatedUserResponse {
    user: User,
    token: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/create", rejection(ServerError))]
struct CreateUserPath();

/// Registers a user and issues their first auth token.
async fn create_user(
    CreateUserPath(): CreateUserPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<CreateUser>,
) -> Result<Json<CreatedUserResponse>> {
    let user = db.create_user(&request).await?;

    let token = AuthToken::generate_random(user.id);
    let authentication = Authentication {
        user: user.id,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        expires_after: None,
    };
    db.store_auth(&authentication).await?;

    Ok(Json(CreatedUserResponse {
        user,
        token: token.as_token_str(),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct GetUserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    GetUserPath { id }: GetUserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<User>> {
    let user = db
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/me", rejection(ServerError))]
struct GetSelfPath();

async fn get_self(
    GetSelfPath(): GetSelfPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<User>> {
    let user = db
        .fetch_user(user.user_id())
        .await?
        .ok_or(ServerError::UserByIdNotFound(user.user_id()))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts", rejection(ServerError))]
struct GetUserPostsPath {
    id: Id<UserMarker>,
}

async fn get_user_posts(
    GetUserPostsPath { id }: GetUserPostsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<PostResponse>>> {
    let posts = db
        .fetch_user_posts(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}
