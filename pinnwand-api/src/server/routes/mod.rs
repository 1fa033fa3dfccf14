use crate::server::ServerRouter;
use axum::Router;

mod comments;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(users::routes())
}
