use std::sync::Arc;

use common::http::RouteError;
use hyper::Body;
use routerify::Router;

use super::error::ApiError;
use crate::global::GlobalState;

pub mod auth;
pub mod cameras;
pub mod categories;
pub mod comments;
pub mod discussions;
pub mod follows;
pub mod likes;
pub mod upload;
pub mod users;

pub fn routes(global: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .scope("/auth", auth::routes(global))
        .scope("/users", users::routes(global))
        .scope("/cameras", cameras::routes(global))
        .scope("/categories", categories::routes(global))
        .scope("/discussions", discussions::routes(global))
        .scope("/comments", comments::routes(global))
        .scope("/likes", likes::routes(global))
        .scope("/follows", follows::routes(global))
        .scope("/upload", upload::routes(global))
        .build()
        .expect("failed to build router")
}
