use std::sync::Arc;

use common::http::ext::{RequestGlobalExt, ResultExt};
use common::http::RouteError;
use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;

use crate::api::error::{ApiError, Result};
use crate::api::ext::json_response;
use crate::database::Category;
use crate::global::GlobalState;

async fn list(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;

    let categories: Vec<Category> = sqlx::query_as(
        "SELECT * FROM discussion_categories ORDER BY display_order, id",
    )
    .fetch_all(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch categories"))?;

    json_response(StatusCode::OK, &categories)
}

pub fn routes(_: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .get("/", list)
        .build()
        .expect("failed to build router")
}
