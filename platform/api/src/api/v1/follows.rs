use std::sync::Arc;

use common::http::ext::{RequestGlobalExt, ResultExt};
use common::http::RouteError;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{ApiError, Result};
use crate::api::ext::{json_response, query_params};
use crate::database::Follow;
use crate::global::GlobalState;

async fn list(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let params = query_params(&req);

    let follower_id = params.get("follower_id").cloned();
    let following_id = params.get("following_id").cloned();

    let follows: Vec<Follow> = sqlx::query_as(
        "SELECT * FROM follows
        WHERE ($1::TEXT IS NULL OR follower_id = $1)
            AND ($2::TEXT IS NULL OR following_id = $2)
        ORDER BY created_at DESC",
    )
    .bind(follower_id)
    .bind(following_id)
    .fetch_all(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch follows"))?;

    json_response(StatusCode::OK, &follows)
}

async fn create(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let params = query_params(&req);

    let follower_id = params
        .get("follower_id")
        .filter(|v| !v.is_empty())
        .ok_or((StatusCode::BAD_REQUEST, "follower_id is required"))?
        .clone();
    let following_id = params
        .get("following_id")
        .filter(|v| !v.is_empty())
        .ok_or((StatusCode::BAD_REQUEST, "following_id is required"))?
        .clone();

    if follower_id == following_id {
        return Err((StatusCode::BAD_REQUEST, "Cannot follow yourself").into());
    }

    let follow: Option<Follow> = sqlx::query_as(
        "INSERT INTO follows (id, follower_id, following_id)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
        RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&follower_id)
    .bind(&following_id)
    .fetch_optional(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "failed to create follow relationship"))?;

    let Some(follow) = follow else {
        return Err((StatusCode::BAD_REQUEST, "Already following this user").into());
    };

    Ok(make_response!(
        StatusCode::OK,
        json!({
            "message": "Follow successful",
            "data": serde_json::to_value(&follow).map_err_route("failed to serialize follow")?,
        })
    ))
}

async fn delete(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let params = query_params(&req);

    let follower_id = params
        .get("follower_id")
        .filter(|v| !v.is_empty())
        .ok_or((StatusCode::BAD_REQUEST, "follower_id is required"))?;
    let following_id = params
        .get("following_id")
        .filter(|v| !v.is_empty())
        .ok_or((StatusCode::BAD_REQUEST, "following_id is required"))?;

    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(follower_id)
        .bind(following_id)
        .execute(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to delete follow"))?;

    if result.rows_affected() == 0 {
        return Err((StatusCode::NOT_FOUND, "Follow relationship not found").into());
    }

    Ok(make_response!(
        StatusCode::OK,
        json!({ "message": "Unfollow successful" })
    ))
}

pub fn routes(_: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .get("/", list)
        .post("/", create)
        .delete("/", delete)
        .build()
        .expect("failed to build router")
}
