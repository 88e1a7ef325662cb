use std::sync::Arc;

use common::http::ext::{OptionExt, RequestGlobalExt, ResultExt};
use common::http::RouteError;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{ApiError, Result};
use crate::api::ext::{parse_json_body, query_params, RequestExt};
use crate::database::{Like, LikeTarget};
use crate::global::GlobalState;

#[derive(serde::Deserialize)]
struct LikeRequest {
    #[serde(default)]
    discussion_id: Option<Uuid>,
    #[serde(default)]
    camera_id: Option<Uuid>,
    #[serde(default)]
    comment_id: Option<Uuid>,
}

const TARGET_REQUIRED: &str =
    "Exactly one of discussion_id, camera_id, or comment_id must be provided";

impl LikeRequest {
    fn target(&self) -> Result<LikeTarget> {
        LikeTarget::from_parts(self.discussion_id, self.camera_id, self.comment_id)
            .ok_or((StatusCode::BAD_REQUEST, TARGET_REQUIRED))
            .map_err(RouteError::from)
    }
}

fn target_from_query(req: &Request<Body>) -> Result<LikeTarget> {
    let params = query_params(req);

    let parse = |name: &str| -> Result<Option<Uuid>> {
        params
            .get(name)
            .map(|v| v.parse::<Uuid>())
            .transpose()
            .map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid target id"))
    };

    LikeTarget::from_parts(parse("discussion_id")?, parse("camera_id")?, parse("comment_id")?)
        .ok_or((StatusCode::BAD_REQUEST, TARGET_REQUIRED))
        .map_err(RouteError::from)
}

/// The owner of the liked content, or a 404 when it does not exist.
async fn content_owner(global: &Arc<GlobalState>, target: LikeTarget) -> Result<String> {
    let (sql, id) = match target {
        LikeTarget::Discussion(id) => ("SELECT user_id FROM discussions WHERE id = $1", id),
        LikeTarget::Camera(id) => ("SELECT user_id FROM cameras WHERE id = $1", id),
        LikeTarget::Comment(id) => ("SELECT user_id FROM comments WHERE id = $1", id),
    };

    sqlx::query_scalar::<_, String>(sql)
        .bind(id)
        .fetch_optional(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch content owner"))?
        .map_err_route((StatusCode::NOT_FOUND, "Content not found"))
}

/// Likes are restricted to mutuals: both users must follow each other.
/// Liking your own content is always allowed.
async fn mutual_follow(global: &Arc<GlobalState>, user_id: &str, owner_id: &str) -> Result<bool> {
    if user_id == owner_id {
        return Ok(true);
    }

    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)
            AND EXISTS(SELECT 1 FROM follows WHERE follower_id = $2 AND following_id = $1)",
    )
    .bind(user_id)
    .bind(owner_id)
    .fetch_one(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to check follow relationship"))
}

async fn create(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let request: LikeRequest = parse_json_body(req).await?;
    let target = request.target()?;

    let owner_id = content_owner(&global, target).await?;

    if !mutual_follow(&global, &auth.user_id, &owner_id).await? {
        return Err((
            StatusCode::FORBIDDEN,
            "You can only like content from users you mutually follow",
        )
            .into());
    }

    let like: Option<Like> = sqlx::query_as(
        "INSERT INTO likes (id, user_id, discussion_id, camera_id, comment_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING
        RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&auth.user_id)
    .bind(target.discussion_id())
    .bind(target.camera_id())
    .bind(target.comment_id())
    .fetch_optional(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "Failed to create like"))?;

    let Some(like) = like else {
        return Err((StatusCode::BAD_REQUEST, "Already liked this content").into());
    };

    Ok(make_response!(
        StatusCode::OK,
        json!({
            "message": "Like created successfully",
            "like_id": like.id,
        })
    ))
}

async fn delete(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let request: LikeRequest = parse_json_body(req).await?;
    let target = request.target()?;

    let (sql, id) = match target {
        LikeTarget::Discussion(id) => {
            ("DELETE FROM likes WHERE user_id = $1 AND discussion_id = $2", id)
        }
        LikeTarget::Camera(id) => ("DELETE FROM likes WHERE user_id = $1 AND camera_id = $2", id),
        LikeTarget::Comment(id) => ("DELETE FROM likes WHERE user_id = $1 AND comment_id = $2", id),
    };

    let result = sqlx::query(sql)
        .bind(&auth.user_id)
        .bind(id)
        .execute(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to delete like"))?;

    if result.rows_affected() == 0 {
        return Err((StatusCode::NOT_FOUND, "Like not found").into());
    }

    Ok(make_response!(
        StatusCode::OK,
        json!({ "message": "Like removed successfully" })
    ))
}

async fn check(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let target = target_from_query(&req)?;

    let (sql, id) = match target {
        LikeTarget::Discussion(id) => (
            "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = $1 AND discussion_id = $2)",
            id,
        ),
        LikeTarget::Camera(id) => (
            "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = $1 AND camera_id = $2)",
            id,
        ),
        LikeTarget::Comment(id) => (
            "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = $1 AND comment_id = $2)",
            id,
        ),
    };

    let is_liked: bool = sqlx::query_scalar(sql)
        .bind(&auth.user_id)
        .bind(id)
        .fetch_one(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to check like"))?;

    Ok(make_response!(
        StatusCode::OK,
        json!({ "is_liked": is_liked })
    ))
}

async fn count(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let target = target_from_query(&req)?;

    let (sql, id) = match target {
        LikeTarget::Discussion(id) => ("SELECT COUNT(*) FROM likes WHERE discussion_id = $1", id),
        LikeTarget::Camera(id) => ("SELECT COUNT(*) FROM likes WHERE camera_id = $1", id),
        LikeTarget::Comment(id) => ("SELECT COUNT(*) FROM likes WHERE comment_id = $1", id),
    };

    let like_count: i64 = sqlx::query_scalar(sql)
        .bind(id)
        .fetch_one(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to count likes"))?;

    Ok(make_response!(
        StatusCode::OK,
        json!({ "like_count": like_count })
    ))
}

pub fn routes(_: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .post("/", create)
        .delete("/", delete)
        .get("/check", check)
        .get("/count", count)
        .build()
        .expect("failed to build router")
}
