use std::collections::HashSet;
use std::sync::Arc;

use common::http::ext::{OptionExt, RequestGlobalExt, ResultExt};
use common::http::RouteError;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use routerify::prelude::RequestExt as _;
use routerify::Router;
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{ApiError, Result};
use crate::api::ext::{
    json_response, parse_json_body, query_param_values, query_params, Pagination, RequestExt,
};
use crate::database::{DiscussionSort, DiscussionWithStats};
use crate::global::GlobalState;

#[derive(serde::Serialize)]
struct DiscussionPublic {
    #[serde(flatten)]
    discussion: DiscussionWithStats,
    is_liked: bool,
}

#[derive(serde::Deserialize)]
struct DiscussionCreate {
    title: String,
    content: String,
    #[serde(default)]
    category_id: Option<i32>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(serde::Deserialize)]
struct DiscussionUpdate {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    is_pinned: Option<bool>,
    #[serde(default)]
    is_locked: Option<bool>,
}

const WITH_STATS_COLUMNS: &str = "d.id, d.user_id, d.category_id, d.title, d.body, d.tags, \
    d.is_pinned, d.is_locked, d.view_count, d.created_at, d.updated_at, \
    u.username AS author_username, u.avatar_url AS author_avatar, \
    u.display_name AS author_display_name, dc.name AS category_name, \
    COALESCE(ds.comment_count, 0) AS comment_count, \
    COALESCE(ds.like_count, 0) AS like_count, \
    ds.last_comment_at";

const WITH_STATS_JOINS: &str = "FROM discussions d \
    JOIN users u ON u.id = d.user_id \
    LEFT JOIN discussion_categories dc ON dc.id = d.category_id \
    LEFT JOIN discussion_stats ds ON ds.discussion_id = d.id";

/// The discussion ids the viewer has liked, out of `ids`.
async fn liked_ids(
    global: &Arc<GlobalState>,
    user_id: &str,
    ids: &[Uuid],
) -> Result<HashSet<Uuid>> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }

    let liked: Vec<Uuid> = sqlx::query_scalar(
        "SELECT discussion_id FROM likes WHERE user_id = $1 AND discussion_id = ANY($2)",
    )
    .bind(user_id)
    .bind(ids)
    .fetch_all(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch likes"))?;

    Ok(liked.into_iter().collect())
}

async fn enrich(
    global: &Arc<GlobalState>,
    viewer: Option<&str>,
    discussions: Vec<DiscussionWithStats>,
) -> Result<Vec<DiscussionPublic>> {
    let liked = match viewer {
        Some(user_id) => {
            let ids: Vec<Uuid> = discussions.iter().map(|d| d.id).collect();
            liked_ids(global, user_id, &ids).await?
        }
        None => HashSet::new(),
    };

    Ok(discussions
        .into_iter()
        .map(|discussion| DiscussionPublic {
            is_liked: liked.contains(&discussion.id),
            discussion,
        })
        .collect())
}

async fn list(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.auth().await;

    let params = query_params(&req);
    let page = Pagination::from_query(&params);

    let sort = DiscussionSort::parse(params.get("sortBy").map(String::as_str).unwrap_or_default());
    let descending = params
        .get("sortOrder")
        .map(|order| !order.eq_ignore_ascii_case("asc"))
        .unwrap_or(true);

    let user_ids = query_param_values(&req, "user_ids");
    let user_ids = (!user_ids.is_empty()).then_some(user_ids);

    let sql = format!(
        "SELECT {WITH_STATS_COLUMNS} {WITH_STATS_JOINS}
        WHERE ($3::TEXT[] IS NULL OR d.user_id = ANY($3))
        ORDER BY {} {}
        LIMIT $1 OFFSET $2",
        sort.column(),
        if descending { "DESC" } else { "ASC" },
    );

    let discussions: Vec<DiscussionWithStats> = sqlx::query_as(&sql)
        .bind(page.limit)
        .bind(page.offset)
        .bind(user_ids)
        .fetch_all(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch discussions"))?;

    let discussions = enrich(&global, auth.as_ref().map(|a| a.user_id.as_str()), discussions).await?;

    json_response(StatusCode::OK, &discussions)
}

async fn feed(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;

    // The feed of an anonymous viewer is empty, not an error
    let Some(auth) = req.auth().await else {
        return json_response::<[DiscussionPublic]>(StatusCode::OK, &[]);
    };

    let params = query_params(&req);
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(Pagination::DEFAULT_LIMIT)
        .clamp(1, Pagination::MAX_LIMIT);
    let page = params
        .get("page")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0)
        .max(0);

    let discussions: Vec<DiscussionWithStats> =
        sqlx::query_as("SELECT * FROM get_feed_discussions($1, $2, $3)")
            .bind(&auth.user_id)
            .bind(limit as i32)
            .bind((page * limit) as i32)
            .fetch_all(&*global.db)
            .await
            .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch feed"))?;

    let discussions = enrich(&global, Some(auth.user_id.as_str()), discussions).await?;

    json_response(StatusCode::OK, &discussions)
}

async fn batch(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.auth().await;
    let ids: Vec<Uuid> = parse_json_body(req).await?;

    if ids.is_empty() || ids.len() > 50 {
        return Err((StatusCode::BAD_REQUEST, "Invalid number of discussion IDs (1-50)").into());
    }

    let sql = format!(
        "SELECT {WITH_STATS_COLUMNS} {WITH_STATS_JOINS}
        WHERE d.id = ANY($1)
        ORDER BY d.created_at DESC",
    );

    let discussions: Vec<DiscussionWithStats> = sqlx::query_as(&sql)
        .bind(&ids)
        .fetch_all(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch discussions"))?;

    let discussions = enrich(&global, auth.as_ref().map(|a| a.user_id.as_str()), discussions).await?;

    json_response(StatusCode::OK, &discussions)
}

fn parse_discussion_id(req: &Request<Body>) -> Result<Uuid> {
    req.param("discussion_id")
        .expect("discussion_id param missing")
        .parse::<Uuid>()
        .map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid discussion id"))
}

async fn fetch_with_stats(
    global: &Arc<GlobalState>,
    discussion_id: Uuid,
) -> Result<Option<DiscussionWithStats>> {
    sqlx::query_as("SELECT * FROM get_discussion_with_stats($1)")
        .bind(discussion_id)
        .fetch_optional(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch discussion"))
}

async fn get(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.auth().await;
    let discussion_id = parse_discussion_id(&req)?;

    let discussion = fetch_with_stats(&global, discussion_id)
        .await?
        .map_err_route((StatusCode::NOT_FOUND, "Discussion not found"))?;

    sqlx::query("UPDATE discussions SET view_count = view_count + 1 WHERE id = $1")
        .bind(discussion_id)
        .execute(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to update view count"))?;

    let is_liked = match &auth {
        Some(auth) => !liked_ids(&global, &auth.user_id, &[discussion_id])
            .await?
            .is_empty(),
        None => false,
    };

    json_response(StatusCode::OK, &DiscussionPublic { discussion, is_liked })
}

async fn create(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let request: DiscussionCreate = parse_json_body(req).await?;

    if request.title.is_empty() || request.title.len() > 200 {
        return Err((StatusCode::BAD_REQUEST, "Title must be 1 to 200 characters long").into());
    }
    if request.content.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Content must not be empty").into());
    }

    // Zero means uncategorized, like a missing category
    let category_id = request.category_id.filter(|id| *id != 0);

    if let Some(category_id) = category_id {
        sqlx::query_scalar::<_, i32>("SELECT id FROM discussion_categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(&*global.db)
            .await
            .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch category"))?
            .map_err_route((StatusCode::BAD_REQUEST, "Unknown category"))?;
    }

    let discussion_id: Uuid = sqlx::query_scalar(
        "INSERT INTO discussions (id, user_id, category_id, title, body, tags)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(&auth.user_id)
    .bind(category_id)
    .bind(&request.title)
    .bind(&request.content)
    .bind(&request.tags)
    .fetch_one(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "Failed to create discussion"))?;

    let discussion = fetch_with_stats(&global, discussion_id)
        .await?
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch discussion"))?;

    json_response(
        StatusCode::OK,
        &DiscussionPublic {
            discussion,
            is_liked: false,
        },
    )
}

async fn fetch_owned(global: &Arc<GlobalState>, discussion_id: Uuid, user_id: &str) -> Result<()> {
    let owner: Option<(String,)> = sqlx::query_as("SELECT user_id FROM discussions WHERE id = $1")
        .bind(discussion_id)
        .fetch_optional(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch discussion"))?;

    let (owner,) = owner.map_err_route((StatusCode::NOT_FOUND, "Discussion not found"))?;

    if owner != user_id {
        return Err((StatusCode::FORBIDDEN, "You do not own this discussion").into());
    }

    Ok(())
}

async fn update(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let discussion_id = parse_discussion_id(&req)?;
    let request: DiscussionUpdate = parse_json_body(req).await?;

    if let Some(title) = &request.title {
        if title.is_empty() || title.len() > 200 {
            return Err((StatusCode::BAD_REQUEST, "Title must be 1 to 200 characters long").into());
        }
    }
    if let Some(content) = &request.content {
        if content.is_empty() {
            return Err((StatusCode::BAD_REQUEST, "Content must not be empty").into());
        }
    }

    fetch_owned(&global, discussion_id, &auth.user_id).await?;

    sqlx::query(
        "UPDATE discussions SET
            title = COALESCE($2, title),
            body = COALESCE($3, body),
            tags = COALESCE($4, tags),
            is_pinned = COALESCE($5, is_pinned),
            is_locked = COALESCE($6, is_locked),
            updated_at = NOW()
        WHERE id = $1",
    )
    .bind(discussion_id)
    .bind(request.title)
    .bind(request.content)
    .bind(request.tags)
    .bind(request.is_pinned)
    .bind(request.is_locked)
    .execute(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "failed to update discussion"))?;

    let discussion = fetch_with_stats(&global, discussion_id)
        .await?
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch discussion"))?;

    let is_liked = !liked_ids(&global, &auth.user_id, &[discussion_id])
        .await?
        .is_empty();

    json_response(StatusCode::OK, &DiscussionPublic { discussion, is_liked })
}

async fn delete(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let discussion_id = parse_discussion_id(&req)?;

    fetch_owned(&global, discussion_id, &auth.user_id).await?;

    sqlx::query("DELETE FROM discussions WHERE id = $1")
        .bind(discussion_id)
        .execute(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to delete discussion"))?;

    Ok(make_response!(
        StatusCode::OK,
        json!({ "message": "Discussion deleted successfully" })
    ))
}

pub fn routes(_: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .get("/", list)
        .post("/", create)
        .get("/feed", feed)
        .post("/batch", batch)
        .get("/:discussion_id", get)
        .patch("/:discussion_id", update)
        .delete("/:discussion_id", delete)
        .build()
        .expect("failed to build router")
}
