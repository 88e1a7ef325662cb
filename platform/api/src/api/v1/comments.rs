use std::collections::{HashMap, HashSet};
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
use crate::api::ext::{json_response, parse_json_body, query_params, RequestExt};
use crate::database::{CommentTarget, CommentWithAuthor};
use crate::global::GlobalState;

#[derive(serde::Serialize)]
struct CommentPublic {
    #[serde(flatten)]
    comment: CommentWithAuthor,
    is_liked: bool,
    replies: Vec<CommentPublic>,
}

#[derive(serde::Deserialize)]
struct CommentCreate {
    body: String,
    #[serde(default)]
    discussion_id: Option<Uuid>,
    #[serde(default)]
    camera_id: Option<Uuid>,
    #[serde(default)]
    parent_id: Option<Uuid>,
}

#[derive(serde::Deserialize)]
struct CommentUpdate {
    body: String,
}

/// Nests comments under their parents, preserving creation order at every
/// level.
fn build_thread(
    comments: Vec<CommentWithAuthor>,
    liked: &HashSet<Uuid>,
) -> Vec<CommentPublic> {
    let mut by_parent: HashMap<Option<Uuid>, Vec<CommentWithAuthor>> = HashMap::new();
    for comment in comments {
        by_parent.entry(comment.parent_id).or_default().push(comment);
    }

    fn build(
        parent: Option<Uuid>,
        by_parent: &mut HashMap<Option<Uuid>, Vec<CommentWithAuthor>>,
        liked: &HashSet<Uuid>,
    ) -> Vec<CommentPublic> {
        by_parent
            .remove(&parent)
            .unwrap_or_default()
            .into_iter()
            .map(|comment| {
                let id = comment.id;
                CommentPublic {
                    is_liked: liked.contains(&id),
                    replies: build(Some(id), by_parent, liked),
                    comment,
                }
            })
            .collect()
    }

    build(None, &mut by_parent, liked)
}

async fn list(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.auth().await;
    let params = query_params(&req);

    let discussion_id = params
        .get("discussion_id")
        .map(|v| v.parse::<Uuid>())
        .transpose()
        .map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid discussion id"))?;
    let camera_id = params
        .get("camera_id")
        .map(|v| v.parse::<Uuid>())
        .transpose()
        .map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid camera id"))?;

    let target = CommentTarget::from_parts(discussion_id, camera_id).ok_or((
        StatusCode::BAD_REQUEST,
        "Exactly one of discussion_id or camera_id must be provided",
    ))?;

    let comments: Vec<CommentWithAuthor> = sqlx::query_as(
        "SELECT c.*, u.username AS author_username, u.avatar_url AS author_avatar,
            (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id) AS like_count
        FROM comments c
        JOIN users u ON u.id = c.user_id
        WHERE ($1::UUID IS NULL OR c.discussion_id = $1)
            AND ($2::UUID IS NULL OR c.camera_id = $2)
        ORDER BY c.created_at",
    )
    .bind(target.discussion_id())
    .bind(target.camera_id())
    .fetch_all(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch comments"))?;

    let liked = match &auth {
        Some(auth) => {
            let ids: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
            if ids.is_empty() {
                HashSet::new()
            } else {
                sqlx::query_scalar::<_, Uuid>(
                    "SELECT comment_id FROM likes WHERE user_id = $1 AND comment_id = ANY($2)",
                )
                .bind(&auth.user_id)
                .bind(&ids)
                .fetch_all(&*global.db)
                .await
                .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch likes"))?
                .into_iter()
                .collect()
            }
        }
        None => HashSet::new(),
    };

    json_response(StatusCode::OK, &build_thread(comments, &liked))
}

async fn create(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let request: CommentCreate = parse_json_body(req).await?;

    if request.body.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Comment body must not be empty").into());
    }

    let target = CommentTarget::from_parts(request.discussion_id, request.camera_id).ok_or((
        StatusCode::BAD_REQUEST,
        "Exactly one of discussion_id or camera_id must be provided",
    ))?;

    match target {
        CommentTarget::Discussion(id) => {
            let is_locked: bool = sqlx::query_scalar("SELECT is_locked FROM discussions WHERE id = $1")
                .bind(id)
                .fetch_optional(&*global.db)
                .await
                .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch discussion"))?
                .map_err_route((StatusCode::NOT_FOUND, "Content not found"))?;

            if is_locked {
                return Err((StatusCode::FORBIDDEN, "Discussion is locked").into());
            }
        }
        CommentTarget::Camera(id) => {
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM cameras WHERE id = $1")
                .bind(id)
                .fetch_optional(&*global.db)
                .await
                .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch camera"))?
                .map_err_route((StatusCode::NOT_FOUND, "Content not found"))?;
        }
    }

    if let Some(parent_id) = request.parent_id {
        let parent: (Option<Uuid>, Option<Uuid>) =
            sqlx::query_as("SELECT discussion_id, camera_id FROM comments WHERE id = $1")
                .bind(parent_id)
                .fetch_optional(&*global.db)
                .await
                .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch parent comment"))?
                .map_err_route((StatusCode::NOT_FOUND, "Parent comment not found"))?;

        if CommentTarget::from_parts(parent.0, parent.1) != Some(target) {
            return Err((
                StatusCode::BAD_REQUEST,
                "Parent comment does not belong to the same thread",
            )
                .into());
        }
    }

    let comment: CommentWithAuthor = sqlx::query_as(
        "WITH inserted AS (
            INSERT INTO comments (id, user_id, discussion_id, camera_id, parent_id, body)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        )
        SELECT i.*, u.username AS author_username, u.avatar_url AS author_avatar,
            0::BIGINT AS like_count
        FROM inserted i
        JOIN users u ON u.id = i.user_id",
    )
    .bind(Uuid::new_v4())
    .bind(&auth.user_id)
    .bind(target.discussion_id())
    .bind(target.camera_id())
    .bind(request.parent_id)
    .bind(&request.body)
    .fetch_one(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "Failed to create comment"))?;

    json_response(
        StatusCode::OK,
        &CommentPublic {
            comment,
            is_liked: false,
            replies: Vec::new(),
        },
    )
}

fn parse_comment_id(req: &Request<Body>) -> Result<Uuid> {
    req.param("comment_id")
        .expect("comment_id param missing")
        .parse::<Uuid>()
        .map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid comment id"))
}

async fn fetch_owned(global: &Arc<GlobalState>, comment_id: Uuid, user_id: &str) -> Result<()> {
    let owner: Option<(String,)> = sqlx::query_as("SELECT user_id FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch comment"))?;

    let (owner,) = owner.map_err_route((StatusCode::NOT_FOUND, "Comment not found"))?;

    if owner != user_id {
        return Err((StatusCode::FORBIDDEN, "You do not own this comment").into());
    }

    Ok(())
}

async fn update(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let comment_id = parse_comment_id(&req)?;
    let request: CommentUpdate = parse_json_body(req).await?;

    if request.body.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Comment body must not be empty").into());
    }

    fetch_owned(&global, comment_id, &auth.user_id).await?;

    let comment: CommentWithAuthor = sqlx::query_as(
        "WITH updated AS (
            UPDATE comments
            SET body = $2, is_edited = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING *
        )
        SELECT c.*, u.username AS author_username, u.avatar_url AS author_avatar,
            (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id) AS like_count
        FROM updated c
        JOIN users u ON u.id = c.user_id",
    )
    .bind(comment_id)
    .bind(&request.body)
    .fetch_one(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to update comment"))?;

    let is_liked: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = $1 AND comment_id = $2)",
    )
    .bind(&auth.user_id)
    .bind(comment_id)
    .fetch_one(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch likes"))?;

    json_response(
        StatusCode::OK,
        &CommentPublic {
            comment,
            is_liked,
            replies: Vec::new(),
        },
    )
}

async fn delete(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let comment_id = parse_comment_id(&req)?;

    fetch_owned(&global, comment_id, &auth.user_id).await?;

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to delete comment"))?;

    Ok(make_response!(
        StatusCode::OK,
        json!({ "message": "Comment deleted successfully" })
    ))
}

pub fn routes(_: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .get("/", list)
        .post("/", create)
        .patch("/:comment_id", update)
        .delete("/:comment_id", delete)
        .build()
        .expect("failed to build router")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn comment(
        id: Uuid,
        parent_id: Option<Uuid>,
        body: &str,
    ) -> CommentWithAuthor {
        CommentWithAuthor {
            id,
            user_id: "user_1".to_string(),
            discussion_id: Some(Uuid::new_v4()),
            camera_id: None,
            parent_id,
            body: body.to_string(),
            is_edited: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            author_username: "ansel".to_string(),
            author_avatar: String::new(),
            like_count: 0,
        }
    }

    #[test]
    fn test_build_thread() {
        let root_a = Uuid::new_v4();
        let root_b = Uuid::new_v4();
        let reply = Uuid::new_v4();
        let nested = Uuid::new_v4();

        let thread = build_thread(
            vec![
                comment(root_a, None, "first"),
                comment(root_b, None, "second"),
                comment(reply, Some(root_a), "reply"),
                comment(nested, Some(reply), "nested"),
            ],
            &HashSet::from([reply]),
        );

        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].comment.id, root_a);
        assert_eq!(thread[1].comment.id, root_b);

        assert_eq!(thread[0].replies.len(), 1);
        assert_eq!(thread[0].replies[0].comment.id, reply);
        assert!(thread[0].replies[0].is_liked);

        assert_eq!(thread[0].replies[0].replies.len(), 1);
        assert_eq!(thread[0].replies[0].replies[0].comment.id, nested);

        assert!(thread[1].replies.is_empty());
    }

    #[test]
    fn test_build_thread_orphan_replies_are_dropped() {
        let thread = build_thread(
            vec![comment(Uuid::new_v4(), Some(Uuid::new_v4()), "orphan")],
            &HashSet::new(),
        );

        assert!(thread.is_empty());
    }
}
