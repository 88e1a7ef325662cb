use std::sync::Arc;

use common::http::ext::{OptionExt, RequestGlobalExt, ResultExt};
use common::http::RouteError;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use rand::Rng;
use routerify::prelude::RequestExt as _;
use routerify::Router;
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{ApiError, Result};
use crate::api::ext::{json_response, parse_json_body, query_params, Pagination};
use crate::database::{User, UserStats, UserSummary};
use crate::global::GlobalState;

#[derive(serde::Serialize)]
struct UserPublic {
    #[serde(flatten)]
    user: User,
    #[serde(flatten)]
    stats: UserStats,
}

#[derive(serde::Deserialize)]
struct UserSyncRequest {
    /// The identity provider's user id.
    provider_id: String,
    email: String,
    username: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    avatar_url: String,
}

#[derive(serde::Deserialize)]
struct UserCreate {
    username: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    expertise_level: Option<String>,
    #[serde(default)]
    website_url: Option<String>,
    #[serde(default)]
    instagram_url: Option<String>,
}

#[derive(serde::Deserialize)]
struct UserUpdate {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    expertise_level: Option<String>,
    #[serde(default)]
    website_url: Option<String>,
    #[serde(default)]
    instagram_url: Option<String>,
}

#[derive(serde::Deserialize)]
struct FollowRequest {
    follower_id: String,
}

async fn fetch_stats(global: &Arc<GlobalState>, user_id: &str) -> Result<UserStats> {
    sqlx::query_as(
        "SELECT
            (SELECT COUNT(*) FROM cameras WHERE user_id = $1) AS camera_count,
            (SELECT COUNT(*) FROM discussions WHERE user_id = $1) AS discussion_count,
            (SELECT COUNT(*) FROM follows WHERE following_id = $1) AS follower_count,
            (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS following_count",
    )
    .bind(user_id)
    .fetch_one(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch user stats"))
}

async fn username_taken(
    global: &Arc<GlobalState>,
    username: &str,
    exclude: Option<&str>,
) -> Result<bool> {
    let owner: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to check username"))?;

    Ok(match owner {
        Some((id,)) => exclude != Some(id.as_str()),
        None => false,
    })
}

/// Picks a free username, suffixing the requested one with a random number
/// until it no longer collides.
pub(super) async fn resolve_username(global: &Arc<GlobalState>, requested: &str) -> Result<String> {
    if !username_taken(global, requested, None).await? {
        return Ok(requested.to_string());
    }

    for _ in 0..10 {
        let candidate = format!("{}_{}", requested, rand::thread_rng().gen_range(1000..10000));
        if !username_taken(global, &candidate, None).await? {
            return Ok(candidate);
        }
    }

    Err((StatusCode::BAD_REQUEST, "Failed to allocate a unique username").into())
}

async fn sync(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let request: UserSyncRequest = parse_json_body(req).await?;

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(&request.provider_id)
        .fetch_optional(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch user"))?;

    if let Some(existing) = existing {
        // Keep the current username if the requested one belongs to someone else
        let username = if existing.username != request.username
            && username_taken(&global, &request.username, Some(&existing.id)).await?
        {
            existing.username.clone()
        } else {
            request.username.clone()
        };

        let display_name = if request.full_name.is_empty() {
            existing.display_name.clone()
        } else {
            request.full_name.clone()
        };
        let avatar_url = if request.avatar_url.is_empty() {
            existing.avatar_url.clone()
        } else {
            request.avatar_url.clone()
        };

        sqlx::query(
            "UPDATE users
            SET email = $2, username = $3, display_name = $4, avatar_url = $5, updated_at = NOW()
            WHERE id = $1",
        )
        .bind(&existing.id)
        .bind(&request.email)
        .bind(&username)
        .bind(&display_name)
        .bind(&avatar_url)
        .execute(&*global.db)
        .await
        .map_err_route((StatusCode::BAD_REQUEST, "failed to update user"))?;

        return Ok(make_response!(
            StatusCode::OK,
            json!({
                "message": "User updated successfully",
                "user_id": existing.id,
                "provider_id": request.provider_id,
            })
        ));
    }

    let username = resolve_username(&global, &request.username).await?;
    let display_name = if request.full_name.is_empty() {
        username.clone()
    } else {
        request.full_name.clone()
    };

    let user: User = sqlx::query_as(
        "INSERT INTO users (id, email, username, display_name, avatar_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *",
    )
    .bind(&request.provider_id)
    .bind(&request.email)
    .bind(&username)
    .bind(&display_name)
    .bind(&request.avatar_url)
    .fetch_one(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "Failed to create user"))?;

    Ok(make_response!(
        StatusCode::OK,
        json!({
            "message": "User created successfully",
            "user_id": user.id,
            "provider_id": request.provider_id,
        })
    ))
}

async fn create(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let request: UserCreate = parse_json_body(req).await?;

    User::validate_username(&request.username)
        .map_err(|err| (StatusCode::BAD_REQUEST, err))
        .map_err(RouteError::from)?;
    User::validate_email(&request.email)
        .map_err(|err| (StatusCode::BAD_REQUEST, err))
        .map_err(RouteError::from)?;
    if let Some(level) = &request.expertise_level {
        User::validate_expertise_level(level)
            .map_err(|err| (StatusCode::BAD_REQUEST, err))
            .map_err(RouteError::from)?;
    }

    if username_taken(&global, &request.username, None).await? {
        return Err((StatusCode::BAD_REQUEST, "Username already exists").into());
    }

    let user: User = sqlx::query_as(
        "INSERT INTO users (
            id, username, email, display_name, bio, avatar_url, location,
            expertise_level, website_url, instagram_url
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&request.username)
    .bind(&request.email)
    .bind(request.display_name.as_deref().unwrap_or(&request.username))
    .bind(request.bio.unwrap_or_default())
    .bind(request.avatar_url.unwrap_or_default())
    .bind(request.location.unwrap_or_default())
    .bind(request.expertise_level.as_deref().unwrap_or("beginner"))
    .bind(request.website_url)
    .bind(request.instagram_url)
    .fetch_one(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "Failed to create user"))?;

    json_response(
        StatusCode::OK,
        &UserPublic {
            user,
            stats: UserStats::default(),
        },
    )
}

async fn list(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let page = Pagination::from_query(&query_params(&req));

    let users: Vec<User> =
        sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&*global.db)
            .await
            .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch users"))?;

    json_response(StatusCode::OK, &users)
}

async fn get(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let user_id = req.param("user_id").expect("user_id param missing");

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch user"))?
        .map_err_route((StatusCode::NOT_FOUND, "User not found"))?;

    let stats = fetch_stats(&global, &user.id).await?;

    json_response(StatusCode::OK, &UserPublic { user, stats })
}

async fn get_by_username(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let username = req.param("username").expect("username param missing");

    let user: User = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch user"))?
        .map_err_route((StatusCode::NOT_FOUND, "User not found"))?;

    let stats = fetch_stats(&global, &user.id).await?;

    json_response(StatusCode::OK, &UserPublic { user, stats })
}

async fn update(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let user_id = req
        .param("user_id")
        .expect("user_id param missing")
        .clone();
    let request: UserUpdate = parse_json_body(req).await?;

    if let Some(username) = &request.username {
        User::validate_username(username)
            .map_err(|err| (StatusCode::BAD_REQUEST, err))
            .map_err(RouteError::from)?;

        if username_taken(&global, username, Some(user_id.as_str())).await? {
            return Err((StatusCode::BAD_REQUEST, "Username already exists").into());
        }
    }
    if let Some(email) = &request.email {
        User::validate_email(email)
            .map_err(|err| (StatusCode::BAD_REQUEST, err))
            .map_err(RouteError::from)?;
    }
    if let Some(level) = &request.expertise_level {
        User::validate_expertise_level(level)
            .map_err(|err| (StatusCode::BAD_REQUEST, err))
            .map_err(RouteError::from)?;
    }

    let user: User = sqlx::query_as(
        "UPDATE users SET
            username = COALESCE($2, username),
            email = COALESCE($3, email),
            display_name = COALESCE($4, display_name),
            bio = COALESCE($5, bio),
            avatar_url = COALESCE($6, avatar_url),
            location = COALESCE($7, location),
            expertise_level = COALESCE($8, expertise_level),
            website_url = COALESCE($9, website_url),
            instagram_url = COALESCE($10, instagram_url),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *",
    )
    .bind(&user_id)
    .bind(request.username)
    .bind(request.email)
    .bind(request.display_name)
    .bind(request.bio)
    .bind(request.avatar_url)
    .bind(request.location)
    .bind(request.expertise_level)
    .bind(request.website_url)
    .bind(request.instagram_url)
    .fetch_optional(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "failed to update user"))?
    .map_err_route((StatusCode::NOT_FOUND, "User not found"))?;

    let stats = fetch_stats(&global, &user.id).await?;

    json_response(StatusCode::OK, &UserPublic { user, stats })
}

async fn followers(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let user_id = req.param("user_id").expect("user_id param missing");

    let followers: Vec<UserSummary> = sqlx::query_as(
        "SELECT u.id, u.username, u.display_name, u.avatar_url, u.bio
        FROM follows f
        JOIN users u ON u.id = f.follower_id
        WHERE f.following_id = $1
        ORDER BY f.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch followers"))?;

    json_response(StatusCode::OK, &followers)
}

async fn following(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let user_id = req.param("user_id").expect("user_id param missing");

    let following: Vec<UserSummary> = sqlx::query_as(
        "SELECT u.id, u.username, u.display_name, u.avatar_url, u.bio
        FROM follows f
        JOIN users u ON u.id = f.following_id
        WHERE f.follower_id = $1
        ORDER BY f.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch following"))?;

    json_response(StatusCode::OK, &following)
}

async fn follow(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let user_id = req
        .param("user_id")
        .expect("user_id param missing")
        .clone();
    let request: FollowRequest = parse_json_body(req).await?;

    if user_id == request.follower_id {
        return Err((StatusCode::BAD_REQUEST, "Cannot follow yourself").into());
    }

    let result = sqlx::query(
        "INSERT INTO follows (id, follower_id, following_id)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(&request.follower_id)
    .bind(&user_id)
    .execute(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "failed to create follow relationship"))?;

    if result.rows_affected() == 0 {
        return Err((StatusCode::BAD_REQUEST, "Already following this user").into());
    }

    Ok(make_response!(
        StatusCode::OK,
        json!({ "message": "Successfully followed user" })
    ))
}

async fn unfollow(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let user_id = req
        .param("user_id")
        .expect("user_id param missing")
        .clone();
    let request: FollowRequest = parse_json_body(req).await?;

    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(&request.follower_id)
        .bind(&user_id)
        .execute(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to delete follow"))?;

    if result.rows_affected() == 0 {
        return Err((StatusCode::NOT_FOUND, "Follow relationship not found").into());
    }

    Ok(make_response!(
        StatusCode::OK,
        json!({ "message": "Successfully unfollowed user" })
    ))
}

pub fn routes(_: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .post("/sync", sync)
        .post("/", create)
        .get("/", list)
        .get("/username/:username", get_by_username)
        .get("/:user_id", get)
        .patch("/:user_id", update)
        .get("/:user_id/followers", followers)
        .get("/:user_id/following", following)
        .post("/:user_id/follow", follow)
        .delete("/:user_id/unfollow", unfollow)
        .build()
        .expect("failed to build router")
}
