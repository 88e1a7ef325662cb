use std::sync::Arc;

use common::http::ext::{RequestGlobalExt, ResultExt};
use common::http::RouteError;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;
use serde_json::json;

use crate::api::error::{ApiError, Result};
use crate::api::ext::{json_response, RequestExt};
use crate::database::User;
use crate::global::GlobalState;

async fn me(req: Request<Body>) -> Result<Response<Body>> {
    let auth = req.require_auth().await?;

    Ok(make_response!(
        StatusCode::OK,
        json!({
            "user_id": auth.user_id,
            "email": auth.email,
            "name": auth.name,
            "authenticated": true,
        })
    ))
}

/// Creates the database user for the token subject if it does not exist yet,
/// deriving the username from the email local part.
async fn sync_user(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(&auth.user_id)
        .fetch_optional(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch user"))?;

    if let Some(user) = existing {
        return json_response(StatusCode::OK, &user);
    }

    let name = auth.name.clone().unwrap_or_default();
    let username = auth
        .email
        .as_deref()
        .and_then(|email| email.split('@').next())
        .filter(|local| !local.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| format!("user_{}", auth.user_id.chars().take(8).collect::<String>()));

    let username = super::users::resolve_username(&global, &username).await?;

    let display_name = if name.is_empty() { username.clone() } else { name };

    let user: User = sqlx::query_as(
        "INSERT INTO users (id, username, display_name, email)
        VALUES ($1, $2, $3, $4)
        RETURNING *",
    )
    .bind(&auth.user_id)
    .bind(&username)
    .bind(&display_name)
    .bind(auth.email.as_deref().unwrap_or_default())
    .fetch_one(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "Failed to create user"))?;

    json_response(StatusCode::OK, &user)
}

async fn verify_token(req: Request<Body>) -> Result<Response<Body>> {
    let auth = req.require_auth().await?;

    Ok(make_response!(
        StatusCode::OK,
        json!({
            "valid": true,
            "user_id": auth.user_id,
        })
    ))
}

pub fn routes(_: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .get("/me", me)
        .post("/sync-user", sync_user)
        .get("/verify-token", verify_token)
        .build()
        .expect("failed to build router")
}
