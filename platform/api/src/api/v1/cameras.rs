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
use crate::api::ext::{json_response, parse_json_body, query_params, Pagination, RequestExt};
use crate::database::{Camera, CameraImage};
use crate::global::GlobalState;

#[derive(serde::Serialize)]
struct CameraPublic {
    #[serde(flatten)]
    camera: Camera,
    images: Vec<CameraImage>,
    owner_username: Option<String>,
    owner_avatar: Option<String>,
}

#[derive(serde::Deserialize)]
struct CameraCreate {
    brand_name: String,
    model: String,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    camera_type: Option<String>,
    #[serde(default)]
    film_format: Option<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    acquisition_story: Option<String>,
    #[serde(default)]
    technical_specs: Option<serde_json::Value>,
    #[serde(default)]
    market_value_min: Option<f64>,
    #[serde(default)]
    market_value_max: Option<f64>,
    #[serde(default)]
    is_for_sale: bool,
    #[serde(default)]
    is_for_trade: bool,
    #[serde(default = "default_true")]
    is_public: bool,
}

fn default_true() -> bool {
    true
}

#[derive(serde::Deserialize)]
struct CameraUpdate {
    #[serde(default)]
    brand_name: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    camera_type: Option<String>,
    #[serde(default)]
    film_format: Option<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    acquisition_story: Option<String>,
    #[serde(default)]
    technical_specs: Option<serde_json::Value>,
    #[serde(default)]
    market_value_min: Option<f64>,
    #[serde(default)]
    market_value_max: Option<f64>,
    #[serde(default)]
    is_for_sale: Option<bool>,
    #[serde(default)]
    is_for_trade: Option<bool>,
    #[serde(default)]
    is_public: Option<bool>,
}

#[derive(serde::Deserialize)]
struct CameraImageCreate {
    image_url: String,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    is_primary: bool,
    #[serde(default)]
    display_order: i32,
}

fn parse_camera_id(req: &Request<Body>) -> Result<Uuid> {
    req.param("camera_id")
        .expect("camera_id param missing")
        .parse::<Uuid>()
        .map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid camera id"))
}

/// Fetches the camera's owner, enforcing that the authenticated user is it.
async fn fetch_owned(global: &Arc<GlobalState>, camera_id: Uuid, user_id: &str) -> Result<()> {
    let owner: Option<(String,)> = sqlx::query_as("SELECT user_id FROM cameras WHERE id = $1")
        .bind(camera_id)
        .fetch_optional(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch camera"))?;

    let (owner,) = owner.map_err_route((StatusCode::NOT_FOUND, "Camera not found"))?;

    if owner != user_id {
        return Err((StatusCode::FORBIDDEN, "You do not own this camera").into());
    }

    Ok(())
}

async fn list(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let page = Pagination::from_query(&query_params(&req));

    let cameras: Vec<Camera> = sqlx::query_as(
        "SELECT * FROM cameras WHERE is_public = TRUE ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch cameras"))?;

    json_response(StatusCode::OK, &cameras)
}

async fn get(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let camera_id = parse_camera_id(&req)?;

    let camera: Camera = sqlx::query_as("SELECT * FROM cameras WHERE id = $1")
        .bind(camera_id)
        .fetch_optional(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch camera"))?
        .map_err_route((StatusCode::NOT_FOUND, "Camera not found"))?;

    let images: Vec<CameraImage> = sqlx::query_as(
        "SELECT * FROM camera_images WHERE camera_id = $1 ORDER BY display_order, created_at",
    )
    .bind(camera_id)
    .fetch_all(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch camera images"))?;

    let owner: Option<(String, String)> =
        sqlx::query_as("SELECT username, avatar_url FROM users WHERE id = $1")
            .bind(&camera.user_id)
            .fetch_optional(&*global.db)
            .await
            .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch camera owner"))?;

    sqlx::query("UPDATE cameras SET view_count = view_count + 1 WHERE id = $1")
        .bind(camera_id)
        .execute(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to update view count"))?;

    let (owner_username, owner_avatar) = owner.map(|(u, a)| (Some(u), Some(a))).unwrap_or_default();

    json_response(
        StatusCode::OK,
        &CameraPublic {
            camera,
            images,
            owner_username,
            owner_avatar,
        },
    )
}

async fn create(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let request: CameraCreate = parse_json_body(req).await?;

    if request.brand_name.is_empty() || request.model.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "brand_name and model are required").into());
    }

    if let Some(condition) = &request.condition {
        Camera::validate_condition(condition)
            .map_err(|err| (StatusCode::BAD_REQUEST, err))
            .map_err(RouteError::from)?;
    }

    let camera: Camera = sqlx::query_as(
        "INSERT INTO cameras (
            id, user_id, brand_name, model, year, camera_type, film_format,
            condition, acquisition_story, technical_specs, market_value_min,
            market_value_max, is_for_sale, is_for_trade, is_public
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&auth.user_id)
    .bind(&request.brand_name)
    .bind(&request.model)
    .bind(request.year)
    .bind(request.camera_type)
    .bind(request.film_format)
    .bind(request.condition)
    .bind(request.acquisition_story)
    .bind(request.technical_specs)
    .bind(request.market_value_min)
    .bind(request.market_value_max)
    .bind(request.is_for_sale)
    .bind(request.is_for_trade)
    .bind(request.is_public)
    .fetch_one(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "Failed to create camera"))?;

    json_response(
        StatusCode::OK,
        &CameraPublic {
            camera,
            images: Vec::new(),
            owner_username: None,
            owner_avatar: None,
        },
    )
}

async fn update(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let camera_id = parse_camera_id(&req)?;
    let request: CameraUpdate = parse_json_body(req).await?;

    if let Some(condition) = &request.condition {
        Camera::validate_condition(condition)
            .map_err(|err| (StatusCode::BAD_REQUEST, err))
            .map_err(RouteError::from)?;
    }

    fetch_owned(&global, camera_id, &auth.user_id).await?;

    let camera: Camera = sqlx::query_as(
        "UPDATE cameras SET
            brand_name = COALESCE($2, brand_name),
            model = COALESCE($3, model),
            year = COALESCE($4, year),
            camera_type = COALESCE($5, camera_type),
            film_format = COALESCE($6, film_format),
            condition = COALESCE($7, condition),
            acquisition_story = COALESCE($8, acquisition_story),
            technical_specs = COALESCE($9, technical_specs),
            market_value_min = COALESCE($10, market_value_min),
            market_value_max = COALESCE($11, market_value_max),
            is_for_sale = COALESCE($12, is_for_sale),
            is_for_trade = COALESCE($13, is_for_trade),
            is_public = COALESCE($14, is_public),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *",
    )
    .bind(camera_id)
    .bind(request.brand_name)
    .bind(request.model)
    .bind(request.year)
    .bind(request.camera_type)
    .bind(request.film_format)
    .bind(request.condition)
    .bind(request.acquisition_story)
    .bind(request.technical_specs)
    .bind(request.market_value_min)
    .bind(request.market_value_max)
    .bind(request.is_for_sale)
    .bind(request.is_for_trade)
    .bind(request.is_public)
    .fetch_one(&*global.db)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "failed to update camera"))?;

    let images: Vec<CameraImage> = sqlx::query_as(
        "SELECT * FROM camera_images WHERE camera_id = $1 ORDER BY display_order, created_at",
    )
    .bind(camera_id)
    .fetch_all(&*global.db)
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch camera images"))?;

    json_response(
        StatusCode::OK,
        &CameraPublic {
            camera,
            images,
            owner_username: None,
            owner_avatar: None,
        },
    )
}

async fn delete(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let camera_id = parse_camera_id(&req)?;

    fetch_owned(&global, camera_id, &auth.user_id).await?;

    sqlx::query("DELETE FROM cameras WHERE id = $1")
        .bind(camera_id)
        .execute(&*global.db)
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to delete camera"))?;

    Ok(make_response!(
        StatusCode::OK,
        json!({ "message": "Camera deleted successfully" })
    ))
}

async fn add_image(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let camera_id = parse_camera_id(&req)?;
    let request: CameraImageCreate = parse_json_body(req).await?;

    if request.image_url.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "image_url is required").into());
    }

    fetch_owned(&global, camera_id, &auth.user_id).await?;

    let mut tx = global
        .db
        .begin()
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to start transaction"))?;

    if request.is_primary {
        sqlx::query("UPDATE camera_images SET is_primary = FALSE WHERE camera_id = $1")
            .bind(camera_id)
            .execute(&mut *tx)
            .await
            .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to clear primary image"))?;
    }

    let image: CameraImage = sqlx::query_as(
        "INSERT INTO camera_images (id, camera_id, image_url, thumbnail_url, is_primary, display_order)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(camera_id)
    .bind(&request.image_url)
    .bind(request.thumbnail_url)
    .bind(request.is_primary)
    .bind(request.display_order)
    .fetch_one(&mut *tx)
    .await
    .map_err_route((StatusCode::BAD_REQUEST, "failed to create camera image"))?;

    tx.commit()
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to commit transaction"))?;

    json_response(StatusCode::OK, &image)
}

async fn delete_image(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;
    let auth = req.require_auth().await?;
    let camera_id = parse_camera_id(&req)?;
    let image_id = req
        .param("image_id")
        .expect("image_id param missing")
        .parse::<Uuid>()
        .map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid image id"))?;

    fetch_owned(&global, camera_id, &auth.user_id).await?;

    let image: CameraImage =
        sqlx::query_as("DELETE FROM camera_images WHERE id = $1 AND camera_id = $2 RETURNING *")
            .bind(image_id)
            .bind(camera_id)
            .fetch_optional(&*global.db)
            .await
            .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to delete camera image"))?
            .map_err_route((StatusCode::NOT_FOUND, "Camera image not found"))?;

    // Best effort removal of the stored object, the row is already gone
    if let Some(key) = global.camera_images.key_for_public_url(&image.image_url) {
        if let Err(err) = global.camera_images.delete_object(key).await {
            tracing::warn!(error = %err, key = %key, "failed to delete stored camera image");
        }
    }

    Ok(make_response!(
        StatusCode::OK,
        json!({ "message": "Camera image deleted successfully" })
    ))
}

pub fn routes(_: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .get("/", list)
        .post("/", create)
        .get("/:camera_id", get)
        .patch("/:camera_id", update)
        .delete("/:camera_id", delete)
        .post("/:camera_id/images", add_image)
        .delete("/:camera_id/images/:image_id", delete_image)
        .build()
        .expect("failed to build router")
}
