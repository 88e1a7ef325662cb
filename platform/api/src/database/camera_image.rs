use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An image attached to a camera, ordered by `display_order`.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct CameraImage {
    pub id: Uuid,
    pub camera_id: Uuid,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    /// At most one image per camera is primary.
    pub is_primary: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}
