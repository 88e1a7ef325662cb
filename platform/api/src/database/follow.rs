use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A directed follow edge between two users.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: String,
    pub following_id: String,
    pub created_at: DateTime<Utc>,
}
