use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A comment on a discussion or a camera, optionally threaded under a parent
/// comment on the same target, joined with its author and like count.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct CommentWithAuthor {
    pub id: Uuid,
    pub user_id: String,
    pub discussion_id: Option<Uuid>,
    pub camera_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub body: String,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub author_username: String,
    pub author_avatar: String,
    pub like_count: i64,
}

/// What a comment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentTarget {
    Discussion(Uuid),
    Camera(Uuid),
}

impl CommentTarget {
    /// Accepts exactly one of the two ids.
    pub fn from_parts(discussion_id: Option<Uuid>, camera_id: Option<Uuid>) -> Option<Self> {
        match (discussion_id, camera_id) {
            (Some(id), None) => Some(Self::Discussion(id)),
            (None, Some(id)) => Some(Self::Camera(id)),
            _ => None,
        }
    }

    pub fn discussion_id(&self) -> Option<Uuid> {
        match self {
            Self::Discussion(id) => Some(*id),
            Self::Camera(_) => None,
        }
    }

    pub fn camera_id(&self) -> Option<Uuid> {
        match self {
            Self::Discussion(_) => None,
            Self::Camera(id) => Some(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_parts() {
        let id = Uuid::new_v4();

        assert_eq!(
            CommentTarget::from_parts(Some(id), None),
            Some(CommentTarget::Discussion(id))
        );
        assert_eq!(
            CommentTarget::from_parts(None, Some(id)),
            Some(CommentTarget::Camera(id))
        );
        assert_eq!(CommentTarget::from_parts(None, None), None);
        assert_eq!(CommentTarget::from_parts(Some(id), Some(id)), None);
    }
}
