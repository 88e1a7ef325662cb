use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A like on a discussion, a comment or a camera. Uniqueness per user and
/// target is enforced by partial unique indexes.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Like {
    pub id: Uuid,
    pub user_id: String,
    pub discussion_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub camera_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// What a like applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Discussion(Uuid),
    Comment(Uuid),
    Camera(Uuid),
}

impl LikeTarget {
    /// Accepts exactly one of the three ids.
    pub fn from_parts(
        discussion_id: Option<Uuid>,
        camera_id: Option<Uuid>,
        comment_id: Option<Uuid>,
    ) -> Option<Self> {
        match (discussion_id, camera_id, comment_id) {
            (Some(id), None, None) => Some(Self::Discussion(id)),
            (None, Some(id), None) => Some(Self::Camera(id)),
            (None, None, Some(id)) => Some(Self::Comment(id)),
            _ => None,
        }
    }

    pub fn discussion_id(&self) -> Option<Uuid> {
        match self {
            Self::Discussion(id) => Some(*id),
            _ => None,
        }
    }

    pub fn comment_id(&self) -> Option<Uuid> {
        match self {
            Self::Comment(id) => Some(*id),
            _ => None,
        }
    }

    pub fn camera_id(&self) -> Option<Uuid> {
        match self {
            Self::Camera(id) => Some(*id),
            _ => None,
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
            LikeTarget::from_parts(Some(id), None, None),
            Some(LikeTarget::Discussion(id))
        );
        assert_eq!(
            LikeTarget::from_parts(None, Some(id), None),
            Some(LikeTarget::Camera(id))
        );
        assert_eq!(
            LikeTarget::from_parts(None, None, Some(id)),
            Some(LikeTarget::Comment(id))
        );

        assert_eq!(LikeTarget::from_parts(None, None, None), None);
        assert_eq!(LikeTarget::from_parts(Some(id), Some(id), None), None);
        assert_eq!(LikeTarget::from_parts(Some(id), Some(id), Some(id)), None);
    }

    #[test]
    fn test_target_columns() {
        let id = Uuid::new_v4();
        let target = LikeTarget::Comment(id);

        assert_eq!(target.comment_id(), Some(id));
        assert_eq!(target.discussion_id(), None);
        assert_eq!(target.camera_id(), None);
    }
}
