use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A discussion joined with its author, category and denormalized stats.
///
/// The column set matches both the `discussion_stats`-joined list query and
/// the `get_discussion_with_stats` / `get_feed_discussions` SQL helpers.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct DiscussionWithStats {
    pub id: Uuid,
    pub user_id: String,
    pub category_id: Option<i32>,
    pub title: String,
    /// Stored as `body`, exposed as `content` on the API.
    #[serde(rename = "content")]
    pub body: String,
    pub tags: Vec<String>,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub view_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub author_username: String,
    pub author_avatar: String,
    pub author_display_name: String,
    pub category_name: Option<String>,
    pub comment_count: i64,
    pub like_count: i64,
    pub last_comment_at: Option<DateTime<Utc>>,
}

/// Columns a discussion listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscussionSort {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    ViewCount,
    CommentCount,
    LikeCount,
}

impl DiscussionSort {
    /// Unknown fields fall back to `created_at`, like the original API.
    pub fn parse(field: &str) -> Self {
        match field {
            "updated_at" => Self::UpdatedAt,
            "title" => Self::Title,
            "view_count" => Self::ViewCount,
            "comment_count" => Self::CommentCount,
            "like_count" => Self::LikeCount,
            _ => Self::CreatedAt,
        }
    }

    /// The ORDER BY expression for this sort. Only ever interpolated from
    /// this fixed set, never from user input.
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "d.created_at",
            Self::UpdatedAt => "d.updated_at",
            Self::Title => "d.title",
            Self::ViewCount => "d.view_count",
            Self::CommentCount => "comment_count",
            Self::LikeCount => "like_count",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parse() {
        assert_eq!(DiscussionSort::parse("like_count"), DiscussionSort::LikeCount);
        assert_eq!(DiscussionSort::parse("title"), DiscussionSort::Title);

        // Unknown fields must not leak into SQL
        assert_eq!(DiscussionSort::parse("id; DROP TABLE"), DiscussionSort::CreatedAt);
        assert_eq!(DiscussionSort::parse(""), DiscussionSort::CreatedAt);
    }

    #[test]
    fn test_sort_columns_are_fixed() {
        for sort in [
            DiscussionSort::CreatedAt,
            DiscussionSort::UpdatedAt,
            DiscussionSort::Title,
            DiscussionSort::ViewCount,
            DiscussionSort::CommentCount,
            DiscussionSort::LikeCount,
        ] {
            assert!(sort.column().chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.'));
        }
    }
}
