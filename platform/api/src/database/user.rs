use chrono::{DateTime, Utc};

/// A community member.
///
/// The primary key is the identity provider's subject for synced accounts,
/// or a generated UUID string for accounts created directly via the API.
#[derive(Debug, Clone, Default, sqlx::FromRow, serde::Serialize)]
pub struct User {
    /// The unique identifier for the user.
    pub id: String,
    /// The unique username of the user.
    pub username: String,
    /// The email of the user.
    pub email: String,
    /// The display name of the user.
    pub display_name: String,
    /// Free form profile text.
    pub bio: String,
    /// Public URL of the user's avatar, empty when unset.
    pub avatar_url: String,
    /// Free form location text.
    pub location: String,
    /// One of `beginner`, `intermediate`, `expert`.
    pub expertise_level: String,
    pub website_url: Option<String>,
    pub instagram_url: Option<String>,
    /// The time the user was created.
    pub created_at: DateTime<Utc>,
    /// The time the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Profile counts served with a user, read live from the content tables.
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow, serde::Serialize)]
pub struct UserStats {
    pub camera_count: i64,
    pub discussion_count: i64,
    pub follower_count: i64,
    pub following_count: i64,
}

/// The subset of a profile embedded in follower/following listings.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: String,
    pub bio: String,
}

pub const EXPERTISE_LEVELS: &[&str] = &["beginner", "intermediate", "expert"];

impl User {
    /// Validates a username.
    pub fn validate_username(username: &str) -> Result<(), &'static str> {
        if username.len() < 3 {
            return Err("Username must be at least 3 characters long");
        }

        if username.len() > 30 {
            return Err("Username must be at most 30 characters long");
        }

        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
        {
            return Err("Username must only contain alphanumeric characters, '_', '.' or '-'");
        }

        Ok(())
    }

    /// Validates an email.
    pub fn validate_email(email: &str) -> Result<(), &'static str> {
        if email.len() < 5 {
            return Err("Email must be at least 5 characters long");
        }

        if email.len() > 100 {
            return Err("Email must be at most 100 characters long");
        }

        if !email_address::EmailAddress::is_valid(email) {
            return Err("Email is not a valid email address");
        }

        Ok(())
    }

    /// Validates an expertise level.
    pub fn validate_expertise_level(level: &str) -> Result<(), &'static str> {
        if EXPERTISE_LEVELS.contains(&level) {
            Ok(())
        } else {
            Err("Expertise level must be one of beginner, intermediate or expert")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(User::validate_username("ansel.adams").is_ok());
        assert!(User::validate_username("leica_fan-42").is_ok());

        assert!(User::validate_username("ab").is_err());
        assert!(User::validate_username(&"a".repeat(31)).is_err());
        assert!(User::validate_username("no spaces").is_err());
        assert!(User::validate_username("nö").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(User::validate_email("ansel@example.com").is_ok());

        assert!(User::validate_email("a@b").is_err());
        assert!(User::validate_email("not-an-email").is_err());
        assert!(User::validate_email(&format!("{}@example.com", "a".repeat(100))).is_err());
    }

    #[test]
    fn test_validate_expertise_level() {
        for level in EXPERTISE_LEVELS {
            assert!(User::validate_expertise_level(level).is_ok());
        }

        assert!(User::validate_expertise_level("grandmaster").is_err());
        assert!(User::validate_expertise_level("").is_err());
    }
}
