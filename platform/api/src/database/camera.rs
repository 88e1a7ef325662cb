use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A camera in a member's collection.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Camera {
    pub id: Uuid,
    /// The owning user.
    pub user_id: String,
    pub brand_name: String,
    pub model: String,
    /// Production year or range, free form ("1954", "late 60s").
    pub year: Option<String>,
    pub camera_type: Option<String>,
    pub film_format: Option<String>,
    /// One of `mint`, `excellent`, `good`, `fair`, `poor`, `for_parts`.
    pub condition: Option<String>,
    pub acquisition_story: Option<String>,
    pub technical_specs: Option<serde_json::Value>,
    pub market_value_min: Option<f64>,
    pub market_value_max: Option<f64>,
    pub is_for_sale: bool,
    pub is_for_trade: bool,
    pub is_public: bool,
    pub view_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const CAMERA_CONDITIONS: &[&str] = &["mint", "excellent", "good", "fair", "poor", "for_parts"];

impl Camera {
    /// Validates a camera condition.
    pub fn validate_condition(condition: &str) -> Result<(), &'static str> {
        if CAMERA_CONDITIONS.contains(&condition) {
            Ok(())
        } else {
            Err("Condition must be one of mint, excellent, good, fair, poor or for_parts")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_condition() {
        for condition in CAMERA_CONDITIONS {
            assert!(Camera::validate_condition(condition).is_ok());
        }

        assert!(Camera::validate_condition("rusty").is_err());
        assert!(Camera::validate_condition("").is_err());
    }
}
