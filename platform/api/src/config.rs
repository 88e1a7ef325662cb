use std::net::SocketAddr;

use anyhow::Result;
use common::config::{DatabaseConfig, LoggingConfig, S3BucketConfig};

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
/// The API is the backend for the RetroLens community platform
pub struct AppConfig {
    /// The path to the config file
    pub config_file: Option<String>,

    /// Name of this instance
    pub name: String,

    /// The logging config
    pub logging: LoggingConfig,

    /// API Config
    pub api: ApiConfig,

    /// Database Config
    pub database: DatabaseConfig,

    /// JWT Config
    pub jwt: JwtConfig,

    /// Upload limits
    pub uploads: UploadConfig,

    /// Storage buckets
    pub buckets: BucketsConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address for the API
    pub bind_address: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "[::]:8000".parse().expect("failed to parse bind address"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// The shared secret identity provider tokens are signed with
    pub secret: String,

    /// The issuer expected in identity provider tokens
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "retrolens".to_string(),
            secret: "retrolens".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted camera image, in bytes
    pub max_image_size: usize,

    /// Largest accepted avatar, in bytes
    pub max_avatar_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_image_size: 10 * 1024 * 1024,
            max_avatar_size: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct BucketsConfig {
    /// Bucket camera images are uploaded to
    pub camera_images: S3BucketConfig,

    /// Bucket user avatars are uploaded to
    pub user_avatars: S3BucketConfig,
}

impl Default for BucketsConfig {
    fn default() -> Self {
        Self {
            camera_images: S3BucketConfig {
                name: "camera-images".to_string(),
                ..Default::default()
            },
            user_avatars: S3BucketConfig {
                name: "user-avatars".to_string(),
                ..Default::default()
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: Some("config".to_string()),
            name: "retrolens-api".to_string(),
            logging: LoggingConfig::default(),
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
            jwt: JwtConfig::default(),
            uploads: UploadConfig::default(),
            buckets: BucketsConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn parse() -> Result<Self> {
        let (mut config, config_file) =
            common::config::parse::<Self>(Self::default().config_file)?;

        config.config_file = config_file;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.name, "retrolens-api");
        assert_eq!(config.api.bind_address.port(), 8000);
        assert_eq!(config.buckets.camera_images.name, "camera-images");
        assert_eq!(config.buckets.user_avatars.name, "user-avatars");
        assert!(config.uploads.max_avatar_size < config.uploads.max_image_size);
    }
}
