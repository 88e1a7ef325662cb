use crate::logging;

pub use config::ConfigError;

/// Environment variables are read with this prefix, e.g. `RETRO_DATABASE__URI`.
pub const ENV_PREFIX: &str = "RETRO";

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// The log level to use, this is a tracing env filter
    pub level: String,

    /// What logging mode we should use
    pub mode: logging::Mode,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            mode: logging::Mode::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// The database URL to use
    pub uri: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: "postgres://root@localhost:5432/retrolens_dev".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct S3CredentialsConfig {
    /// The access key for the S3 bucket
    pub access_key: Option<String>,

    /// The secret key for the S3 bucket
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct S3BucketConfig {
    /// The name of the S3 bucket
    pub name: String,

    /// The region the S3 bucket is in
    pub region: String,

    /// The custom endpoint for the S3 bucket
    pub endpoint: Option<String>,

    /// The base URL public objects are served from. Defaults to path-style
    /// access against the endpoint.
    pub public_base: Option<String>,

    /// The credentials for the S3 bucket
    pub credentials: S3CredentialsConfig,
}

impl Default for S3BucketConfig {
    fn default() -> Self {
        Self {
            name: "retrolens".to_owned(),
            region: "us-east-1".to_owned(),
            endpoint: Some("http://localhost:9000".to_string()),
            public_base: None,
            credentials: S3CredentialsConfig::default(),
        }
    }
}

/// Parses the config from the environment and an optional config file.
///
/// Environment variables take priority over file values, which take priority
/// over the serde defaults. The file location itself can be overridden with
/// `RETRO_CONFIG_FILE`. Returns the resolved file path, if one was loaded.
pub fn parse<C: serde::de::DeserializeOwned>(
    config_file: Option<String>,
) -> Result<(C, Option<String>), ConfigError> {
    let mut builder = config::Config::builder();

    let explicit = std::env::var(format!("{ENV_PREFIX}_CONFIG_FILE")).ok();
    let required = explicit.is_some();

    let mut config_path = None;

    if let Some(path) = explicit.or(config_file) {
        builder = builder.add_source(config::File::with_name(&path).required(required));

        // `File::with_name` discovers the extension, probe the same way for
        // the resolved-path report.
        config_path = ["", ".toml", ".json", ".yaml"]
            .iter()
            .map(|ext| format!("{path}{ext}"))
            .find(|p| std::path::Path::new(p).is_file());
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?.try_deserialize()?;

    Ok((
        config,
        config_path.map(|p| {
            std::fs::canonicalize(&p)
                .map(|p| p.display().to_string())
                .unwrap_or(p)
        }),
    ))
}

#[cfg(test)]
mod tests;
