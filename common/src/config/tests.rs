use super::*;

#[derive(Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
struct TestConfig {
    logging: LoggingConfig,
    database: DatabaseConfig,
    bucket: S3BucketConfig,
}

#[test]
fn test_parse_defaults() {
    let (config, path) = parse::<TestConfig>(None).expect("failed to parse config");

    assert_eq!(path, None);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.mode, logging::Mode::Default);
    assert_eq!(config.database.uri, "postgres://root@localhost:5432/retrolens_dev");
    assert_eq!(config.bucket.name, "retrolens");
    assert_eq!(config.bucket.credentials.access_key, None);
}

#[test]
fn test_parse_env_override() {
    std::env::set_var("RETRO_DATABASE__URI", "postgres://env@localhost:5432/env_db");
    std::env::set_var("RETRO_LOGGING__MODE", "json");

    let (config, _) = parse::<TestConfig>(None).expect("failed to parse config");

    assert_eq!(config.database.uri, "postgres://env@localhost:5432/env_db");
    assert_eq!(config.logging.mode, logging::Mode::Json);

    std::env::remove_var("RETRO_DATABASE__URI");
    std::env::remove_var("RETRO_LOGGING__MODE");
}
