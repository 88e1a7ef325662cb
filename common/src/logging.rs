use std::str::FromStr;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INITIALIZED: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Default,
    Compact,
    Pretty,
    Json,
}

/// Installs the global tracing subscriber. Safe to call more than once, the
/// first call wins.
pub fn init(level: &str, mode: Mode) -> Result<()> {
    INITIALIZED.get_or_try_init(|| {
        let env_filter = EnvFilter::from_str(level).context("failed to parse log level")?;

        let builder = tracing_subscriber::fmt()
            .with_line_number(true)
            .with_file(true)
            .with_env_filter(env_filter);

        match mode {
            Mode::Default => builder.try_init(),
            Mode::Compact => builder.compact().try_init(),
            Mode::Pretty => builder.pretty().try_init(),
            Mode::Json => builder.json().try_init(),
        }
        .map_err(|err| anyhow::anyhow!("failed to set global logger: {err}"))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_deserialize() {
        let mode: Mode = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(mode, Mode::Json);

        let mode: Mode = serde_json::from_str("\"default\"").unwrap();
        assert_eq!(mode, Mode::Default);

        assert!(serde_json::from_str::<Mode>("\"verbose\"").is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        init("info", Mode::Default).expect("first init should succeed");
        init("debug", Mode::Json).expect("second init should be a no-op");
    }
}
