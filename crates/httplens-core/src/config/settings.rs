//! Monitor settings and TOML configuration parsing.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitConfig;

/// Top-level monitor configuration, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Maximum number of exchanges retained by the store.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// 429 sliding-window tracking settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_max_items() -> usize {
    50
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_values() {
        let config = MonitorConfig::default();
        assert_eq!(config.max_items, 50);
        assert_eq!(config.rate_limit.window_secs, 300);
        assert_eq!(config.rate_limit.sweep_interval_secs, 60);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: MonitorConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_items, 50);
        assert_eq!(config.rate_limit.window_secs, 300);
    }

    #[test]
    fn partial_toml_overrides_selected_fields() {
        let config: MonitorConfig = toml::from_str(
            r#"
            max_items = 10

            [rate_limit]
            window_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.max_items, 10);
        assert_eq!(config.rate_limit.window_secs, 120);
        assert_eq!(config.rate_limit.sweep_interval_secs, 60);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_items = 5").unwrap();

        let config = MonitorConfig::load(file.path()).unwrap();
        assert_eq!(config.max_items, 5);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(MonitorConfig::load(Path::new("/nonexistent/httplens.toml")).is_err());
    }
}
