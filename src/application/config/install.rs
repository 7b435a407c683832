use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{MigrationError, Result};

/// Keys that only matter at install time and are kept as global
/// (`site_id = 0`) rows in the config table.
pub const INSTALL_CONFIG_KEYS: &[&str] = &[
    "base_path",
    "base_url",
    "cache_driver",
    "cookie_domain",
    "cookie_path",
    "cookie_prefix",
    "debug",
    "is_system_on",
    "multiple_sites_enabled",
    "site_index",
    "site_url",
    "theme_folder_path",
    "theme_folder_url",
];

/// Snapshot of the install-time configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallConfig {
    values: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct RawInstallConfig(BTreeMap<String, serde_yaml::Value>);

impl InstallConfig {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Load the snapshot from a YAML mapping of scalar values
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::Config(format!(
                "Failed to read install config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw: RawInstallConfig = serde_yaml::from_str(contents)
            .map_err(|e| MigrationError::Config(format!("Invalid install config: {}", e)))?;

        let mut values = BTreeMap::new();
        for (key, value) in raw.0 {
            let value = match value {
                serde_yaml::Value::Null => continue,
                serde_yaml::Value::Bool(true) => "y".to_string(),
                // false is not truthy, so it is never seeded
                serde_yaml::Value::Bool(false) => String::new(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::String(s) => s,
                other => {
                    return Err(MigrationError::Config(format!(
                        "Install config key '{}' must be a scalar, got {:?}",
                        key, other
                    )))
                }
            };
            values.insert(key, value);
        }

        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Install keys with a truthy value, in [`INSTALL_CONFIG_KEYS`] order.
    /// Empty strings and `"0"` are not truthy.
    pub fn global_rows(&self) -> Vec<(&'static str, &str)> {
        INSTALL_CONFIG_KEYS
            .iter()
            .filter_map(|key| {
                self.get(key)
                    .filter(|value| !value.is_empty() && *value != "0")
                    .map(|value| (*key, value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_scalars() {
        let config = InstallConfig::from_yaml(
            "site_url: https://example.com/\ndebug: 1\nis_system_on: true\ncookie_prefix: ~\nmultiple_sites_enabled: false\n",
        )
        .unwrap();

        assert_eq!(config.get("site_url"), Some("https://example.com/"));
        assert_eq!(config.get("debug"), Some("1"));
        assert_eq!(config.get("is_system_on"), Some("y"));
        assert_eq!(config.get("cookie_prefix"), None);
        assert_eq!(config.get("multiple_sites_enabled"), Some(""));
        assert_eq!(
            config.global_rows(),
            vec![
                ("debug", "1"),
                ("is_system_on", "y"),
                ("site_url", "https://example.com/"),
            ]
        );
    }

    #[test]
    fn test_from_yaml_rejects_nested_values() {
        let err = InstallConfig::from_yaml("site_url:\n  - a\n  - b\n").unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));
    }

    #[test]
    fn test_empty_yaml_is_empty_config() {
        assert_eq!(InstallConfig::from_yaml("  \n").unwrap(), InstallConfig::default());
    }

    #[test]
    fn test_global_rows_skip_falsy_and_unknown_keys() {
        let mut values = BTreeMap::new();
        values.insert("site_url".to_string(), "https://example.com/".to_string());
        values.insert("debug".to_string(), "0".to_string());
        values.insert("cookie_domain".to_string(), String::new());
        values.insert("not_an_install_key".to_string(), "x".to_string());
        values.insert("base_url".to_string(), "https://example.com".to_string());

        let config = InstallConfig::new(values);
        let rows = config.global_rows();

        assert_eq!(
            rows,
            vec![
                ("base_url", "https://example.com"),
                ("site_url", "https://example.com/"),
            ]
        );
    }
}
