use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

const APP_DIR: &str = "noritori";
const DEFAULT_DB_NAME: &str = "noritori.db";
const DEFAULT_CONFIG_NAME: &str = "config.json";
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Settings as they appear in the JSON config file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FileConfig {
    database_path: Option<PathBuf>,
    default_user: Option<String>,
    log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub default_user: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: app_dir().join(DEFAULT_DB_NAME),
            default_user: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    /// Loads the config file (if any) and applies environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os("NORITORI_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| app_dir().join(DEFAULT_CONFIG_NAME));

        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
            .map_err(|e| Error::Config(format!("{} is invalid: {}", path.display(), e)))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: FileConfig =
            serde_json::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        let defaults = Self::default();

        Ok(Self {
            database_path: file.database_path.unwrap_or(defaults.database_path),
            default_user: file.default_user.filter(|u| !u.trim().is_empty()),
            log_level: file.log_level.unwrap_or(defaults.log_level),
        })
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup("NORITORI_DB").filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(user) = lookup("NORITORI_USER").filter(|v| !v.is_empty()) {
            self.default_user = Some(user);
        }
        if let Some(level) = lookup("NORITORI_LOG").filter(|v| !v.is_empty()) {
            self.log_level = level;
        }
    }

    /// Creates the parent directory of the database file.
    pub fn ensure_database_dir(&self) -> Result<()> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_point_into_app_dir() {
        let config = Config::default();
        let path = config.database_path.to_str().unwrap();
        assert!(path.ends_with("noritori.db"));
        assert!(path.contains("noritori"));
        assert_eq!(config.log_level, "warn");
        assert!(config.default_user.is_none());
    }

    #[test]
    fn empty_object_uses_defaults() {
        assert_eq!(Config::from_json_str("{}").unwrap(), Config::default());
    }

    #[test]
    fn reads_all_keys() {
        let config = Config::from_json_str(
            r#"{"databasePath":"/tmp/n.db","defaultUser":"hana","logLevel":"debug"}"#,
        )
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/n.db"));
        assert_eq!(config.default_user.as_deref(), Some("hana"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn blank_default_user_is_ignored() {
        let config = Config::from_json_str(r#"{"defaultUser":"  "}"#).unwrap();
        assert!(config.default_user.is_none());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_json() {
        assert!(matches!(
            Config::from_json_str(r#"{"port":3000}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(Config::from_json_str("{"), Err(Error::Config(_))));
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("NORITORI_DB", "/tmp/override.db"),
            ("NORITORI_USER", "kenji"),
            ("NORITORI_LOG", "info"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::from_json_str(r#"{"defaultUser":"hana"}"#).unwrap();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.database_path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.default_user.as_deref(), Some("kenji"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn empty_overrides_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|_| Some(String::new()));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = Config::from_file(Path::new("/definitely/not/here/config.json")).unwrap();
        assert_eq!(config, Config::default());
    }
}
