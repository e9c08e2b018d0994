use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}")]
    ConfigReadError {
        config_path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file at {config_path}")]
    ConfigParseError {
        config_path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Settings of the formdoc tools.
///
/// `store_mode` is kept as written; unknown values are resolved by the
/// engine, which falls back to annotation storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_mode: String,
    pub version_stamp: String,
    pub host_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment_config: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_mode: "transition".to_string(),
            version_stamp: env!("CARGO_PKG_VERSION").to_string(),
            host_version: "unknown".to_string(),
            fragment_config: None,
        }
    }
}

impl Config {
    /// Load config from a specific path. `Ok(None)` if there is no file.
    pub fn load_from_path(config_path: &Path) -> Result<Option<Self>, ConfigError> {
        if !config_path.exists() {
            return Ok(None);
        }

        let contents =
            fs::read_to_string(config_path).map_err(|source| ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        let mut config: Config =
            toml::from_str(&contents).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        if let Some(fragments) = &config.fragment_config {
            config.fragment_config = Some(Self::expand_path(&fragments.to_string_lossy()));
        }

        Ok(Some(config))
    }

    /// Load config from the default location
    pub fn load() -> Result<Option<Self>, ConfigError> {
        Self::load_from_path(&Self::config_path())
    }

    /// The default location's config, or the defaults if there is none.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Ok(Self::load()?.unwrap_or_default())
    }

    pub fn save_to_path(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;

        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to_path(&Self::config_path())
    }

    pub fn config_path() -> PathBuf {
        PathBuf::from(shellexpand::tilde("~/.config/formdoc/config.toml").as_ref())
    }

    /// Expands `~` and environment variables; unresolvable variables leave
    /// the path as written.
    pub fn expand_path(path: &str) -> PathBuf {
        match shellexpand::full(path) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => PathBuf::from(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&config_path).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config = Config {
            store_mode: "metadata".to_string(),
            version_stamp: "2.1.0".to_string(),
            host_version: "Writer 7.6".to_string(),
            fragment_config: Some(temp_dir.path().join("fragments.conf")),
        };
        config.save_to_path(&config_path).unwrap();

        let loaded = Config::load_from_path(&config_path).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "store_mode = \"annotation\"\n").unwrap();

        let loaded = Config::load_from_path(&config_path).unwrap().unwrap();
        assert_eq!(loaded.store_mode, "annotation");
        assert_eq!(loaded.host_version, "unknown");
        assert_eq!(loaded.version_stamp, env!("CARGO_PKG_VERSION"));
        assert_eq!(loaded.fragment_config, None);
    }

    #[test]
    fn test_invalid_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "store_mode = [unclosed").unwrap();

        let err = Config::load_from_path(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }

    #[test]
    fn test_fragment_path_expansion() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let home = temp_dir.path().join("home");
        fs::write(&config_path, "fragment_config = \"~/vorlagen/fragmente.conf\"\n").unwrap();

        // SAFETY: This is a test and we're setting HOME for this specific test only
        unsafe {
            std::env::set_var("HOME", &home);
        }

        let loaded = Config::load_from_path(&config_path).unwrap().unwrap();
        assert_eq!(
            loaded.fragment_config,
            Some(home.join("vorlagen/fragmente.conf"))
        );
    }
}
