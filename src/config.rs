use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = "minidb.toml";
pub const CONFIG_ENV_VAR: &str = "MINIDB_CONFIG";

/// Complete configuration of the development task runner.
///
/// Every section has defaults matching the project's own layout, so an
/// absent `minidb.toml` is not an error.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub dep: DepConfig,

    #[serde(default)]
    pub clean: CleanConfig,

    #[serde(default)]
    pub test: TestConfig,

    #[serde(default)]
    pub release: ReleaseConfig,
}

fn default_env_dir() -> String {
    "env".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_pip() -> String {
    "{env}/bin/pip".to_string()
}

/// The isolated environment the package is installed into.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EnvironmentConfig {
    #[serde(default = "default_env_dir")]
    pub dir: String,

    /// Interpreter used to create the environment
    #[serde(default = "default_python")]
    pub python: String,

    /// Installer inside the environment; `{env}` expands to `dir`
    #[serde(default = "default_pip")]
    pub pip: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            dir: default_env_dir(),
            python: default_python(),
            pip: default_pip(),
        }
    }
}

fn default_freeze_file() -> String {
    "requirements.txt".to_string()
}

/// Settings of the `dep` target.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DepConfig {
    #[serde(default = "default_freeze_file")]
    pub freeze_file: String,

    /// Development-only packages, installed after the freeze so they stay out of it
    #[serde(default)]
    pub dev_packages: Vec<String>,
}

impl Default for DepConfig {
    fn default() -> Self {
        DepConfig {
            freeze_file: default_freeze_file(),
            dev_packages: Vec::new(),
        }
    }
}

fn default_clean_paths() -> Vec<String> {
    vec![
        "build".to_string(),
        "dist".to_string(),
        "{env}".to_string(),
        "*.egg-info".to_string(),
    ]
}

/// Settings of the `clean` target.
///
/// A leading `*` matches every entry of the project root with that suffix.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CleanConfig {
    #[serde(default = "default_clean_paths")]
    pub paths: Vec<String>,
}

impl Default for CleanConfig {
    fn default() -> Self {
        CleanConfig {
            paths: default_clean_paths(),
        }
    }
}

fn default_test_command() -> Vec<String> {
    vec![
        "{env}/bin/python".to_string(),
        "-m".to_string(),
        "unittest".to_string(),
        "discover".to_string(),
        "-v".to_string(),
        "-s".to_string(),
        "test".to_string(),
        "-p".to_string(),
        "*_tests.py".to_string(),
    ]
}

/// Settings of the `test` target.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TestConfig {
    #[serde(default = "default_test_command")]
    pub command: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        TestConfig {
            command: default_test_command(),
        }
    }
}

fn default_descriptor() -> String {
    "setup.py".to_string()
}

/// Settings of the `release` target.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReleaseConfig {
    /// Packaging descriptor holding `version = '...'`
    #[serde(default = "default_descriptor")]
    pub descriptor: String,

    /// Prepended to the version to form the tag name
    #[serde(default)]
    pub tag_prefix: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        ReleaseConfig {
            descriptor: default_descriptor(),
            tag_prefix: String::new(),
        }
    }
}

impl Config {
    /// Expand `{env}` and `{python}` placeholders in a configured string.
    pub fn expand(&self, value: &str) -> String {
        value
            .replace("{env}", &self.environment.dir)
            .replace("{python}", &self.environment.python)
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. Path named by the `MINIDB_CONFIG` environment variable
/// 3. `minidb.toml` in the project root
/// 4. `minidb/minidb.toml` in the user config directory
/// 5. Default configuration if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If a file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&str>, project_root: &Path) -> Result<Config> {
    let path = match config_path {
        Some(path) => Some(PathBuf::from(path)),
        None => find_config_file(project_root),
    };

    match path {
        Some(path) => {
            let config_str = fs::read_to_string(&path).map_err(|e| {
                Error::config(format!("cannot read {}: {}", path.display(), e))
            })?;
            tracing::debug!(path = %path.display(), "Loaded configuration");
            Ok(toml::from_str(&config_str)?)
        }
        None => Ok(Config::default()),
    }
}

fn find_config_file(project_root: &Path) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let local = project_root.join(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("minidb").join(CONFIG_FILE))
        .filter(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_placeholders() {
        let mut config = Config::default();
        config.environment.dir = ".venv".to_string();
        assert_eq!(config.expand("{env}/bin/pip"), ".venv/bin/pip");
        assert_eq!(config.expand("{python}"), "python3");
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: Config = toml::from_str(
            r#"
[release]
tag_prefix = "v"
"#,
        )
        .unwrap();
        assert_eq!(config.release.tag_prefix, "v");
        assert_eq!(config.release.descriptor, "setup.py");
        assert_eq!(config.environment, EnvironmentConfig::default());
    }
}
