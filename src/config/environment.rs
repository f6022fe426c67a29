//! Environment variable loading and management.
//!
//! Only host-level overrides live here. Model credentials belong to the
//! provider implementations, which read their own variables.

use std::env;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Variable naming the TOML configuration file
pub const CONFIG_VAR: &str = "ARK_CONFIG";

/// Variable overriding `logging.level`
pub const LOG_VAR: &str = "ARK_LOG";

/// Loads environment variables from .env file and system environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    env_file: Option<String>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to .env file. Nothing is loaded when None.
    pub fn new(env_file: Option<&Path>) -> Self {
        // Only an explicit path is loaded, so tests never pick up a stray
        // .env from the working directory.
        if let Some(path) = env_file {
            if path.exists() {
                if let Err(e) = dotenv::from_path(path) {
                    warn!(path = %path.display(), "Failed to load .env file: {}", e);
                }
            }
        }

        Self {
            env_file: env_file.map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// The .env file this loader was created with
    pub fn env_file(&self) -> Option<&str> {
        self.env_file.as_deref()
    }

    /// Configuration file named by `ARK_CONFIG`
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config_path_from(process_var)
    }

    /// Log level override from `ARK_LOG`
    pub fn log_level(&self) -> Option<String> {
        self.log_level_from(process_var)
    }

    /// [`config_path`](Self::config_path) against an arbitrary variable source
    pub fn config_path_from<F>(&self, lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        non_blank(lookup(CONFIG_VAR)).map(PathBuf::from)
    }

    /// [`log_level`](Self::log_level) against an arbitrary variable source
    pub fn log_level_from<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        non_blank(lookup(LOG_VAR))
    }
}

fn process_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    #[test]
    fn test_overrides_from_environment() {
        let env_loader = EnvironmentLoader::default();
        let unset = |_: &str| None;
        assert_eq!(env_loader.config_path_from(unset), None);
        assert_eq!(env_loader.log_level_from(unset), None);

        let vars = HashMap::from([
            (CONFIG_VAR, "/etc/ark/ark.toml".to_string()),
            (LOG_VAR, "debug".to_string()),
        ]);
        let lookup = |name: &str| vars.get(name).cloned();
        assert_eq!(
            env_loader.config_path_from(lookup),
            Some(PathBuf::from("/etc/ark/ark.toml"))
        );
        assert_eq!(env_loader.log_level_from(lookup), Some("debug".to_string()));
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let env_loader = EnvironmentLoader::default();
        let blank = |_: &str| Some("  ".to_string());
        assert_eq!(env_loader.config_path_from(blank), None);
        assert_eq!(env_loader.log_level_from(blank), None);
    }

    #[test]
    fn test_env_file_loading() {
        let env_loader = EnvironmentLoader::new(None);
        assert!(env_loader.env_file().is_none());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "ARK_TEST_ENV_FILE_VALUE=loaded\n").unwrap();

        let env_loader = EnvironmentLoader::new(Some(&path));
        assert!(env_loader.env_file().is_some());
        assert_eq!(env::var("ARK_TEST_ENV_FILE_VALUE").unwrap(), "loaded");
        env::remove_var("ARK_TEST_ENV_FILE_VALUE");
    }
}
