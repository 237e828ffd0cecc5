//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::{Config, ratewatch_dir};

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Default location of the config file: `~/.ratewatch/config.toml`.
    pub fn default_path() -> PathBuf {
        ratewatch_dir().join("config.toml")
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let mut config: Config = toml::from_str(&expanded)?;
        Self::expand_paths(&mut config);
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Config::default()),
            Err(e) => Err(e),
        }
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::InvalidValue {
            field: "env".to_string(),
            message: e.to_string(),
        })?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    fn expand_paths(config: &mut Config) {
        let expand = |p: &Path| PathBuf::from(Self::expand_path(&p.to_string_lossy()));

        config.messaging.credentials_file = expand(&config.messaging.credentials_file);
        config.logging.dir = expand(&config.logging.dir);
        if let Some(path) = config.browser.chrome_path.as_deref() {
            config.browser.chrome_path = Some(expand(path));
        }
        if let Some(path) = config.browser.profile_root.as_deref() {
            config.browser.profile_root = Some(expand(path));
        }
    }

    /// Expand shell-style paths (e.g., `~/.ratewatch`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.monitor.sample_interval_secs, 60);
        assert_eq!(config.monitor.selector, "#rateStr");
    }

    #[test]
    fn test_expand_path() {
        let expanded = ConfigLoader::expand_path("~/.ratewatch");
        assert!(!expanded.starts_with('~'));
    }

    #[test]
    fn test_load_full_config() {
        let content = r##"
            [monitor]
            url = "https://example.com/rates"
            selector = "#rate"
            label_prefix = "SGD 1.00 = MYR "
            max_attempts = 4

            [browser]
            headless = false
            kill_grace_ms = 500

            [messaging]
            owner_chat_id = "42"
            send_attempts = 2

            [logging]
            level = "debug"
        "##;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.monitor.url, "https://example.com/rates");
        assert_eq!(config.monitor.max_attempts, 4);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.kill_grace_ms, 500);
        assert_eq!(config.messaging.owner_chat_id.as_deref(), Some("42"));
        assert_eq!(config.messaging.send_attempts, 2);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_tilde_paths_are_expanded() {
        let content = r#"
            [messaging]
            credentials_file = "~/bot.toml"

            [browser]
            profile_root = "~/profiles"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert!(!config.messaging.credentials_file.starts_with("~"));
        assert!(config.messaging.credentials_file.ends_with("bot.toml"));
        let root = config.browser.profile_root.unwrap();
        assert!(!root.starts_with("~"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[monitor]").unwrap();
        writeln!(file, "retry_delay_secs = 7").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.monitor.retry_delay_secs, 7);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config =
            ConfigLoader::load_or_default(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(config.monitor.max_attempts, 3);
    }

    #[test]
    fn test_load_or_default_invalid_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid = [unclosed").unwrap();
        let result = ConfigLoader::load_or_default(file.path());
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: unique test-only variable
        unsafe {
            std::env::set_var("RATEWATCH_TEST_OWNER", "777");
        }
        let content = "[messaging]\nowner_chat_id = \"${RATEWATCH_TEST_OWNER}\"";
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.messaging.owner_chat_id.as_deref(), Some("777"));
        unsafe {
            std::env::remove_var("RATEWATCH_TEST_OWNER");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${RATEWATCH_NONEXISTENT_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let content = "value = \"no variables here\"";
        let expanded = ConfigLoader::expand_env_vars(content).unwrap();
        assert_eq!(expanded, content);
    }

    #[test]
    fn test_default_path() {
        assert!(ConfigLoader::default_path().ends_with(".ratewatch/config.toml"));
    }
}
