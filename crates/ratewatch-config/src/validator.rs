//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Fail with the first error, if any.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_monitor(config, &mut result);
        Self::validate_browser(config, &mut result);
        Self::validate_messaging(config, &mut result);

        result
    }

    fn validate_monitor(config: &Config, result: &mut ValidationResult) {
        let monitor = &config.monitor;

        if !monitor.url.starts_with("http://") && !monitor.url.starts_with("https://") {
            result.add_error(ValidationError::new(
                "monitor.url",
                "URL must start with http:// or https://",
            ));
        }

        if monitor.selector.trim().is_empty() {
            result.add_error(ValidationError::new(
                "monitor.selector",
                "Selector cannot be empty",
            ));
        }

        if monitor.sample_interval_secs == 0 {
            result.add_error(ValidationError::new(
                "monitor.sample_interval_secs",
                "sample_interval_secs must be greater than 0",
            ));
        }

        if monitor.max_attempts == 0 {
            result.add_error(ValidationError::new(
                "monitor.max_attempts",
                "max_attempts must be greater than 0",
            ));
        }

        if monitor.wait_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "monitor.wait_timeout_secs",
                "wait_timeout_secs must be greater than 0",
            ));
        }

        // Retries that outlast the period push the next tick back.
        let retry_window = monitor
            .retry_delay_secs
            .saturating_mul(u64::from(monitor.max_attempts.saturating_sub(1)));
        if monitor.sample_interval_secs > 0 && retry_window >= monitor.sample_interval_secs {
            result.add_warning(ValidationWarning::new(
                "monitor.retry_delay_secs",
                "retry delays exceed the sampling interval; ticks will be delayed",
            ));
        }
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        if config.browser.launch_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "browser.launch_timeout_secs",
                "launch_timeout_secs must be greater than 0",
            ));
        }

        if let Some(path) = &config.browser.chrome_path {
            if !path.exists() {
                result.add_warning(ValidationWarning::new(
                    "browser.chrome_path",
                    format!("{} does not exist", path.display()),
                ));
            }
        }
    }

    fn validate_messaging(config: &Config, result: &mut ValidationResult) {
        let messaging = &config.messaging;

        if !messaging.api_base.starts_with("http://") && !messaging.api_base.starts_with("https://")
        {
            result.add_error(ValidationError::new(
                "messaging.api_base",
                "api_base must start with http:// or https://",
            ));
        }

        if messaging.send_attempts == 0 {
            result.add_error(ValidationError::new(
                "messaging.send_attempts",
                "send_attempts must be greater than 0",
            ));
        }

        if messaging.health_check_interval_secs == 0 {
            result.add_error(ValidationError::new(
                "messaging.health_check_interval_secs",
                "health_check_interval_secs must be greater than 0",
            ));
        }

        match messaging.owner_chat_id.as_deref() {
            None => result.add_warning(ValidationWarning::new(
                "messaging.owner_chat_id",
                "no owner chat configured; fallback notifications will be dropped",
            )),
            Some(id) if id.trim().is_empty() => result.add_error(ValidationError::new(
                "messaging.owner_chat_id",
                "owner_chat_id cannot be empty",
            )),
            Some(_) => {}
        }
    }
}
