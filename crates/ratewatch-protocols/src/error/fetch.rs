//! Page fetch errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Session timed out: {0}")]
    SessionTimeout(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Failed to launch session: {0}")]
    LaunchFailed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Failed to release helper process {pid}: {reason}")]
    Release { pid: u32, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_error() {
        let err = FetchError::Navigation("net::ERR_NAME_NOT_RESOLVED".to_string());
        let display = err.to_string();
        assert!(display.contains("Navigation failed"));
        assert!(display.contains("ERR_NAME_NOT_RESOLVED"));
    }

    #[test]
    fn test_element_not_found_error() {
        let err = FetchError::ElementNotFound("#rateStr".to_string());
        assert!(err.to_string().contains("#rateStr"));
    }

    #[test]
    fn test_release_error() {
        let err = FetchError::Release {
            pid: 4242,
            reason: "permission denied".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("4242"));
        assert!(display.contains("permission denied"));
    }

    #[test]
    fn test_all_error_variants() {
        let errors: Vec<FetchError> = vec![
            FetchError::Navigation("a".to_string()),
            FetchError::ElementNotFound("b".to_string()),
            FetchError::SessionTimeout("c".to_string()),
            FetchError::SessionClosed,
            FetchError::LaunchFailed("d".to_string()),
            FetchError::Protocol("e".to_string()),
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
