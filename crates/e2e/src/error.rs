//! Error types for E2E testing

use thiserror::Error;

use viewkit_common::AssertionFailure;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Browser driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// True when a predicate about the application was unmet, as opposed to
    /// the test infrastructure failing
    pub fn is_assertion(&self) -> bool {
        matches!(self, E2eError::AssertionFailed(_) | E2eError::Timeout(_))
    }
}

impl From<AssertionFailure> for E2eError {
    fn from(failure: AssertionFailure) -> Self {
        E2eError::AssertionFailed(failure.to_string())
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_classification() {
        let failure: E2eError = AssertionFailure::NoMatch {
            selector: "div".to_string(),
        }
        .into();
        assert!(failure.is_assertion());
        assert!(failure.to_string().contains("`div`"));

        assert!(!E2eError::DriverUnavailable("chromedriver".into()).is_assertion());
        assert!(!E2eError::ServerHealthCheck(3).is_assertion());
    }
}
