//! Declarative YAML test specification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{E2eError, E2eResult};

/// A complete test specification parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this test
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering tests
    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

/// A single step in a test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Issue an HTTP request and check the response status
    Request {
        path: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        expect_status: StatusExpectation,
    },

    /// Query the body of the last `request` step
    AssertCss {
        selector: String,
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        text: Option<String>,
    },

    /// Open a path in the browser
    Visit {
        path: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Query the page currently open in the browser
    AssertSelector {
        selector: String,
        #[serde(default)]
        count: Option<usize>,
    },

    /// Log a message (for debugging)
    Log { message: String },
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_wait_timeout() -> u64 {
    5000 // 5 seconds default
}

impl TestStep {
    /// Whether this step needs a browser session
    pub fn requires_browser(&self) -> bool {
        matches!(self, TestStep::Visit { .. } | TestStep::AssertSelector { .. })
    }

    /// Short label used in results and logs
    pub fn label(&self) -> String {
        match self {
            TestStep::Request { path, method, .. } => format!("request {} {}", method, path),
            TestStep::AssertCss { selector, .. } => format!("assert_css {}", selector),
            TestStep::Visit { path, .. } => format!("visit {}", path),
            TestStep::AssertSelector { selector, .. } => format!("assert_selector {}", selector),
            TestStep::Log { .. } => "log".to_string(),
        }
    }
}

/// Expected response status: an exact code or a status class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusExpectation {
    Code(u16),
    Class(StatusClass),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Success,
    Redirect,
    ClientError,
    ServerError,
}

impl Default for StatusExpectation {
    fn default() -> Self {
        StatusExpectation::Class(StatusClass::Success)
    }
}

impl StatusExpectation {
    pub fn matches(&self, status: u16) -> bool {
        match self {
            StatusExpectation::Code(code) => *code == status,
            StatusExpectation::Class(StatusClass::Success) => (200..300).contains(&status),
            StatusExpectation::Class(StatusClass::Redirect) => (300..400).contains(&status),
            StatusExpectation::Class(StatusClass::ClientError) => (400..500).contains(&status),
            StatusExpectation::Class(StatusClass::ServerError) => (500..600).contains(&status),
        }
    }
}

impl fmt::Display for StatusExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusExpectation::Code(code) => write!(f, "{}", code),
            StatusExpectation::Class(StatusClass::Success) => f.write_str("success (2xx)"),
            StatusExpectation::Class(StatusClass::Redirect) => f.write_str("redirect (3xx)"),
            StatusExpectation::Class(StatusClass::ClientError) => f.write_str("client error (4xx)"),
            StatusExpectation::Class(StatusClass::ServerError) => f.write_str("server error (5xx)"),
        }
    }
}

impl TestSpec {
    /// Parse a test spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        if spec.steps.is_empty() {
            return Err(E2eError::SpecParse(format!("{}: no steps", spec.name)));
        }
        Ok(spec)
    }

    /// Parse a test spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all test specs from a directory, ordered by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Whether any step needs a browser session
    pub fn requires_browser(&self) -> bool {
        self.steps.iter().any(TestStep::requires_browser)
    }
}
