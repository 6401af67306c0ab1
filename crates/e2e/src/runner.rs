//! Main test runner that orchestrates the server, requests and the browser

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use viewkit_common::markup::{expect_css, expect_css_count, expect_text};
use viewkit_common::Markup;

use crate::driver::{DriverConfig, DriverHandle, Session};
use crate::error::{E2eError, E2eResult};
use crate::request::{expect_status, fetch};
use crate::server::{default_bind, ServerHandle, Target};
use crate::spec::{TestSpec, TestStep};

/// How a single test ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    /// A predicate about the application was unmet
    Failed { reason: String },
    /// The test infrastructure failed (driver, network, bad spec)
    Errored { reason: String },
    Skipped { reason: String },
}

/// Result of executing a test step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    fn skipped(spec: &TestSpec, reason: &str) -> Self {
        Self {
            name: spec.name.clone(),
            outcome: Outcome::Skipped {
                reason: reason.to_string(),
            },
            duration_ms: 0,
            steps: vec![],
        }
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn from_results(results: Vec<TestResult>, duration_ms: u64) -> Self {
        let count = |f: fn(&Outcome) -> bool| results.iter().filter(|r| f(&r.outcome)).count();
        Self {
            total: results.len(),
            passed: count(|o| matches!(o, Outcome::Passed)),
            failed: count(|o| matches!(o, Outcome::Failed { .. })),
            errored: count(|o| matches!(o, Outcome::Errored { .. })),
            skipped: count(|o| matches!(o, Outcome::Skipped { .. })),
            duration_ms,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }
}

/// Per-spec state carried between steps
#[derive(Default)]
struct SpecContext {
    last_body: Option<Markup>,
    session: Option<Session>,
}

/// Main E2E test runner
pub struct TestRunner {
    /// Application under test
    target: Target,

    /// Browser driver configuration; browser specs are skipped without one
    driver: Option<DriverConfig>,

    /// Running server handle (if any)
    server: Option<ServerHandle>,

    /// HTTP client for request steps
    client: reqwest::Client,

    /// Timeout for server startup
    startup_timeout: Duration,

    /// Test specs directory
    specs_dir: PathBuf,

    /// Output directory for results
    output_dir: PathBuf,
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            target: config.target,
            driver: config.driver,
            server: None,
            client: reqwest::Client::new(),
            startup_timeout: config.startup_timeout,
            specs_dir: config.specs_dir,
            output_dir: config.output_dir,
        }
    }

    /// Start the server
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() {
            return Ok(()); // Already running
        }

        // A remote browser must reach the application from another host.
        let bind = match &self.driver {
            Some(driver) if driver.needs_public_bind() => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            _ => default_bind(),
        };

        let server = ServerHandle::start(self.target.clone(), bind, self.startup_timeout).await?;
        self.server = Some(server);
        Ok(())
    }

    /// Stop the server
    pub fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    /// Base URL of the running application
    pub fn base_url(&self) -> Option<&str> {
        self.server.as_ref().map(ServerHandle::base_url)
    }

    /// Run all tests in the specs directory
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        self.run_specs(&specs).await
    }

    /// Run tests matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        let filtered: Vec<TestSpec> = TestSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run a specific test by name
    pub async fn run_test(&mut self, name: &str) -> E2eResult<TestResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Test not found: {}", name)))?;

        self.start_server().await?;
        Ok(self.run_spec(&spec).await)
    }

    /// Run a list of test specs
    pub async fn run_specs(&mut self, specs: &[TestSpec]) -> E2eResult<TestSuiteResult> {
        let start = Instant::now();
        let mut results = Vec::new();

        // Ensure server is running
        self.start_server().await?;

        info!("Running {} test(s)...", specs.len());

        for spec in specs {
            let result = self.run_spec(spec).await;
            match &result.outcome {
                Outcome::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
                Outcome::Failed { reason } => error!("✗ {} - {}", result.name, reason),
                Outcome::Errored { reason } => error!("! {} - {}", result.name, reason),
                Outcome::Skipped { reason } => info!("- {} skipped: {}", result.name, reason),
            }
            results.push(result);
        }

        let suite = TestSuiteResult::from_results(results, start.elapsed().as_millis() as u64);

        info!(
            "Test Results: {} passed, {} failed, {} errored, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.errored, suite.skipped, suite.duration_ms
        );

        Ok(suite)
    }

    /// Run a single test spec. Failures are reported in the result, never
    /// as an error, so one spec cannot abort the others.
    pub async fn run_spec(&self, spec: &TestSpec) -> TestResult {
        let start = Instant::now();
        debug!("Running test: {}", spec.name);

        let Some(server) = self.server.as_ref() else {
            return TestResult {
                name: spec.name.clone(),
                outcome: Outcome::Errored {
                    reason: "server is not running".to_string(),
                },
                duration_ms: 0,
                steps: vec![],
            };
        };

        let base_url = server.base_url().to_string();
        let mut context = SpecContext::default();
        let mut driver: Option<DriverHandle> = None;
        let mut app_url = base_url.clone();

        if spec.requires_browser() {
            let Some(config) = self.driver.clone() else {
                return TestResult::skipped(spec, "no browser driver configured");
            };
            app_url = server.browser_base_url(&config).await;

            let opened = async {
                let handle = DriverHandle::connect(config).await?;
                let session = handle.new_session().await?;
                Ok::<_, E2eError>((handle, session))
            }
            .await;

            match opened {
                Ok((handle, session)) => {
                    driver = Some(handle);
                    context.session = Some(session);
                }
                Err(e) => {
                    return TestResult {
                        name: spec.name.clone(),
                        outcome: Outcome::Errored {
                            reason: e.to_string(),
                        },
                        duration_ms: start.elapsed().as_millis() as u64,
                        steps: vec![],
                    };
                }
            }
        }

        let mut steps = Vec::new();
        let mut outcome = Outcome::Passed;

        for step in &spec.steps {
            let step_start = Instant::now();
            let result = self
                .execute_step(step, &base_url, &app_url, &mut context)
                .await;

            steps.push(StepResult {
                success: result.is_ok(),
                step_name: step.label(),
                duration_ms: step_start.elapsed().as_millis() as u64,
                error: result.as_ref().err().map(|e| e.to_string()),
            });

            if let Err(e) = result {
                let reason = e.to_string();
                outcome = if e.is_assertion() {
                    Outcome::Failed { reason }
                } else {
                    Outcome::Errored { reason }
                };
                break; // Stop on first failure
            }
        }

        if let Some(session) = context.session.take() {
            if let Err(e) = session.close().await {
                debug!("Failed to close browser session: {}", e);
            }
        }
        drop(driver);

        TestResult {
            name: spec.name.clone(),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
        }
    }

    async fn execute_step(
        &self,
        step: &TestStep,
        base_url: &str,
        app_url: &str,
        context: &mut SpecContext,
    ) -> E2eResult<()> {
        debug!("Executing step: {}", step.label());

        match step {
            TestStep::Request {
                path,
                method,
                expect_status: expectation,
            } => {
                let url = format!("{}{}", base_url, path);
                let response = fetch(&self.client, method, &url).await?;
                context.last_body = Some(response.body);
                expect_status(&format!("{} {}", method, path), response.status, *expectation)
            }
            TestStep::AssertCss {
                selector,
                count,
                text,
            } => {
                let body = context.last_body.as_ref().ok_or_else(|| {
                    E2eError::SpecParse("assert_css requires a preceding request step".into())
                })?;
                match count {
                    Some(expected) => expect_css_count(body, selector, *expected)?,
                    None => expect_css(body, selector)?,
                }
                if let Some(expected) = text {
                    expect_text(body, selector, expected)?;
                }
                Ok(())
            }
            TestStep::Visit {
                path,
                wait_for_selector,
                timeout_ms,
            } => {
                let session = browser_session(context)?;
                session.navigate(&format!("{}{}", app_url, path)).await?;
                if let Some(selector) = wait_for_selector {
                    session
                        .wait_for(selector, Duration::from_millis(*timeout_ms))
                        .await?;
                }
                Ok(())
            }
            TestStep::AssertSelector { selector, count } => {
                let session = browser_session(context)?;
                let actual = session.count_elements(selector).await?;
                match count {
                    Some(expected) if actual != *expected => Err(E2eError::AssertionFailed(format!(
                        "expected {} match(es) for `{}`, found {}",
                        expected, selector, actual
                    ))),
                    None if actual == 0 => Err(E2eError::AssertionFailed(format!(
                        "expected page to contain `{}`, found none",
                        selector
                    ))),
                    _ => Ok(()),
                }
            }
            TestStep::Log { message } => {
                info!("[TEST LOG] {}", message);
                Ok(())
            }
        }
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

fn browser_session(context: &SpecContext) -> E2eResult<&Session> {
    context
        .session
        .as_ref()
        .ok_or_else(|| E2eError::Driver("no browser session".into()))
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub target: Target,
    pub driver: Option<DriverConfig>,
    pub startup_timeout: Duration,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            target: Target::default(),
            driver: None,
            startup_timeout: Duration::from_secs(30),
            specs_dir: PathBuf::from("tests/specs"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}
