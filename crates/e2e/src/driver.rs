//! Browser automation over the W3C WebDriver protocol
//!
//! A [`DriverHandle`] is either a `chromedriver`/`geckodriver` subprocess
//! launched for the test run or a remote endpoint (a Selenium grid, a
//! container). Launch parameters live in [`DriverConfig`], which is built
//! once during harness setup and passed in explicitly.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::process::{Child, Command as TokioCommand};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::server::find_free_port;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
        }
    }

    fn options_key(&self) -> &'static str {
        match self {
            Browser::Chrome => "goog:chromeOptions",
            Browser::Firefox => "moz:firefoxOptions",
        }
    }

    fn default_driver_binary(&self) -> &'static str {
        match self {
            Browser::Chrome => "chromedriver",
            Browser::Firefox => "geckodriver",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Some(Browser::Chrome),
            "firefox" => Some(Browser::Firefox),
            _ => None,
        }
    }
}

/// Browser driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub browser: Browser,

    /// Remote WebDriver endpoint; when unset a local driver is launched
    pub remote_url: Option<String>,

    /// Local driver executable
    pub driver_binary: PathBuf,

    /// Port for the local driver (None = find free port)
    pub driver_port: Option<u16>,

    pub headless: bool,

    /// Browser window width and height
    pub window_size: (u32, u32),

    /// Extra browser command-line arguments
    pub extra_args: Vec<String>,

    /// Requested browser version; None lets the driver choose
    pub browser_version: Option<String>,

    /// Host the browser should use to reach the application
    pub app_host: Option<String>,

    /// How long to wait for the driver to report ready
    pub startup_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        let browser = Browser::default();
        Self {
            browser,
            remote_url: None,
            driver_binary: PathBuf::from(browser.default_driver_binary()),
            driver_port: None,
            headless: true,
            window_size: (1400, 1400),
            extra_args: vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-gpu".to_string(),
            ],
            browser_version: None,
            app_host: None,
            startup_timeout: Duration::from_secs(10),
        }
    }
}

impl DriverConfig {
    /// Read `VIEWKIT_DRIVER_URL`, `VIEWKIT_APP_HOST` and `VIEWKIT_BROWSER`
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = match non_empty("VIEWKIT_BROWSER").and_then(|b| Browser::parse(&b)) {
            Some(browser) => Self::for_browser(browser),
            None => Self::default(),
        };
        config.remote_url = non_empty("VIEWKIT_DRIVER_URL");
        config.app_host = non_empty("VIEWKIT_APP_HOST");
        config
    }

    /// Defaults for a given browser
    pub fn for_browser(browser: Browser) -> Self {
        Self {
            browser,
            driver_binary: PathBuf::from(browser.default_driver_binary()),
            ..Default::default()
        }
    }

    /// Command-line arguments handed to the browser
    pub fn browser_args(&self) -> Vec<String> {
        let (width, height) = self.window_size;
        let mut args = Vec::new();

        match self.browser {
            Browser::Chrome => {
                if self.headless {
                    args.push("--headless".to_string());
                }
                args.extend(self.extra_args.iter().cloned());
                args.push(format!("--window-size={},{}", width, height));
            }
            Browser::Firefox => {
                if self.headless {
                    args.push("-headless".to_string());
                }
                args.extend(self.extra_args.iter().cloned());
                args.push(format!("--width={}", width));
                args.push(format!("--height={}", height));
            }
        }

        args
    }

    /// New-session request body
    pub fn capabilities(&self) -> Value {
        let mut always_match = serde_json::Map::new();
        always_match.insert("browserName".into(), json!(self.browser.as_str()));
        always_match.insert(
            self.browser.options_key().into(),
            json!({ "args": self.browser_args() }),
        );
        if let Some(version) = &self.browser_version {
            always_match.insert("browserVersion".into(), json!(version));
        }
        json!({ "capabilities": { "alwaysMatch": always_match } })
    }

    /// Host the browser uses to reach the application.
    ///
    /// A remote browser cannot reach `127.0.0.1` of the test machine, so
    /// unless a host is configured the local hostname is resolved instead.
    pub async fn resolve_app_host(&self) -> Option<String> {
        if let Some(host) = &self.app_host {
            return Some(host.clone());
        }
        if self.remote_url.is_none() {
            return None;
        }

        let name = hostname::get().ok()?.into_string().ok()?;
        let resolved = tokio::net::lookup_host((name.as_str(), 0))
            .await
            .ok()?
            .find(|addr| addr.is_ipv4())
            .map(|addr| addr.ip().to_string());

        if resolved.is_none() {
            warn!("Could not resolve an address for host {}", name);
        }
        resolved
    }

    /// Rewrite the base URL of a locally served application for the
    /// browser's point of view
    pub async fn app_base_url(&self, server_base_url: &str) -> String {
        match self.resolve_app_host().await {
            Some(host) => rewrite_host(server_base_url, &host),
            None => server_base_url.to_string(),
        }
    }

    /// Whether the application must listen on all interfaces
    pub fn needs_public_bind(&self) -> bool {
        self.remote_url.is_some()
    }
}

fn rewrite_host(base_url: &str, host: &str) -> String {
    let (scheme, rest) = base_url.split_once("://").unwrap_or(("http", base_url));
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (authority, path) = rest.split_at(authority_end);
    let port = authority.rsplit_once(':').map(|(_, p)| p);

    match port {
        Some(port) => format!("{}://{}:{}{}", scheme, host, port, path),
        None => format!("{}://{}{}", scheme, host, path),
    }
}

/// A reachable WebDriver endpoint
pub struct DriverHandle {
    endpoint: String,
    client: reqwest::Client,
    config: DriverConfig,
    /// Local driver process; killed on drop
    _child: Option<Child>,
}

impl DriverHandle {
    /// Launch or attach to the driver and wait until it reports ready
    pub async fn connect(config: DriverConfig) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let (endpoint, child) = match &config.remote_url {
            Some(url) => {
                info!("Using remote WebDriver at {}", url);
                (url.trim_end_matches('/').to_string(), None)
            }
            None => {
                let port = match config.driver_port {
                    Some(port) => port,
                    None => find_free_port()?,
                };
                info!(
                    "Launching {} on port {}",
                    config.driver_binary.display(),
                    port
                );
                let child = TokioCommand::new(&config.driver_binary)
                    .arg(format!("--port={}", port))
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|e| {
                        E2eError::DriverUnavailable(format!(
                            "failed to launch {}: {}",
                            config.driver_binary.display(),
                            e
                        ))
                    })?;
                (format!("http://127.0.0.1:{}", port), Some(child))
            }
        };

        let handle = Self {
            endpoint,
            client,
            config,
            _child: child,
        };
        handle.wait_until_ready().await?;
        Ok(handle)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    async fn wait_until_ready(&self) -> E2eResult<()> {
        let status_url = format!("{}/status", self.endpoint);
        let start = Instant::now();

        while start.elapsed() < self.config.startup_timeout {
            match self.client.get(&status_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body: Value = resp.json().await.unwrap_or(Value::Null);
                    // Drivers that omit `ready` are treated as ready.
                    if body["value"]["ready"].as_bool().unwrap_or(true) {
                        return Ok(());
                    }
                    debug!("WebDriver not ready yet");
                }
                Ok(resp) => debug!("WebDriver status returned {}", resp.status()),
                Err(e) => {
                    if !e.is_connect() {
                        warn!("WebDriver status error: {}", e);
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::DriverUnavailable(format!(
            "{} not ready after {:?}",
            self.endpoint, self.config.startup_timeout
        )))
    }

    /// Open a new browser session
    pub async fn new_session(&self) -> E2eResult<Session> {
        let url = format!("{}/session", self.endpoint);
        let value = command(
            &self.client,
            reqwest::Method::POST,
            &url,
            Some(self.config.capabilities()),
        )
        .await?;

        let id = value["sessionId"]
            .as_str()
            .ok_or_else(|| E2eError::Driver("new session response has no sessionId".into()))?
            .to_string();

        debug!("Opened WebDriver session {}", id);
        Ok(Session {
            client: self.client.clone(),
            base: format!("{}/session/{}", self.endpoint, id),
            id,
        })
    }
}

/// An open browser session
pub struct Session {
    client: reqwest::Client,
    base: String,
    id: String,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn navigate(&self, url: &str) -> E2eResult<()> {
        command(
            &self.client,
            reqwest::Method::POST,
            &format!("{}/url", self.base),
            Some(json!({ "url": url })),
        )
        .await?;
        Ok(())
    }

    /// Number of elements matching a CSS selector
    pub async fn count_elements(&self, selector: &str) -> E2eResult<usize> {
        let value = command(
            &self.client,
            reqwest::Method::POST,
            &format!("{}/elements", self.base),
            Some(json!({ "using": "css selector", "value": selector })),
        )
        .await?;
        Ok(value.as_array().map(Vec::len).unwrap_or(0))
    }

    /// Poll until `selector` matches at least one element
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> E2eResult<()> {
        let start = Instant::now();
        loop {
            if self.count_elements(selector).await? > 0 {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(E2eError::Timeout(format!("selector {}", selector)));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub async fn close(self) -> E2eResult<()> {
        command(&self.client, reqwest::Method::DELETE, &self.base, None).await?;
        debug!("Closed WebDriver session {}", self.id);
        Ok(())
    }
}

/// Send a WebDriver command and unwrap its `value`
async fn command(
    client: &reqwest::Client,
    method: reqwest::Method,
    url: &str,
    body: Option<Value>,
) -> E2eResult<Value> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let resp = request
        .send()
        .await
        .map_err(|e| E2eError::Driver(format!("{}: {}", url, e)))?;
    let status = resp.status();
    let mut body: Value = resp.json().await?;

    if !status.is_success() {
        let message = body["value"]["message"]
            .as_str()
            .or_else(|| body["value"]["error"].as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(E2eError::Driver(format!("{} ({})", message, status)));
    }

    Ok(body["value"].take())
}
