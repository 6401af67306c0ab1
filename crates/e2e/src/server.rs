//! Server management - starting and health checking the web application

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use viewkit_web::{WebConfig, WebServer};

use crate::driver::DriverConfig;
use crate::error::{E2eError, E2eResult};

/// Where the application under test comes from
#[derive(Debug, Clone)]
pub enum Target {
    /// Serve the router on a tokio task inside the test process
    InProcess(WebConfig),

    /// Spawn the viewkit-web binary
    Spawn(ServerConfig),

    /// An application that is already running
    External { base_url: String },
}

impl Default for Target {
    fn default() -> Self {
        Target::InProcess(WebConfig::default())
    }
}

enum Running {
    Process(Child),
    Task(JoinHandle<()>),
    External,
}

/// Handle to a running application
pub struct ServerHandle {
    running: Running,
    pub base_url: String,
    pub port: u16,
    /// Served by this harness, so reachable on this machine's addresses
    locally_served: bool,
}

impl ServerHandle {
    /// Start (or attach to) the target and wait until it is healthy
    pub async fn start(target: Target, bind: IpAddr, startup_timeout: Duration) -> E2eResult<Self> {
        let handle = match target {
            Target::InProcess(cfg) => Self::in_process(cfg, bind).await?,
            Target::Spawn(cfg) => Self::spawn(cfg, bind)?,
            Target::External { base_url } => Self::external(base_url)?,
        };

        handle.wait_for_healthy(startup_timeout).await?;
        info!("Server is healthy at {}", handle.base_url);
        Ok(handle)
    }

    /// Serve the web router on a background task
    async fn in_process(mut cfg: WebConfig, bind: IpAddr) -> E2eResult<Self> {
        cfg.listen = SocketAddr::new(bind, 0);
        let listener = tokio::net::TcpListener::bind(cfg.listen).await.map_err(|e| {
            E2eError::ServerStartup(format!("Failed to bind {}: {}", cfg.listen, e))
        })?;
        let port = listener.local_addr()?.port();

        info!("Serving web application in-process on port {}", port);

        let task = tokio::spawn(async move {
            if let Err(e) = WebServer::new(cfg).serve_listener(listener).await {
                warn!("In-process server exited: {}", e);
            }
        });

        Ok(Self {
            running: Running::Task(task),
            base_url: format!("http://127.0.0.1:{}", port),
            port,
            locally_served: true,
        })
    }

    /// Spawn the viewkit-web binary listening on `bind`
    fn spawn(config: ServerConfig, bind: IpAddr) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning web server on {}", SocketAddr::new(bind, port));

        let child = spawn_command(&config, bind, port).spawn().map_err(|e| {
            E2eError::ServerStartup(format!(
                "Failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

        Ok(Self {
            running: Running::Process(child),
            base_url,
            port,
            locally_served: true,
        })
    }

    fn external(base_url: String) -> E2eResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let port = base_url
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or(80);

        Ok(Self {
            running: Running::External,
            base_url,
            port,
            locally_served: false,
        })
    }

    /// Wait for the server to respond to health checks
    async fn wait_for_healthy(&self, timeout_duration: Duration) -> E2eResult<()> {
        let health_url = format!("{}/health", self.base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for server to start...");
                    }
                    // Connection refused is expected while server is starting
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL a browser should use to reach the application.
    ///
    /// Only an application served by this harness has its host rewritten
    /// for a remote browser; an external URL is used as given.
    pub async fn browser_base_url(&self, driver: &DriverConfig) -> String {
        if self.locally_served {
            driver.app_base_url(&self.base_url).await
        } else {
            self.base_url.clone()
        }
    }

    /// Stop the server
    pub fn stop(&mut self) -> E2eResult<()> {
        match &mut self.running {
            Running::Process(child) => {
                info!("Stopping server (pid: {})", child.id());

                // Try graceful shutdown first
                #[cfg(unix)]
                {
                    use nix::sys::signal::{kill, Signal};
                    use nix::unistd::Pid;

                    let pid = Pid::from_raw(child.id() as i32);
                    if kill(pid, Signal::SIGTERM).is_ok() {
                        std::thread::sleep(Duration::from_millis(500));
                    }
                }

                // Force kill if still running
                let _ = child.kill();
                let _ = child.wait();
            }
            Running::Task(task) => task.abort(),
            Running::External => {}
        }

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning a server binary
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the viewkit-web binary
    pub binary_path: PathBuf,

    /// Optional TOML config passed as VIEWKIT_WEB_CONFIG
    pub config_path: Option<PathBuf>,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Serve preview routes
    pub previews_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("target/debug/viewkit-web"),
            config_path: None,
            port: None,
            previews_enabled: true,
        }
    }
}

fn spawn_command(config: &ServerConfig, bind: IpAddr, port: u16) -> Command {
    let mut cmd = Command::new(&config.binary_path);
    cmd.env("VIEWKIT_WEB_ADDR", SocketAddr::new(bind, port).to_string())
        .env(
            "VIEWKIT_PREVIEWS_ENABLED",
            if config.previews_enabled { "1" } else { "0" },
        );

    if let Some(path) = &config.config_path {
        cmd.env("VIEWKIT_WEB_CONFIG", path);
    }

    cmd.stdout(Stdio::null()).stderr(Stdio::inherit());
    cmd
}

/// Address an in-process server binds to
pub fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// Find a free port to use
pub fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    Ok(TcpListener::bind("127.0.0.1:0")?.local_addr()?.port())
}
