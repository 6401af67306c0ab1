//! E2E test harness entry point
//!
//! This file is the test binary that runs E2E tests from YAML specs.
//! Run with: cargo test --package viewkit-e2e --test e2e
//!
//! Browser specs run only when a driver is requested with `--browser-driver`
//! or `VIEWKIT_DRIVER_URL`; otherwise they are reported as skipped.

use std::path::PathBuf;
use std::time::Duration;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use viewkit_e2e::{
    Browser, DriverConfig, E2eResult, RunnerConfig, ServerConfig, Target, TestRunner,
    TestSuiteResult,
};

#[derive(Parser, Debug)]
#[command(name = "viewkit-e2e")]
#[command(about = "E2E test runner for viewkit")]
// cargo test forwards libtest flags such as --nocapture
#[command(ignore_errors = true)]
struct Args {
    /// Path to test specs directory
    #[arg(short, long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/specs"))]
    specs: PathBuf,

    /// Run only tests matching this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific test by name
    #[arg(short, long)]
    name: Option<String>,

    /// Spawn this viewkit-web binary instead of serving in-process
    #[arg(long)]
    server_binary: Option<PathBuf>,

    /// Test an already running application
    #[arg(long, conflicts_with = "server_binary")]
    base_url: Option<String>,

    /// Remote WebDriver endpoint
    #[arg(long, env = "VIEWKIT_DRIVER_URL")]
    driver_url: Option<String>,

    /// Launch a local browser driver for system specs
    #[arg(long)]
    browser_driver: bool,

    /// Local driver executable (chromedriver, geckodriver)
    #[arg(long)]
    driver_binary: Option<PathBuf>,

    /// Browser to use (chrome, firefox)
    #[arg(long, env = "VIEWKIT_BROWSER", default_value = "chrome")]
    browser: String,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Server startup timeout in seconds
    #[arg(long, default_value = "30")]
    startup_timeout: u64,

    /// Output directory for results
    #[arg(short, long, default_value = concat!(env!("CARGO_TARGET_TMPDIR"), "/e2e-results"))]
    output: PathBuf,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Run async main
    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async_main(args));

    match result {
        Ok(success) => {
            if success {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

fn driver_config(args: &Args) -> Option<DriverConfig> {
    if args.driver_url.is_none() && !args.browser_driver {
        return None;
    }

    // VIEWKIT_APP_HOST still comes from the environment
    let app_host = DriverConfig::from_env().app_host;
    let mut config = match Browser::parse(&args.browser) {
        Some(browser) => DriverConfig::for_browser(browser),
        None => DriverConfig::default(),
    };
    config.remote_url = args.driver_url.clone();
    config.app_host = app_host;
    if let Some(binary) = &args.driver_binary {
        config.driver_binary = binary.clone();
    }
    config.headless = !args.headed;
    Some(config)
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let target = match (&args.base_url, &args.server_binary) {
        (Some(base_url), _) => Target::External {
            base_url: base_url.clone(),
        },
        (None, Some(binary)) => Target::Spawn(ServerConfig {
            binary_path: binary.clone(),
            ..Default::default()
        }),
        (None, None) => Target::default(),
    };

    let config = RunnerConfig {
        target,
        driver: driver_config(&args),
        startup_timeout: Duration::from_secs(args.startup_timeout),
        specs_dir: args.specs.clone(),
        output_dir: args.output.clone(),
    };

    let mut runner = TestRunner::with_config(config);

    // Start server
    runner.start_server().await?;

    // Run tests
    let results = if let Some(name) = &args.name {
        let started = std::time::Instant::now();
        let result = runner.run_test(name).await?;
        TestSuiteResult::from_results(vec![result], started.elapsed().as_millis() as u64)
    } else if let Some(tag) = &args.tag {
        runner.run_tagged(tag).await?
    } else {
        runner.run_all().await?
    };

    // Write results
    runner.write_results(&results)?;
    runner.stop_server()?;

    Ok(results.success())
}
