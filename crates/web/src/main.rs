use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use viewkit_web::WebConfig;

#[derive(Parser, Debug)]
#[command(name = "viewkit-web")]
#[command(about = "viewkit web application")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "VIEWKIT_WEB_CONFIG", default_value = "viewkit.toml")]
    config: PathBuf,

    /// Listen address (overrides config and VIEWKIT_WEB_ADDR)
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut cfg = WebConfig::load(&args.config)?.apply_env()?;
    if let Some(listen) = args.listen {
        cfg.listen = listen;
    }

    info!(
        "Starting viewkit web on http://{} (previews: {})",
        cfg.listen, cfg.previews.enabled
    );

    viewkit_web::server::serve(cfg).await
}
