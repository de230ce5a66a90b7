use std::path::PathBuf;

use {clap::Parser, tracing_subscriber::EnvFilter};

use phonotek_config::{PhonotekConfig, discover_and_load, load_config};

/// Audio archive backend: upload, transcribe, and search voice recordings.
#[derive(Debug, Parser)]
#[command(name = "phonotek", version, about)]
struct Cli {
    /// Config file path; otherwise searched in cwd and ~/.config/phonotek.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override the bind address from the config file.
    #[arg(long, env = "PHONOTEK_BIND")]
    bind: Option<String>,

    /// Override the port from the config file.
    #[arg(long, short, env = "PHONOTEK_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config: PhonotekConfig = match &cli.config {
        Some(path) => load_config(path)?,
        None => discover_and_load(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    phonotek_server::start(config).await
}
