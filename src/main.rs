// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use imagecraft_server::api::start_server;
use imagecraft_server::config::AppConfig;
use imagecraft_server::version;

#[derive(Parser, Debug)]
#[command(name = "imagecraft-server", version = version::VERSION)]
#[command(about = "Image processing API server")]
struct Cli {
    /// Port to listen on (overrides API_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// JSON file backing the handoff store across restarts
    /// (overrides HANDOFF_STATE_FILE)
    #[arg(long)]
    state_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(port) = cli.port {
        config.bind_addr.set_port(port);
    }
    if let Some(state_file) = cli.state_file {
        config.state_file = Some(state_file);
    }

    info!(
        "✅ ImageCraft server v{} ({}) starting",
        version::VERSION,
        version::BUILD_DATE
    );

    start_server(config).await
}
