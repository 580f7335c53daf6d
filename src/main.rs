//! Luminary binary entry point.

use std::net::SocketAddr;

use clap::Parser;
use luminary::cli::{Cli, Commands};
use luminary::config::LuminaryConfig;
use luminary::error::LuminaryError;
use luminary::orchestrator::Orchestrator;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    let result = match LuminaryConfig::load(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Serve(args) => handle_serve(args.bind, config).await,
            Commands::Chat(args) => luminary::cli::chat::handle_chat(args, config).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "luminary failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn handle_serve(bind: Option<String>, config: LuminaryConfig) -> luminary::error::Result<()> {
    let raw = bind.unwrap_or_else(|| config.runtime.bind_address.clone());
    let addr: SocketAddr = raw
        .parse()
        .map_err(|e| LuminaryError::Configuration(format!("invalid bind address '{raw}': {e}")))?;
    luminary::server::serve(addr, Orchestrator::from_config(config)).await
}
