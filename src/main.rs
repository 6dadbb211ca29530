mod api;
mod config;
mod forward;
mod lookup;
mod relay;
mod server;
#[cfg(test)]
mod test_support;
mod widget;

use crate::config::AppConfig;
use crate::server::AppState;
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bot-relay")]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version)]
struct CliArguments {
    /// Listen address; overrides BIND_ADDR.
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = CliArguments::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if config.relay.dev_mode {
        tracing::warn!("development mode: internal errors include stack information");
    }

    let addr = config.bind_addr;
    let state = AppState::new(config)?;
    tracing::info!(%addr, "starting bot-relay server");
    server::run(addr, state).await?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
