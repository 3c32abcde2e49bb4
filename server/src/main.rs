use anyhow::Result;
use clap::Parser;
use server::{build_app, ServerConfig};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let config = ServerConfig::parse();
    let app = build_app(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, index = %config.index.display(), "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
