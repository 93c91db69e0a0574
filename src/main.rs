//! Iris capture service: request/response USB camera capture over TCP

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use tokio::net::TcpListener;
use tracing::info;

use iris::capture::V4l2Backend;
use iris::command::{transport, CommandDispatcher};
use iris::Config;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: u16,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("iris=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let backend = Arc::new(V4l2Backend::new(&config.capture));
    let dispatcher = CommandDispatcher::new(backend, &config.capture);

    let addr = format!("{}:{}", config.server.bind_addr, args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "iris listening");

    transport::serve(listener, dispatcher).await?;

    info!("iris shutting down");
    Ok(())
}
