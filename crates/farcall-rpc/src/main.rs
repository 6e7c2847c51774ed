//! Farcall RPC Server - hosts demo dispatcher endpoints.
//!
//! Serves the dispatcher operations as JSON-RPC 2.0 over HTTP (`/rpc`) and
//! over the framed TCP transport.

mod demo;
mod handler;
mod server;

use anyhow::Result;
use clap::Parser;
use farcall::{EndpointTable, IpcServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "farcall-rpc")]
#[command(about = "Remote method dispatch server")]
struct Args {
    /// HTTP port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Framed TCP port to listen on (0 = auto-assign)
    #[arg(long, default_value = "0")]
    ipc_port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Name of the dispatcher endpoint
    #[arg(long, default_value = "farcall:name=demo")]
    endpoint: String,

    /// Comma-separated stateless names
    #[arg(long, default_value = "svc,counter")]
    stateless_names: String,

    /// Comma-separated stateful names
    #[arg(long, default_value = "account")]
    stateful_names: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Farcall RPC Server");

    let dispatcher = demo::dispatcher(&args.stateless_names, &args.stateful_names)?;
    let endpoints = Arc::new(EndpointTable::new().with_endpoint(args.endpoint.clone(), dispatcher));
    info!("Serving endpoint {}", args.endpoint);

    let http_addr = server::start_server(endpoints.clone(), &args.host, args.port).await?;

    let ipc_addr: SocketAddr = format!("{}:{}", args.host, args.ipc_port).parse()?;
    let mut ipc = IpcServer::start(endpoints.clone(), ipc_addr).await?;

    // Print ports for the launching process to read (intentional stdout)
    println!("RPC_PORT={}", http_addr.port());
    println!("IPC_PORT={}", ipc.port);

    info!("RPC server running on {} (TCP on {})", http_addr, ipc.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    ipc.shutdown();
    endpoints.shutdown();

    Ok(())
}
