//! chain-relay
//!
//! Relays tool calls from protocol clients to a blockchain JSON-RPC provider.
//!
//! # Architecture Overview
//!
//! ```text
//!   stdio client ──▶ gateway::stdio ─┐
//!                                    ├─▶ protocol::handler ─▶ protocol::tools ─▶ blockchain::client ─▶ provider
//!   HTTP client ──▶ http::server ────┘          ▲                                      │
//!                      │                        │                               resilience
//!                      └─▶ sessions::registry ──┘                        (classify, back off, retry)
//! ```

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpListener;

use chain_relay::blockchain::RpcInvoker;
use chain_relay::config::{self, loader, GatewayConfig};
use chain_relay::gateway::run_stdio;
use chain_relay::lifecycle::{wait_for_signal, Shutdown};
use chain_relay::observability::{logging, metrics};
use chain_relay::protocol::{HandlerFactory, McpHandlerFactory, RelayTools};
use chain_relay::HttpServer;

#[derive(Parser)]
#[command(name = "chain-relay", version, about = "Session-aware JSON-RPC relay for blockchain providers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve sessions over HTTP
    Serve {
        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the listener bind address
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
    /// Serve a single session over stdin/stdout
    Stdio {
        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load(path: Option<&Path>) -> Result<GatewayConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config(path),
        None => loader::finalize(GatewayConfig::default()),
    }
}

fn handler_factory(config: &GatewayConfig) -> Result<Arc<dyn HandlerFactory>, Box<dyn std::error::Error>> {
    let invoker = Arc::new(RpcInvoker::new(&config.upstream, &config.retries)?);
    tracing::info!(
        default_target = invoker.default_target(),
        max_attempts = invoker.max_attempts(),
        "Upstream invoker ready"
    );
    let tools = Arc::new(RelayTools::new(invoker, config.security.max_response_chars));
    Ok(Arc::new(McpHandlerFactory::new(tools)))
}

fn init_observability(config: &GatewayConfig) {
    logging::init_logging(&config.observability.log_level);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, bind } => {
            let mut config = load(config.as_deref())?;
            if let Some(bind) = bind {
                config.listener.bind_address = bind.to_string();
            }
            init_observability(&config);
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "chain-relay starting");

            let factory = handler_factory(&config)?;
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            tracing::info!(
                address = %listener.local_addr()?,
                endpoint = %config.listener.endpoint_path,
                max_sessions = config.sessions.max_sessions,
                "Listening for connections"
            );

            let shutdown = Shutdown::new();
            tokio::spawn(wait_for_signal(shutdown.clone()));

            let server = HttpServer::new(&config, factory);
            server.run(listener, shutdown.subscribe()).await?;
        }
        Command::Stdio { config } => {
            let config = load(config.as_deref())?;
            init_observability(&config);
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "chain-relay starting in direct-pipe mode");

            let factory = handler_factory(&config)?;
            let stdin = BufReader::new(tokio::io::stdin());
            run_stdio(stdin, tokio::io::stdout(), factory.create(), config.security.max_body_size).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
