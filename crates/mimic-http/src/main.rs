//! Mimic CLI
//!
//! Serves the expectations of a configuration file until interrupted, then
//! reports whether every call-count constraint held.
//!
//! Usage:
//!   mimic --config mocks.yaml [--port 8080] [--log-level debug]

use anyhow::Context;
use clap::Parser;
use mimic_http::config::MockConfig;
use mimic_http::server::{MockServer, ServerOptions};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Mimic - HTTP test double
#[derive(Parser, Debug)]
#[command(name = "mimic")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML, or JSON with a .json extension)
    #[arg(short, long, env = "MIMIC_CONFIG")]
    config: String,

    /// Override the listen port from the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Exit with a failure status when verification fails on shutdown
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = MockConfig::from_file(&args.config)?;
    if let Some(port) = args.port {
        config.listen.port = port;
    }

    let registry = config.into_registry()?;
    let options = ServerOptions {
        addr: config.listen.socket_addr()?,
        log_response_content: config.log_response_content,
    };
    let server = MockServer::start_with(options, registry).await?;
    info!("Serving {} on http://{}", args.config, server.addr());

    tokio::signal::ctrl_c().await.ok();

    let outcome = server.registry().assert_verified();
    server.shutdown().await;
    match outcome {
        Ok(()) => {
            info!("All expectations verified");
            Ok(())
        }
        Err(failure) => {
            error!("{}", failure);
            if args.strict {
                anyhow::bail!("Verification failed");
            }
            Ok(())
        }
    }
}
