//! HTTP server binary: serves a content root over pipelined HTTP/1.1.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use pipeline_http::config::{load_config, EngineConfig};
use pipeline_http::observability::init_tracing;
use pipeline_http::server::{ServerEventLoop, StaticContent};

#[derive(Parser)]
#[command(name = "pipeline-server")]
#[command(about = "Pipelined HTTP/1.1 server for a static content root", long_about = None)]
struct Args {
    /// Directory served as the content root.
    www_root: PathBuf,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("pipeline_http=debug,pipeline_server=debug");

    let args = Args::parse();

    let mut config = match args.config {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "Failed to load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    let content = match StaticContent::new(&args.www_root) {
        Ok(content) => content,
        Err(err) => {
            tracing::error!(error = %err, "Refusing to start");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        www_root = %args.www_root.display(),
        bind_address = %config.server.bind_address,
        max_connections = config.server.max_connections,
        "Configuration loaded"
    );

    let listener = match TcpListener::bind(&config.server.bind_address).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(
                bind_address = %config.server.bind_address,
                error = %err,
                "Failed to bind"
            );
            return ExitCode::FAILURE;
        }
    };

    let engine = ServerEventLoop::new(config.server, content);
    if let Err(err) = engine.run(listener).await {
        tracing::error!(error = %err, "Server stopped");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
