//! HTTP client binary: fetches a dependency manifest and everything it
//! transitively names, over a bounded pool of pipelined connections.

use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tokio::net::lookup_host;

use pipeline_http::config::{load_config, EngineConfig};
use pipeline_http::observability::init_tracing;
use pipeline_http::{FetchEngine, DEFAULT_PORT};

#[derive(Parser)]
#[command(name = "pipeline-client")]
#[command(about = "Dependency-graph fetcher over pipelined HTTP/1.1", long_about = None)]
struct Args {
    /// Server address; the default port is appended when none is given.
    server: String,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to write fetched resources into.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("pipeline_http=debug,pipeline_client=debug");

    let args = Args::parse();

    let config = match args.config {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "Failed to load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };

    let server = if args.server.contains(':') {
        args.server.clone()
    } else {
        format!("{}:{DEFAULT_PORT}", args.server)
    };
    let target = match lookup_host(&server).await.map(|mut addrs| addrs.next()) {
        Ok(Some(addr)) => addr,
        Ok(None) | Err(_) => {
            tracing::error!(server = %server, "Could not resolve server address");
            return ExitCode::FAILURE;
        }
    };

    let engine = FetchEngine::new(config.client, target);
    let report = match engine.run().await {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(error = %err, "Fetch failed");
            return ExitCode::FAILURE;
        }
    };

    for (path, body) in &report.resources {
        tracing::info!(path = %path, bytes = body.len(), "Fetched");
        if let Some(out) = &args.out {
            let Some(file) = artifact_path(out, path) else {
                tracing::warn!(path = %path, "Refusing artifact path outside the output directory");
                continue;
            };
            if let Some(parent) = file.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(err) = std::fs::write(&file, body) {
                tracing::warn!(path = %file.display(), error = %err, "Could not write artifact");
            }
        }
    }
    for path in &report.failed {
        tracing::warn!(path = %path, "Failed to fetch");
    }

    if report.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Where a fetched resource lands under the output directory. `None` for
/// paths that would step outside it.
fn artifact_path(out: &Path, resource: &str) -> Option<PathBuf> {
    let relative = Path::new(resource.trim_start_matches('/'));
    let mut components = relative.components().peekable();
    components.peek()?;
    if components.all(|c| matches!(c, Component::Normal(_))) {
        Some(out.join(relative))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_stay_inside_the_output_directory() {
        let out = Path::new("/tmp/out");
        assert_eq!(artifact_path(out, "/a.txt"), Some(out.join("a.txt")));
        assert_eq!(
            artifact_path(out, "/sub/dir/b.txt"),
            Some(out.join("sub/dir/b.txt"))
        );
        assert_eq!(artifact_path(out, "/../escape.txt"), None);
        assert_eq!(artifact_path(out, "/a/../../b.txt"), None);
        assert_eq!(artifact_path(out, "/"), None);
    }
}
