//! Content collaborator: turns a parsed request into a response.
//!
//! This is deliberately outside the protocol core. The event loop only needs
//! something total over syntactically valid requests; tests inject canned
//! builders through the trait.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use crate::error::Error;
use crate::http::{Method, Request, Response};

/// Builds a response for every syntactically valid request.
pub trait ResponseBuilder {
    fn build(&self, request: &Request) -> Response;
}

/// Serves files from a content root.
///
/// - `/` resolves to `index.html`
/// - GET returns the file, HEAD the same headers without the body
/// - POST echoes the posted body back
/// - anything unresolvable is a 404
#[derive(Debug, Clone)]
pub struct StaticContent {
    root: PathBuf,
}

impl StaticContent {
    /// Fails fast when `root` is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::ContentRoot(root));
        }
        Ok(Self { root })
    }

    /// Map a request target to a path under the root. `None` for targets
    /// that escape the root.
    fn resolve(&self, target: &str) -> Option<PathBuf> {
        let path = target.split('?').next().unwrap_or(target);
        let path = path.trim_start_matches('/');
        let path = if path.is_empty() { "index.html" } else { path };
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl ResponseBuilder for StaticContent {
    fn build(&self, request: &Request) -> Response {
        match request.method {
            Method::Post => {
                // The reference behavior: echo the posted body back.
                let content_type = request
                    .headers
                    .get("Content-Type")
                    .unwrap_or("application/octet-stream");
                Response::ok(content_type, request.body.clone())
            }
            Method::Get | Method::Head => {
                let Some(path) = self.resolve(&request.target) else {
                    return Response::not_found();
                };
                match std::fs::read(&path) {
                    Ok(data) => {
                        let content_type = mime_type(&path);
                        if request.method == Method::Head {
                            Response::head_only(200, "OK", content_type, data.len())
                        } else {
                            Response::ok(content_type, Bytes::from(data))
                        }
                    }
                    Err(err) => {
                        tracing::debug!(path = %path.display(), error = %err, "Content lookup failed");
                        Response::not_found()
                    }
                }
            }
        }
    }
}

/// MIME type by file extension.
fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("txt") | Some("csv") => "text/plain",
        _ => "application/octet-stream",
    }
}
