//! Static file serving.

use std::path::{Component, Path, PathBuf};

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use percent_encoding::percent_decode_str;

use crate::error::NetworkResult;

/// Map a file extension to a content type
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") | Some("map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("wasm") => "application/wasm",
        Some("txt") => "text/plain; charset=utf-8",
        Some("webmanifest") => "application/manifest+json",
        _ => "application/octet-stream",
    }
}

/// Turn a URL path into a relative filesystem path.
///
/// Percent-escapes are decoded first. Returns `None` for anything that could
/// leave the served directory (`..`, absolute or prefixed components,
/// backslashes, NUL).
pub fn sanitize(url_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(url_path).decode_utf8().ok()?;
    if decoded.contains('\\') || decoded.contains('\0') {
        return None;
    }

    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match Path::new(segment).components().next() {
            None | Some(Component::CurDir) => continue,
            Some(Component::Normal(part)) => relative.push(part),
            _ => return None,
        }
    }
    Some(relative)
}

/// A directory whose files are served as-is
#[derive(Debug, Clone)]
pub struct StaticDir {
    root: PathBuf,
}

impl StaticDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Serve `url_path` from this directory.
    ///
    /// `Ok(None)` means "not here", letting the caller try the next source.
    /// A directory is served through its `index.html`.
    pub async fn serve(&self, url_path: &str) -> NetworkResult<Option<Response<Body>>> {
        let relative = match sanitize(url_path) {
            Some(relative) => relative,
            None => {
                log::warn!("Rejected static path: {}", url_path);
                return Ok(None);
            }
        };

        let mut path = self.root.join(relative);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => path.push("index.html"),
            Ok(_) => {}
            Err(_) => return Ok(None),
        }

        self.read(&path).await
    }

    /// Serve one specific file relative to the root
    pub async fn serve_file(&self, name: &str) -> NetworkResult<Option<Response<Body>>> {
        self.read(&self.root.join(name)).await
    }

    async fn read(&self, path: &Path) -> NetworkResult<Option<Response<Body>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let mut response = Response::new(Body::from(bytes));
                *response.status_mut() = StatusCode::OK;
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static(content_type(path)),
                );
                Ok(Some(response))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
