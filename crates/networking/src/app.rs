//! Application handler: everything the tunnel does not claim.
//!
//! Lookup order is the JSON API, the content-rewriting bundle, the public
//! directory, then the application root (dev root or build output) with an
//! `index.html` fallback for client-side routes.

use async_trait::async_trait;
use hyper::header::{HeaderValue, CACHE_CONTROL};
use hyper::{Body, Method, Request, Response, StatusCode};

use crate::api::Api;
use crate::config::{ServeMode, ServerConfig};
use crate::error::NetworkResult;
use crate::response;
use crate::router::Handler;
use crate::static_files::StaticDir;

/// Bundle scripts also served from the root so the worker can claim `/`
pub const ROOT_SCOPED_SCRIPTS: [&str; 3] = ["uv.sw.js", "uv.handler.js", "uv.bundle.js"];

/// Path prefix of the content-rewriting bundle
pub const UV_PREFIX: &str = "/uv/";

/// The non-tunnel side of the server
pub struct Application {
    mode: ServeMode,
    api: Api,
    uv: StaticDir,
    public: StaticDir,
    app_root: StaticDir,
}

impl Application {
    pub fn new(config: &ServerConfig, api: Api) -> Self {
        Self {
            mode: config.mode,
            api,
            uv: StaticDir::new(&config.uv_dir),
            public: StaticDir::new(&config.public_dir),
            app_root: StaticDir::new(config.app_root()),
        }
    }

    async fn serve(&self, req: Request<Body>) -> NetworkResult<Response<Body>> {
        let path = req.uri().path().to_string();

        if path == "/api" || path.starts_with("/api/") {
            return Ok(self.api.handle(req).await);
        }

        if req.method() != Method::GET && req.method() != Method::HEAD {
            return Ok(response::text(
                StatusCode::METHOD_NOT_ALLOWED,
                "Method Not Allowed",
            ));
        }

        if let Some(rest) = path.strip_prefix(UV_PREFIX) {
            if let Some(found) = self.uv.serve(rest).await? {
                return Ok(found);
            }
        }

        let name = path.trim_start_matches('/');
        if ROOT_SCOPED_SCRIPTS.contains(&name) {
            if let Some(found) = self.uv.serve_file(name).await? {
                return Ok(found);
            }
            return Ok(response::text(StatusCode::NOT_FOUND, "Not Found"));
        }

        if let Some(found) = self.public.serve(&path).await? {
            return Ok(found);
        }
        if let Some(found) = self.app_root.serve(&path).await? {
            return Ok(found);
        }

        match self.app_root.serve_file("index.html").await? {
            Some(index) => Ok(index),
            None => Ok(response::text(StatusCode::NOT_FOUND, "Not Found")),
        }
    }
}

#[async_trait]
impl Handler for Application {
    async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        if self.mode == ServeMode::Development {
            log::info!("{} {}", method, path);
        }

        let mut response = match self.serve(req).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("{} {} failed: {}", method, path, e);
                response::text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        if self.mode == ServeMode::Development {
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        }
        response
    }
}
