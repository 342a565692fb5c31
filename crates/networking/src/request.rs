use hyper::header::{HeaderMap, CONNECTION, UPGRADE};
use hyper::{Body, Method, Request};

/// Head of an inbound request, captured before anything reads the body.
///
/// Built once per request and dropped after dispatch.
#[derive(Debug, Clone)]
pub struct InboundConnection {
    /// HTTP method
    method: Method,

    /// Request path, without query
    path: String,

    /// Request headers
    headers: HeaderMap,

    /// Whether the client asked for a protocol upgrade
    upgrade: bool,
}

impl InboundConnection {
    /// Capture the head of `req` without touching its body
    pub fn from_request(req: &Request<Body>) -> Self {
        Self::from_parts(req.method().clone(), req.uri().path(), req.headers().clone())
    }

    pub fn from_parts(method: Method, path: &str, headers: HeaderMap) -> Self {
        let upgrade = is_upgrade_request(&headers);
        Self {
            method,
            path: path.to_string(),
            headers,
            upgrade,
        }
    }

    /// Get the request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get whether this is an upgrade request
    pub fn is_upgrade(&self) -> bool {
        self.upgrade
    }
}

/// An upgrade needs both an `Upgrade` header and an `upgrade` token in
/// `Connection`
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let has_upgrade_token = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    has_upgrade_token && headers.contains_key(UPGRADE)
}
