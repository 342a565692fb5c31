//! The tunnel collaborator.
//!
//! Echo does not implement the tunneling protocol. It only decides which
//! requests belong to the tunnel and hands them over untouched through the
//! [`Tunnel`] trait. [`BareRelay`] is the stock implementation: it relays the
//! tunnel namespace byte-for-byte to a separately running bare server.

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::{HeaderName, HeaderValue, HOST};
use hyper::{Body, Client, Request, Response, StatusCode, Uri};
use url::Url;

use crate::error::{NetworkError, NetworkResult};
use crate::request::InboundConnection;
use crate::response;

/// Headers that describe a single hop and must not be relayed
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

/// Contract of the external tunneling component
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Does this request belong to the tunnel namespace? Must not do I/O.
    fn should_route(&self, conn: &InboundConnection) -> bool;

    /// Serve an ordinary tunnel request
    async fn route_request(&self, req: Request<Body>) -> Response<Body>;

    /// Serve a protocol upgrade. The request still carries hyper's upgrade
    /// handle, which yields the raw connection including any bytes already
    /// read past the head.
    async fn route_upgrade(&self, req: Request<Body>) -> Response<Body>;
}

/// Relay for a bare server listening elsewhere
pub struct BareRelay {
    prefix: String,
    upstream: Option<Url>,
    client: Client<HttpConnector>,
}

impl BareRelay {
    /// Relay requests under `prefix` to `upstream`. With no upstream every
    /// tunnel request is answered with 502.
    pub fn new(prefix: impl Into<String>, upstream: Option<Url>) -> NetworkResult<Self> {
        if let Some(url) = &upstream {
            if url.scheme() != "http" {
                return Err(NetworkError::ConfigError(format!(
                    "Bare upstream must be plain http, got {}",
                    url
                )));
            }
            if url.host_str().is_none() {
                return Err(NetworkError::ConfigError(format!(
                    "Bare upstream has no host: {}",
                    url
                )));
            }
        }

        Ok(Self {
            prefix: prefix.into(),
            upstream,
            client: Client::new(),
        })
    }

    /// Rewrite `uri` to point at the upstream, keeping path and query
    fn upstream_uri(&self, uri: &Uri) -> NetworkResult<(Uri, String)> {
        let upstream = self.upstream.as_ref().ok_or_else(|| {
            NetworkError::UpstreamError("no bare upstream configured".to_string())
        })?;
        let host = upstream.host_str().unwrap_or("localhost");
        let authority = match upstream.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let target: Uri = format!("http://{}{}", authority, path)
            .parse()
            .map_err(|e| NetworkError::UpstreamError(format!("invalid upstream uri: {}", e)))?;
        Ok((target, authority))
    }

    async fn forward(&self, req: Request<Body>) -> NetworkResult<Response<Body>> {
        let (mut parts, body) = req.into_parts();
        let (uri, authority) = self.upstream_uri(&parts.uri)?;
        log::debug!("Relaying {} {} to {}", parts.method, parts.uri, uri);

        strip_hop_by_hop(&mut parts.headers);
        parts.headers.insert(HOST, host_header(&authority)?);
        parts.uri = uri;

        let mut upstream_response = self.client.request(Request::from_parts(parts, body)).await?;
        strip_hop_by_hop(upstream_response.headers_mut());
        Ok(upstream_response)
    }

    async fn forward_upgrade(&self, mut req: Request<Body>) -> NetworkResult<Response<Body>> {
        let client_side = hyper::upgrade::on(&mut req);
        let (mut parts, _body) = req.into_parts();
        let (uri, authority) = self.upstream_uri(&parts.uri)?;
        log::debug!("Relaying upgrade {} to {}", parts.uri, uri);

        parts.headers.insert(HOST, host_header(&authority)?);
        parts.uri = uri;

        let mut upstream_response = self
            .client
            .request(Request::from_parts(parts, Body::empty()))
            .await?;

        if upstream_response.status() != StatusCode::SWITCHING_PROTOCOLS {
            log::debug!(
                "Upstream declined upgrade with {}",
                upstream_response.status()
            );
            return Ok(upstream_response);
        }

        let upstream_side = hyper::upgrade::on(&mut upstream_response);
        tokio::spawn(async move {
            match futures::future::try_join(client_side, upstream_side).await {
                Ok((mut client_io, mut upstream_io)) => {
                    match tokio::io::copy_bidirectional(&mut client_io, &mut upstream_io).await {
                        Ok((up, down)) => {
                            log::debug!("Tunnel upgrade closed ({} bytes up, {} down)", up, down)
                        }
                        Err(e) => log::debug!("Tunnel upgrade ended with error: {}", e),
                    }
                }
                Err(e) => log::warn!("Tunnel upgrade failed: {}", e),
            }
        });

        let mut switching = response::empty(StatusCode::SWITCHING_PROTOCOLS);
        for (name, value) in upstream_response.headers() {
            switching.headers_mut().append(name.clone(), value.clone());
        }
        Ok(switching)
    }
}

#[async_trait]
impl Tunnel for BareRelay {
    fn should_route(&self, conn: &InboundConnection) -> bool {
        conn.path().starts_with(&self.prefix)
    }

    async fn route_request(&self, req: Request<Body>) -> Response<Body> {
        match self.forward(req).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Tunnel relay failed: {}", e);
                response::text(StatusCode::BAD_GATEWAY, "Tunnel upstream unavailable")
            }
        }
    }

    async fn route_upgrade(&self, req: Request<Body>) -> Response<Body> {
        match self.forward_upgrade(req).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Tunnel upgrade relay failed: {}", e);
                response::text(StatusCode::BAD_GATEWAY, "Tunnel upstream unavailable")
            }
        }
    }
}

fn strip_hop_by_hop(headers: &mut hyper::HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(HeaderName::from_static(name));
    }
}

fn host_header(authority: &str) -> NetworkResult<HeaderValue> {
    HeaderValue::from_str(authority)
        .map_err(|e| NetworkError::UpstreamError(format!("invalid host header: {}", e)))
}
