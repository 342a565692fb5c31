//! Connection classifier.
//!
//! Every inbound request (plain or upgrade) is classified exactly once, before
//! any body is read, into one of two routes. Tunnel traffic is handed to the
//! [`Tunnel`] verbatim; everything else goes to the application handler.
//! Upgrades that the tunnel does not claim are refused by closing the
//! connection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hyper::{Body, Request, Response};
use serde::Serialize;

use crate::error::{NetworkError, NetworkResult};
use crate::request::InboundConnection;
use crate::tunnel::Tunnel;

/// Where a request goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Tunnel,
    Application,
}

/// The non-tunnel request handler
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, req: Request<Body>) -> Response<Body>;
}

/// Dispatch counters for diagnostics
#[derive(Debug, Default)]
pub struct RouterMetrics {
    /// Requests handed to the tunnel
    tunnel: AtomicUsize,
    /// Upgrades handed to the tunnel
    tunnel_upgrades: AtomicUsize,
    /// Requests handed to the application
    application: AtomicUsize,
    /// Upgrades refused outside the tunnel namespace
    rejected_upgrades: AtomicUsize,
}

/// Point-in-time copy of [`RouterMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterSnapshot {
    pub tunnel: usize,
    pub tunnel_upgrades: usize,
    pub application: usize,
    pub rejected_upgrades: usize,
}

impl RouterMetrics {
    pub fn increment_tunnel(&self) {
        self.tunnel.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tunnel_upgrades(&self) {
        self.tunnel_upgrades.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_application(&self) {
        self.application.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected_upgrades(&self) {
        self.rejected_upgrades.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RouterSnapshot {
        RouterSnapshot {
            tunnel: self.tunnel.load(Ordering::Relaxed),
            tunnel_upgrades: self.tunnel_upgrades.load(Ordering::Relaxed),
            application: self.application.load(Ordering::Relaxed),
            rejected_upgrades: self.rejected_upgrades.load(Ordering::Relaxed),
        }
    }
}

/// Splits traffic between the tunnel and the application
pub struct Router {
    tunnel: Arc<dyn Tunnel>,
    application: Arc<dyn Handler>,
    metrics: RouterMetrics,
}

impl Router {
    pub fn new(tunnel: Arc<dyn Tunnel>, application: Arc<dyn Handler>) -> Self {
        Self {
            tunnel,
            application,
            metrics: RouterMetrics::default(),
        }
    }

    /// Decide the route for `conn`. Consults the tunnel predicate once.
    pub fn classify(&self, conn: &InboundConnection) -> Route {
        if self.tunnel.should_route(conn) {
            Route::Tunnel
        } else {
            Route::Application
        }
    }

    /// Classify `req` and hand it to its destination.
    ///
    /// An upgrade outside the tunnel namespace yields
    /// [`NetworkError::UpgradeRejected`]; the server closes that connection
    /// without writing a response.
    pub async fn dispatch(&self, req: Request<Body>) -> NetworkResult<Response<Body>> {
        let conn = InboundConnection::from_request(&req);
        let route = self.classify(&conn);
        log::debug!(
            "{} {} -> {:?}{}",
            conn.method(),
            conn.path(),
            route,
            if conn.is_upgrade() { " (upgrade)" } else { "" }
        );

        match (route, conn.is_upgrade()) {
            (Route::Tunnel, true) => {
                self.metrics.increment_tunnel_upgrades();
                Ok(self.tunnel.route_upgrade(req).await)
            }
            (Route::Tunnel, false) => {
                self.metrics.increment_tunnel();
                Ok(self.tunnel.route_request(req).await)
            }
            (Route::Application, true) => {
                self.metrics.increment_rejected_upgrades();
                log::warn!("Refusing upgrade outside the tunnel: {}", conn.path());
                Err(NetworkError::UpgradeRejected {
                    path: conn.path().to_string(),
                })
            }
            (Route::Application, false) => {
                self.metrics.increment_application();
                Ok(self.application.handle(req).await)
            }
        }
    }

    pub fn metrics(&self) -> RouterSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response;
    use hyper::StatusCode;
    use pretty_assertions::assert_eq;

    /// Tunnel that claims `/bare/` and counts predicate calls
    #[derive(Default)]
    struct CountingTunnel {
        checks: AtomicUsize,
    }

    #[async_trait]
    impl Tunnel for CountingTunnel {
        fn should_route(&self, conn: &InboundConnection) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst);
            conn.path().starts_with("/bare/")
        }

        async fn route_request(&self, _req: Request<Body>) -> Response<Body> {
            response::text(StatusCode::OK, "tunnel")
        }

        async fn route_upgrade(&self, _req: Request<Body>) -> Response<Body> {
            response::empty(StatusCode::SWITCHING_PROTOCOLS)
        }
    }

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, _req: Request<Body>) -> Response<Body> {
            response::text(StatusCode::OK, "app")
        }
    }

    fn router() -> (Router, Arc<CountingTunnel>) {
        let tunnel = Arc::new(CountingTunnel::default());
        (Router::new(tunnel.clone(), Arc::new(Echo)), tunnel)
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    fn upgrade(path: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header("connection", "Upgrade")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_plain_requests_split_by_prefix() {
        let (router, _) = router();

        let tunnel = router.dispatch(get("/bare/v3/")).await.unwrap();
        assert_eq!(body_text(tunnel).await, "tunnel");

        let app = router.dispatch(get("/index.html")).await.unwrap();
        assert_eq!(body_text(app).await, "app");

        assert_eq!(
            router.metrics(),
            RouterSnapshot {
                tunnel: 1,
                application: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_predicate_consulted_once_per_request() {
        let (router, tunnel) = router();

        router.dispatch(get("/")).await.unwrap();
        router.dispatch(get("/bare/")).await.unwrap();
        router.dispatch(upgrade("/bare/")).await.unwrap();
        let _ = router.dispatch(upgrade("/socket")).await;

        assert_eq!(tunnel.checks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_tunnel_upgrade_goes_to_tunnel() {
        let (router, _) = router();
        let response = router.dispatch(upgrade("/bare/v3/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(router.metrics().tunnel_upgrades, 1);
    }

    #[tokio::test]
    async fn test_non_tunnel_upgrade_rejected() {
        let (router, _) = router();

        let result = router.dispatch(upgrade("/ws")).await;

        assert!(matches!(
            result,
            Err(NetworkError::UpgradeRejected { ref path }) if path == "/ws"
        ));
        assert_eq!(router.metrics().rejected_upgrades, 1);
        assert_eq!(router.metrics().application, 0);
    }

    #[test]
    fn test_classify_is_total() {
        let (router, _) = router();
        for path in ["/", "/bare", "/bare/", "/bare/x", "/uv/uv.sw.js", "/api/session"] {
            let conn = InboundConnection::from_parts(hyper::Method::GET, path, Default::default());
            let route = router.classify(&conn);
            assert!(route == Route::Tunnel || route == Route::Application);
            assert_eq!(route == Route::Tunnel, path.starts_with("/bare/"));
        }
    }
}
