use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use echo_networking::{start, BareRelay, ServeMode, ServerConfig, ServerHandle, Tunnel};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, StatusCode};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Directories laid out like a deployed checkout
struct Site {
    _dir: TempDir,
    config: ServerConfig,
}

fn write(root: &Path, name: &str, contents: &str) {
    let path = root.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn site(mode: ServeMode) -> Site {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "public/robots.txt", "User-agent: *");
    write(root, "dist/index.html", "<div id=root></div>");
    write(root, "dist/assets/app.js", "boot()");
    write(root, "dev/index.html", "<script type=module src=/src/main.tsx></script>");
    write(root, "uv/uv.sw.js", "// sw");
    write(root, "uv/uv.handler.js", "// handler");
    write(root, "uv/uv.bundle.js", "// bundle");
    write(root, "uv/uv.config.js", "// config");

    let config = ServerConfig {
        bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        mode,
        dev_root: root.join("dev"),
        public_dir: root.join("public"),
        dist_dir: root.join("dist"),
        uv_dir: root.join("uv"),
        ..Default::default()
    };
    Site { _dir: dir, config }
}

async fn serve(config: ServerConfig, upstream: Option<url::Url>) -> ServerHandle {
    let relay: Arc<dyn Tunnel> = Arc::new(BareRelay::new(config.tunnel_prefix.clone(), upstream).unwrap());
    start(config, relay).await.unwrap()
}

fn url(handle: &ServerHandle, path: &str) -> String {
    format!("http://{}{}", handle.addr, path)
}

/// Minimal stand-in for a bare server: echoes the path and accepts
/// upgrades by echoing raw bytes back.
async fn fake_bare_upstream() -> SocketAddr {
    let make = make_service_fn(|_| async {
        Ok::<_, Infallible>(service_fn(|mut req: Request<Body>| async move {
            if req.headers().contains_key(hyper::header::UPGRADE) {
                let upgrade = hyper::upgrade::on(&mut req);
                tokio::spawn(async move {
                    if let Ok(mut io) = upgrade.await {
                        let mut buf = [0u8; 64];
                        while let Ok(n) = io.read(&mut buf).await {
                            if n == 0 || io.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                });
                let response = Response::builder()
                    .status(StatusCode::SWITCHING_PROTOCOLS)
                    .header("connection", "upgrade")
                    .header("upgrade", "websocket")
                    .body(Body::empty())
                    .unwrap();
                return Ok::<_, Infallible>(response);
            }
            if req.method() == hyper::Method::POST {
                let bare_url = req.headers().get("x-bare-url").cloned();
                let sent = hyper::body::to_bytes(req.into_body()).await.unwrap();
                let mut response = Response::new(Body::from(sent));
                if let Some(value) = bare_url {
                    response.headers_mut().insert("x-bare-url", value);
                }
                return Ok(response);
            }
            let seen = format!("bare saw {}", req.uri());
            Ok(Response::new(Body::from(seen)))
        }))
    });

    let server = hyper::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make);
    let addr = server.local_addr();
    tokio::spawn(server);
    addr
}

/// Send a raw request head and return everything up to the blank line
async fn raw_head(stream: &mut TcpStream, head: &str) -> String {
    stream.write_all(head.as_bytes()).await.unwrap();
    let mut received = Vec::new();
    let mut byte = [0u8; 1];
    while !received.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await.unwrap() {
            0 => break,
            _ => received.push(byte[0]),
        }
    }
    String::from_utf8(received).unwrap()
}

#[tokio::test]
async fn test_production_static_and_spa_fallback() {
    let site = site(ServeMode::Production);
    let handle = serve(site.config.clone(), None).await;
    let client = reqwest::Client::new();

    let asset = client.get(url(&handle, "/assets/app.js")).send().await.unwrap();
    assert_eq!(asset.status(), 200);
    assert!(asset.headers().get("cache-control").is_none());
    assert_eq!(asset.text().await.unwrap(), "boot()");

    let public = client.get(url(&handle, "/robots.txt")).send().await.unwrap();
    assert_eq!(public.text().await.unwrap(), "User-agent: *");

    let deep_link = client.get(url(&handle, "/games/slope")).send().await.unwrap();
    assert_eq!(deep_link.status(), 200);
    assert_eq!(deep_link.text().await.unwrap(), "<div id=root></div>");

    handle.shutdown();
}

#[tokio::test]
async fn test_development_serves_dev_root_uncached() {
    let site = site(ServeMode::Development);
    let handle = serve(site.config.clone(), None).await;

    let index = reqwest::get(url(&handle, "/")).await.unwrap();
    assert_eq!(index.headers()["cache-control"], "no-store");
    assert!(index.text().await.unwrap().contains("main.tsx"));

    handle.shutdown();
}

#[tokio::test]
async fn test_content_rewriting_bundle_routes() {
    let site = site(ServeMode::Production);
    let handle = serve(site.config.clone(), None).await;

    for (path, body) in [
        ("/uv.sw.js", "// sw"),
        ("/uv.handler.js", "// handler"),
        ("/uv.bundle.js", "// bundle"),
        ("/uv/uv.config.js", "// config"),
    ] {
        let response = reqwest::get(url(&handle, path)).await.unwrap();
        assert_eq!(response.status(), 200, "{}", path);
        assert_eq!(
            response.headers()["content-type"],
            "text/javascript; charset=utf-8"
        );
        assert_eq!(response.text().await.unwrap(), body);
    }

    handle.shutdown();
}

#[tokio::test]
async fn test_session_api_over_http() {
    let site = site(ServeMode::Production);
    let handle = serve(site.config.clone(), None).await;
    let client = reqwest::Client::new();

    let view: serde_json::Value = client
        .post(url(&handle, "/api/session/target"))
        .json(&serde_json::json!({"input": "youtube.com"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["current_target"], "https://youtube.com");
    assert_eq!(view["address_draft"], "https://youtube.com");
    assert_eq!(view["render_mode"], "browsing");

    let missing = client.get(url(&handle, "/api/missing")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    handle.shutdown();
}

#[tokio::test]
async fn test_tunnel_without_upstream_is_bad_gateway() {
    let site = site(ServeMode::Production);
    let handle = serve(site.config.clone(), None).await;

    let response = reqwest::get(url(&handle, "/bare/v3/")).await.unwrap();
    assert_eq!(response.status(), 502);
    assert_eq!(handle.metrics().tunnel, 1);
    assert_eq!(handle.metrics().application, 0);

    handle.shutdown();
}

#[tokio::test]
async fn test_tunnel_requests_reach_bare_server() {
    let upstream = fake_bare_upstream().await;
    let site = site(ServeMode::Production);
    let upstream_url = url::Url::parse(&format!("http://{}/", upstream)).unwrap();
    let handle = serve(site.config.clone(), Some(upstream_url)).await;

    let body = reqwest::get(url(&handle, "/bare/v3/?x=1"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "bare saw /bare/v3/?x=1");

    handle.shutdown();
}

#[tokio::test]
async fn test_tunnel_body_and_headers_arrive_unmodified() {
    let upstream = fake_bare_upstream().await;
    let site = site(ServeMode::Production);
    let upstream_url = url::Url::parse(&format!("http://{}/", upstream)).unwrap();
    let handle = serve(site.config.clone(), Some(upstream_url)).await;

    // Larger than the API body cap, so it must never pass through the application
    let payload: Vec<u8> = (0..140_000u32).map(|i| (i % 251) as u8).collect();
    let response = reqwest::Client::new()
        .post(url(&handle, "/bare/v3/"))
        .header("x-bare-url", "https://example.com/a?b=1")
        .body(payload.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-bare-url"], "https://example.com/a?b=1");
    let echoed = response.bytes().await.unwrap();
    assert_eq!(echoed.len(), payload.len());
    assert!(echoed[..] == payload[..]);
    assert_eq!(handle.metrics().tunnel, 1);
    assert_eq!(handle.metrics().application, 0);

    handle.shutdown();
}

#[tokio::test]
async fn test_tunnel_upgrade_is_relayed() {
    let upstream = fake_bare_upstream().await;
    let site = site(ServeMode::Production);
    let upstream_url = url::Url::parse(&format!("http://{}/", upstream)).unwrap();
    let handle = serve(site.config.clone(), Some(upstream_url)).await;

    let mut stream = TcpStream::connect(handle.addr).await.unwrap();
    let head = raw_head(
        &mut stream,
        "GET /bare/ws HTTP/1.1\r\nHost: echo\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n",
    )
    .await;
    assert!(head.starts_with("HTTP/1.1 101"), "{}", head);

    stream.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut echoed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&echoed, b"ping");

    handle.shutdown();
}

#[tokio::test]
async fn test_non_tunnel_upgrade_is_closed_without_response() {
    let site = site(ServeMode::Production);
    let handle = serve(site.config.clone(), None).await;

    let mut stream = TcpStream::connect(handle.addr).await.unwrap();
    stream
        .write_all(b"GET /socket HTTP/1.1\r\nHost: echo\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n")
        .await
        .unwrap();

    let mut received = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .unwrap();
    assert!(read.is_err() || received.is_empty());
    assert_eq!(handle.metrics().rejected_upgrades, 1);

    handle.shutdown();
}
