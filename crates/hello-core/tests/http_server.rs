use hello_core::{Error, Server, ServerConfig, ServerState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const HELLO_BODY: &str = r#"{"message":"Hello, world!"}"#;

struct RunningServer {
    addr: SocketAddr,
    tracker: Arc<hello_core::ConnectionTracker>,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<hello_core::Result<()>>,
}

fn test_config(port: u16) -> ServerConfig {
    ServerConfig {
        hostname: "127.0.0.1".to_string(),
        port,
        shutdown_timeout: Duration::from_secs(2),
        ..ServerConfig::default()
    }
}

fn start_server() -> RunningServer {
    let server = Server::bind(test_config(0), ServerState::hello().unwrap()).unwrap();
    let addr = server.local_addr().unwrap();
    let tracker = server.tracker();
    let (shutdown, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = rx.await;
    }));

    RunningServer {
        addr,
        tracker,
        shutdown,
        handle,
    }
}

struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn send(addr: SocketAddr, method: &str, path: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .expect("response timed out")
        .unwrap();

    let text = String::from_utf8(raw).unwrap();
    let (head, body) = text.split_once("\r\n\r\n").expect("malformed response");
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("missing status code");
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    RawResponse {
        status,
        headers,
        body: body.to_string(),
    }
}

async fn wait_for_idle(tracker: &hello_core::ConnectionTracker) -> bool {
    tracker.drain(Duration::from_secs(2)).await
}

#[tokio::test]
async fn hello_returns_json() {
    let server = start_server();

    let res = send(server.addr, "GET", "/hello").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.body, HELLO_BODY);

    let _ = server.shutdown.send(());
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn other_requests_are_not_found() {
    let server = start_server();

    for (method, path) in [("GET", "/other"), ("GET", "/"), ("POST", "/hello"), ("GET", "/hello/")] {
        let res = send(server.addr, method, path).await;
        assert_eq!(res.status, 404, "{method} {path}");
        assert_ne!(res.body, HELLO_BODY);
        assert_eq!(res.body, r#"{"error":"Not found"}"#);
    }

    let _ = server.shutdown.send(());
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn query_string_still_matches() {
    let server = start_server();

    let res = send(server.addr, "GET", "/hello?name=x").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, HELLO_BODY);

    let _ = server.shutdown.send(());
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn sequential_requests_release_connections() {
    let server = start_server();

    for _ in 0..100 {
        let res = send(server.addr, "GET", "/hello").await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body, HELLO_BODY);
    }

    assert!(wait_for_idle(&server.tracker).await);
    assert_eq!(server.tracker.count(), 0);

    let _ = server.shutdown.send(());
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn second_bind_on_same_port_fails() {
    let server = start_server();

    let err = match Server::bind(test_config(server.addr.port()), ServerState::hello().unwrap()) {
        Ok(_) => panic!("second bind on {} succeeded", server.addr),
        Err(e) => e,
    };
    assert!(err.is_bind());
    assert!(matches!(err, Error::Bind { addr, .. } if addr == server.addr));

    // First server is unaffected.
    let res = send(server.addr, "GET", "/hello").await;
    assert_eq!(res.status, 200);

    let _ = server.shutdown.send(());
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let server = start_server();
    let addr = server.addr;

    let _ = server.shutdown.send(());
    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    assert!(server.tracker.is_shutting_down());
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() {
    let server = start_server();

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    // Read the full response while leaving the connection open.
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    while !raw.ends_with(HELLO_BODY.as_bytes()) {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .expect("response timed out")
            .unwrap();
        assert!(n > 0, "connection closed before the response was complete");
        raw.extend_from_slice(&buf[..n]);
    }
    assert_eq!(server.tracker.count(), 1);

    let started = std::time::Instant::now();
    let _ = server.shutdown.send(());
    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    // shutdown_timeout is 2s; an idle connection must not hold shutdown that long.
    assert!(started.elapsed() < Duration::from_secs(1), "shutdown took {:?}", started.elapsed());
    assert_eq!(server.tracker.count(), 0);

    let n = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf))
        .await
        .expect("connection left open")
        .unwrap_or(0);
    assert_eq!(n, 0);
}
