//! Native HTTP server implementation
//!
//! hyper HTTP/1.1 on a multi-threaded tokio runtime:
//! - One accept loop, one task per connection
//! - Immutable route table shared through `Arc`
//! - TCP_NODELAY for low latency
//! - Connection tracking for graceful shutdown

use crate::handlers::{self, Handler};
use crate::request::from_hyper_request;
use crate::response::to_hyper_response;
use crate::{Error, Request, Response, Result, Router};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Port the server listens on
pub const DEFAULT_PORT: u16 = 8080;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: String,
    pub workers: usize,
    /// Listen backlog
    pub backlog: i32,
    /// How long shutdown waits for open connections to finish
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            hostname: "0.0.0.0".to_string(),
            workers: num_cpus::get(),
            backlog: 1024,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Resolve hostname and port into a socket address
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.hostname, self.port)
            .parse()
            .map_err(|e| Error::InvalidAddress(format!("{}:{}: {}", self.hostname, self.port, e)))
    }
}

/// Server state shared across all connections
pub struct ServerState {
    router: Router<Handler>,
}

impl ServerState {
    pub fn new(router: Router<Handler>) -> Self {
        Self { router }
    }

    /// State serving the `GET /hello` route
    pub fn hello() -> Result<Self> {
        Ok(Self::new(handlers::routes()?))
    }

    /// Match and handle a request
    pub fn handle(&self, req: &Request) -> Response {
        let handler = req
            .method
            .and_then(|method| self.router.find(method, &req.path))
            .copied()
            .unwrap_or(handlers::not_found);

        handler(req)
    }
}

/// Create a TCP socket with optimizations
///
/// SO_REUSEPORT is left off so a second server on the same port fails to bind.
pub fn create_optimized_socket(addr: &SocketAddr, backlog: i32) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR - allow binding to address in TIME_WAIT
    socket.set_reuse_address(true)?;

    // TCP_NODELAY - disable Nagle's algorithm for lower latency
    socket.set_nodelay(true)?;

    socket.bind(&(*addr).into())?;
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;

    Ok(socket)
}

/// Tracks active connections for graceful shutdown
///
/// Used to:
/// - Count active connections
/// - Signal shutdown to reject new connections
/// - Wait for existing connections to drain
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicU64,
    shutting_down: AtomicBool,
}

impl ConnectionTracker {
    /// Create a new connection tracker
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn decrement(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Get current active connection count
    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Signal that shutdown is in progress
    pub fn start_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Wait until no connections remain or `timeout` elapses.
    /// Returns true if all connections drained.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.count() == 0 {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Decrements the tracker when a connection task ends, even on panic.
struct ConnectionGuard(Arc<ConnectionTracker>);

impl ConnectionGuard {
    fn new(tracker: Arc<ConnectionTracker>) -> Self {
        tracker.increment();
        Self(tracker)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// A bound listener ready to serve
pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
    tracker: Arc<ConnectionTracker>,
    config: ServerConfig,
}

impl Server {
    /// Bind the listener. Must be called within a tokio runtime.
    pub fn bind(config: ServerConfig, state: ServerState) -> Result<Self> {
        let addr = config.addr()?;

        let socket = create_optimized_socket(&addr, config.backlog)
            .map_err(|source| Error::Bind { addr, source })?;
        let listener = TcpListener::from_std(socket.into())?;

        Ok(Self {
            listener,
            state: Arc::new(state),
            tracker: Arc::new(ConnectionTracker::new()),
            config,
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn tracker(&self) -> Arc<ConnectionTracker> {
        self.tracker.clone()
    }

    /// Serve until `signal` resolves, then drain open connections
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            state,
            tracker,
            config,
        } = self;

        // Open connections watch this to finish their in-flight request and close.
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::pin!(signal);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    if tracker.is_shutting_down() {
                        drop(stream);
                        continue;
                    }

                    let guard = ConnectionGuard::new(tracker.clone());
                    let state = state.clone();
                    let mut shutdown_rx = shutdown_rx.clone();

                    tokio::spawn(async move {
                        let _guard = guard;
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let state = state.clone();
                            async move { Ok::<_, Infallible>(handle_request(&state, req)) }
                        });

                        let conn = http1::Builder::new().serve_connection(io, service);
                        tokio::pin!(conn);

                        let result = tokio::select! {
                            res = conn.as_mut() => res,
                            _ = shutdown_rx.changed() => {
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };

                        if let Err(e) = result {
                            if !e.is_incomplete_message() {
                                tracing::warn!(%peer, error = %e, "connection error");
                            }
                        }
                    });
                }
                _ = &mut signal => {
                    tracing::info!("shutdown signal received");
                    tracker.start_shutdown();
                    let _ = shutdown_tx.send(true);
                    break;
                }
            }
        }

        drop(listener);

        if !tracker.drain(config.shutdown_timeout).await {
            tracing::warn!(
                active = tracker.count(),
                "connections still open after shutdown timeout"
            );
        }

        Ok(())
    }
}

fn handle_request(state: &ServerState, req: hyper::Request<Incoming>) -> hyper::Response<Full<Bytes>> {
    let request = from_hyper_request(&req);
    let response = state.handle(&request);

    tracing::debug!(
        method = request.method_str(),
        path = %request.path,
        query = ?request.query,
        status = response.status.as_u16(),
        "request"
    );

    to_hyper_response(response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to build response");
        internal_error_response()
    })
}

fn internal_error_response() -> hyper::Response<Full<Bytes>> {
    let fallback = Response::internal_error("Internal Server Error");
    to_hyper_response(fallback).unwrap_or_else(|_| {
        let mut res = hyper::Response::default();
        *res.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
        res
    })
}
