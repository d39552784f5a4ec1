//! hello-core: single-route JSON HTTP server
//!
//! Answers `GET /hello` with `{"message":"Hello, world!"}` and every other
//! request with 404.
//!
//! ## Modules
//! - `router` - exact method + path route table
//! - `handlers` - the hello handler and the 404 fallback
//! - `server` - hyper/tokio listener with graceful shutdown

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod handlers;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

// Re-exports
pub use error::{Error, Result};
pub use request::{Method, Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, StatusCode};
pub use router::Router;

pub use handlers::{Handler, HelloResponse};
pub use server::{ConnectionTracker, Server, ServerConfig, ServerState, DEFAULT_PORT};
