//! `GET /hello` handler

use crate::{Request, Response};
use serde::Serialize;

/// Path served by [`hello`]
pub const HELLO_PATH: &str = "/hello";

/// Greeting carried in the payload
pub const HELLO_MESSAGE: &str = "Hello, world!";

/// JSON payload: `{"message":"Hello, world!"}`
#[derive(Debug, Clone, Serialize)]
pub struct HelloResponse {
    pub message: &'static str,
}

impl Default for HelloResponse {
    fn default() -> Self {
        Self {
            message: HELLO_MESSAGE,
        }
    }
}

/// Answer with the fixed greeting
pub fn hello(_req: &Request) -> Response {
    match serde_json::to_vec(&HelloResponse::default()) {
        Ok(json) => Response::json(json),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize hello payload");
            Response::internal_error("Internal Server Error")
        }
    }
}
