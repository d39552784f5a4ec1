//! Request handlers
//!
//! Handlers are plain functions: they hold no state and never fail.

pub mod hello;

use crate::{Request, Response, Result, Router};

pub use hello::{hello, HelloResponse, HELLO_MESSAGE, HELLO_PATH};

/// Handler signature shared by every route
pub type Handler = fn(&Request) -> Response;

/// Fallback for requests no route claims
pub fn not_found(_req: &Request) -> Response {
    Response::not_found()
}

/// Route table served by the listener: `GET /hello` and nothing else
pub fn routes() -> Result<Router<Handler>> {
    let mut router: Router<Handler> = Router::new();
    router.get(HELLO_PATH, hello)?;
    Ok(router)
}
