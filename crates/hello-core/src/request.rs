//! HTTP Request types

use crate::{Error, Result};
use hyper::body::Incoming;

/// HTTP Methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Connect,
    Trace,
}

impl Method {
    /// Parse from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "CONNECT" => Ok(Method::Connect),
            "TRACE" => Ok(Method::Trace),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP Request
///
/// Only method and target are kept: routing reads nothing else, so headers
/// and body stay in the hyper request.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method, `None` for extension methods we do not route
    pub method: Option<Method>,
    /// Request path (without query string)
    pub path: String,
    /// Query string (without leading ?)
    pub query: Option<String>,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            path: path.into(),
            query: None,
        }
    }

    /// Method token for logging, `"?"` when unrecognised
    pub fn method_str(&self) -> &'static str {
        self.method.map(|m| m.as_str()).unwrap_or("?")
    }
}

/// Builder for constructing requests
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Create a new builder
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request: Request::new(method, path),
        }
    }

    /// Set query string
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.request.query = Some(query.into());
        self
    }

    /// Build the request
    pub fn build(self) -> Request {
        self.request
    }
}

/// Convert hyper request to our Request type
pub fn from_hyper_request(req: &hyper::Request<Incoming>) -> Request {
    let uri = req.uri();

    Request {
        method: Method::from_str(req.method().as_str()).ok(),
        path: uri.path().to_string(),
        query: uri.query().map(|s| s.to_string()),
    }
}
