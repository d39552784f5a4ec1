//! Exact-match route table
//!
//! Routes are organized by HTTP method, then looked up by literal path.
//! There are no parameters or wildcards: `/hello` matches `/hello` only.

use crate::{Error, Method, Result};
use std::collections::HashMap;

/// Per-method route table
#[derive(Debug)]
pub struct Router<T> {
    routes: HashMap<Method, HashMap<String, T>>,
}

impl<T> Router<T> {
    /// Create a new router
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Add a route
    pub fn route(&mut self, method: Method, path: &str, value: T) -> Result<()> {
        let table = self.routes.entry(method).or_default();
        if table.contains_key(path) {
            return Err(Error::DuplicateRoute {
                method: method.to_string(),
                path: path.to_string(),
            });
        }
        table.insert(path.to_string(), value);
        Ok(())
    }

    /// Add a GET route
    pub fn get(&mut self, path: &str, value: T) -> Result<()> {
        self.route(Method::Get, path, value)
    }

    /// Look up the value for an exact method and path
    pub fn find(&self, method: Method, path: &str) -> Option<&T> {
        self.routes.get(&method).and_then(|table| table.get(path))
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}
