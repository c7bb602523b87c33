// Routing system for HTTP and WebSocket requests

use crate::websocket::WebSocketConnection;
use crate::{Error, HttpMethod, HttpRequest, HttpResponse};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A route handler function type
pub type HandlerFn = Arc<
    dyn Fn(
            HttpRequest,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<HttpResponse, Error>> + Send>,
        > + Send
        + Sync,
>;

/// A WebSocket handler function type
pub type WebSocketHandlerFn = Arc<
    dyn Fn(
            Arc<WebSocketConnection>,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), Error>> + Send>>
        + Send
        + Sync,
>;

/// Route definition with handler and metadata
#[derive(Clone)]
pub struct Route {
    pub methods: Vec<HttpMethod>,
    pub path: String,
    /// Reverse-lookup name, unique per route by convention.
    pub name: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub handler: HandlerFn,
}

/// WebSocket route definition
#[derive(Clone)]
pub struct WebSocketRoute {
    pub path: String,
    pub handler: WebSocketHandlerFn,
}

/// Router for managing routes and dispatching requests
pub struct Router {
    pub routes: Vec<Route>,
    pub websocket_routes: Vec<WebSocketRoute>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            websocket_routes: Vec::new(),
        }
    }

    /// Add a route to the router
    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Add a WebSocket route to the router
    pub fn add_websocket_route(&mut self, route: WebSocketRoute) {
        self.websocket_routes.push(route);
    }

    /// Absorb all routes from another router, preserving order.
    pub fn merge(&mut self, other: Router) {
        self.routes.extend(other.routes);
        self.websocket_routes.extend(other.websocket_routes);
    }

    /// Find a route that matches the request and invoke its handler.
    ///
    /// A path that matches on no verb yields MethodNotAllowed; a path
    /// that matches nothing yields RouteNotFound.
    pub async fn route(&self, mut request: HttpRequest) -> Result<HttpResponse, Error> {
        // Parse query parameters from path
        let (path, query_string) = request
            .path
            .split_once('?')
            .map(|(p, q)| (p, Some(q)))
            .unwrap_or((&request.path, None));

        if let Some(query) = query_string {
            request.query_params = parse_query_string(query);
        }

        // Find matching route
        let mut path_matched = false;
        for route in &self.routes {
            if let Some(params) = match_path(&route.path, path) {
                path_matched = true;

                if !route.methods.iter().any(|m| m.as_str() == request.method) {
                    continue;
                }

                request.path_params = params;
                return (route.handler)(request).await;
            }
        }

        if path_matched {
            Err(Error::MethodNotAllowed(format!(
                "{} {}",
                request.method, path
            )))
        } else {
            Err(Error::RouteNotFound(format!("{} {}", request.method, path)))
        }
    }

    /// Find a WebSocket route matching the path.
    pub fn match_websocket(&self, path: &str) -> Option<(&WebSocketRoute, HashMap<String, String>)> {
        for route in &self.websocket_routes {
            if let Some(params) = match_path(&route.path, path) {
                return Some((route, params));
            }
        }
        None
    }

    /// Build a URL for a named route.
    ///
    /// Params matching path placeholders are substituted in; leftovers
    /// become the query string. When two routes share a name the
    /// later-registered one wins.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, Error> {
        let route = self
            .routes
            .iter()
            .rev()
            .find(|route| route.name == name)
            .ok_or_else(|| Error::RouteNotFound(name.to_string()))?;

        let mut url = String::new();
        let mut used: HashSet<&str> = HashSet::new();

        for segment in route.path.split('/') {
            if segment.is_empty() {
                continue;
            }
            url.push('/');
            if let Some(param_name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                let value = params
                    .iter()
                    .find(|(key, _)| *key == param_name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| {
                        Error::Internal(format!(
                            "url_for '{}': missing path parameter '{}'",
                            name, param_name
                        ))
                    })?;
                url.push_str(&urlencoding::encode(value));
                used.insert(param_name);
            } else {
                url.push_str(segment);
            }
        }

        if url.is_empty() {
            url.push('/');
        }

        let mut query = String::new();
        for (key, value) in params {
            if used.contains(*key) {
                continue;
            }
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(&urlencoding::encode(key));
            query.push('=');
            query.push_str(&urlencoding::encode(value));
        }
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        Ok(url)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Match a route path pattern against a request path
/// Returns Some(params) if matched, None otherwise
fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        if let Some(param_name) = pattern_part
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
        {
            // This is a placeholder
            params.insert(param_name.to_string(), decode_component(path_part));
        } else if pattern_part != path_part {
            // Static part doesn't match
            return None;
        }
    }

    Some(params)
}

/// Parse a query string into a map of parameters
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|part| {
            let mut split = part.splitn(2, '=');
            let key = split.next().filter(|k| !k.is_empty())?;
            let value = split.next().unwrap_or("");
            Some((decode_component(key), decode_component(value)))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
