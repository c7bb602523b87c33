// HTTP request and response types

use crate::state::State;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP request wrapper
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    /// Request-local state, seeded from the application state at dispatch.
    pub state: State,
}

impl HttpRequest {
    pub fn new(method: String, path: String) -> Self {
        Self {
            method,
            path,
            headers: HashMap::new(),
            body: Vec::new(),
            path_params: HashMap::new(),
            query_params: HashMap::new(),
            state: State::new(),
        }
    }

    pub fn from_parts(
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
        path_params: HashMap<String, String>,
        query_params: HashMap<String, String>,
    ) -> Self {
        Self {
            method,
            path,
            headers,
            body,
            path_params,
            query_params,
            state: State::new(),
        }
    }

    /// Parse the request body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, crate::Error> {
        serde_json::from_slice(&self.body).map_err(|e| crate::Error::Deserialization(e.to_string()))
    }

    /// Get a header value by name, case-insensitively
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(name).or_else(|| {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }

    /// Get a path parameter by name
    pub fn param(&self, name: &str) -> Option<&String> {
        self.path_params.get(name)
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }
}

/// HTTP response wrapper
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn created() -> Self {
        Self::new(201)
    }

    pub fn accepted() -> Self {
        Self::new(202)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn unauthorized() -> Self {
        Self::new(401)
    }

    pub fn forbidden() -> Self {
        Self::new(403)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn conflict() -> Self {
        Self::new(409)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    pub fn service_unavailable() -> Self {
        Self::new(503)
    }

    /// 200 response with a JSON body
    pub fn json<T: Serialize>(value: &T) -> Result<Self, crate::Error> {
        Self::ok().with_json(value)
    }

    /// 200 response with a plain text body
    pub fn text(text: impl Into<String>) -> Self {
        let mut response = Self::ok().with_body(text.into().into_bytes());
        response.headers.insert(
            "Content-Type".to_string(),
            "text/plain; charset=utf-8".to_string(),
        );
        response
    }

    /// Standard `{"detail", "data"}` envelope with a serialized payload.
    pub fn envelope<T: ApiModel + ?Sized>(
        detail: &str,
        data: &T,
        status: u16,
    ) -> Result<Self, crate::Error> {
        let body = serde_json::json!({ "detail": detail, "data": data.to_json()? });
        Self::new(status).with_json(&body)
    }

    /// Standard envelope with a null data payload.
    pub fn detail(detail: &str, status: u16) -> Result<Self, crate::Error> {
        let body = serde_json::json!({ "detail": detail, "data": null });
        Self::new(status).with_json(&body)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, crate::Error> {
        self.body =
            serde_json::to_vec(value).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn content_type(mut self, value: &str) -> Self {
        self.headers
            .insert("Content-Type".to_string(), value.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// JSON response helper
#[derive(Debug)]
pub struct Json<T: Serialize>(pub T);

impl<T: Serialize> Json<T> {
    pub fn into_response(self) -> Result<HttpResponse, crate::Error> {
        HttpResponse::ok().with_json(&self.0)
    }
}

/// Opt-in serialization hook for envelope payloads.
///
/// The default representation is plain serde; a type overrides
/// `to_json` when its wire form differs from its in-memory form
/// (redacted fields, computed properties, and the like).
pub trait ApiModel: Serialize {
    fn to_json(&self) -> Result<serde_json::Value, crate::Error> {
        serde_json::to_value(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}

impl ApiModel for serde_json::Value {}

impl<T: ApiModel> ApiModel for Vec<T> {
    fn to_json(&self) -> Result<serde_json::Value, crate::Error> {
        let items = self
            .iter()
            .map(|item| item.to_json())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(serde_json::Value::Array(items))
    }
}

impl<T: ApiModel> ApiModel for Option<T> {
    fn to_json(&self) -> Result<serde_json::Value, crate::Error> {
        match self {
            Some(value) => value.to_json(),
            None => Ok(serde_json::Value::Null),
        }
    }
}
