// Test HTTP client

use fastack_core::{
    App, Error, HttpMethod, HttpRequest, HttpResponse, WebSocketConnection, WebSocketPeer,
};
use std::collections::HashMap;
use tokio::task::JoinHandle;

/// Test client that drives requests through the full application
/// pipeline: middleware, routing, and exception handling. No socket is
/// involved.
pub struct TestClient {
    app: App,
}

impl TestClient {
    /// Create a new test client
    pub fn new(app: App) -> Self {
        Self { app }
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(HttpMethod::GET, path, None).await
    }

    /// Make a POST request
    pub async fn post(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.request(HttpMethod::POST, path, Some(body)).await
    }

    /// Make a PUT request
    pub async fn put(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.request(HttpMethod::PUT, path, Some(body)).await
    }

    /// Make a PATCH request
    pub async fn patch(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.request(HttpMethod::PATCH, path, Some(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(HttpMethod::DELETE, path, None).await
    }

    /// Make a request with custom method
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> TestResponse {
        let mut request = HttpRequest::new(method.as_str().to_string(), path.to_string());
        request.body = body.unwrap_or_default();
        self.send(request).await
    }

    /// Dispatch a fully built request through the application
    pub async fn send(&self, request: HttpRequest) -> TestResponse {
        match self.app.dispatch(request).await {
            Ok(response) => TestResponse::Success(response),
            Err(error) => TestResponse::Fault(error),
        }
    }

    /// Open a simulated WebSocket against the application.
    ///
    /// The matched route handler runs on its own task; the returned
    /// peer exchanges frames with it. Await the handle to observe the
    /// handler's outcome.
    pub fn websocket(&self, path: &str) -> (WebSocketPeer, JoinHandle<Result<(), Error>>) {
        let (connection, peer) = WebSocketConnection::pair(path);
        let app = self.app.clone();
        let handle = tokio::spawn(async move { app.dispatch_websocket(connection).await });
        (peer, handle)
    }
}

/// Builder for test requests
pub struct TestRequestBuilder {
    method: HttpMethod,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    query_params: HashMap<String, String>,
}

impl TestRequestBuilder {
    /// Create a new request builder
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            query_params: HashMap::new(),
        }
    }

    /// Add a header
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Add a bearer token in the Authorization header
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", &format!("Bearer {token}"))
    }

    /// Set the body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Set JSON body
    pub fn json<T: serde::Serialize>(mut self, data: &T) -> Result<Self, Error> {
        self.body = serde_json::to_vec(data).map_err(|e| Error::Serialization(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    /// Add a query parameter
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query_params.insert(key.to_string(), value.to_string());
        self
    }

    /// Build the request
    pub fn build(self) -> HttpRequest {
        let query_string = if !self.query_params.is_empty() {
            let params: Vec<String> = self
                .query_params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            format!("?{}", params.join("&"))
        } else {
            String::new()
        };

        HttpRequest::from_parts(
            self.method.as_str().to_string(),
            format!("{}{}", self.path, query_string),
            self.headers,
            self.body,
            HashMap::new(),
            self.query_params,
        )
    }

    /// Build the request and dispatch it through the client
    pub async fn send(self, client: &TestClient) -> TestResponse {
        client.send(self.build()).await
    }
}

/// Response from a test request
#[derive(Debug)]
pub enum TestResponse {
    Success(HttpResponse),
    /// The request ended in a fault no exception handler resolved
    Fault(Error),
}

impl TestResponse {
    /// Assert the response is successful
    pub fn assert_success(&self) -> &HttpResponse {
        match self {
            TestResponse::Success(response) => response,
            TestResponse::Fault(error) => {
                panic!("Expected success response, got fault: {error}")
            }
        }
    }

    /// Assert the request ended in an unresolved fault
    pub fn assert_fault(&self) -> &Error {
        match self {
            TestResponse::Fault(error) => error,
            TestResponse::Success(response) => {
                panic!("Expected fault, got status {}", response.status)
            }
        }
    }

    /// Get the status code
    pub fn status(&self) -> Option<u16> {
        match self {
            TestResponse::Success(response) => Some(response.status),
            TestResponse::Fault(_) => None,
        }
    }

    /// Get the response body as string
    pub fn body_string(&self) -> Option<String> {
        match self {
            TestResponse::Success(response) => String::from_utf8(response.body.clone()).ok(),
            TestResponse::Fault(_) => None,
        }
    }

    /// Get the response body as JSON
    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, String> {
        match self {
            TestResponse::Success(response) => serde_json::from_slice(&response.body)
                .map_err(|e| format!("Deserialization error: {}", e)),
            TestResponse::Fault(error) => Err(format!("{error:?}")),
        }
    }

    /// The "detail" field of the standard error envelope, if present
    pub fn detail(&self) -> Option<String> {
        let value: serde_json::Value = self.body_json().ok()?;
        value.get("detail")?.as_str().map(|s| s.to_string())
    }

    /// Get a header value
    pub fn header(&self, key: &str) -> Option<&String> {
        match self {
            TestResponse::Success(response) => response.headers.get(key),
            TestResponse::Fault(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastack_core::WebSocketMessage;

    fn sample_app() -> App {
        App::builder()
            .route(HttpMethod::GET, "/hello", |_req| async move {
                Ok(HttpResponse::ok().with_body(b"Hello!".to_vec()))
            })
            .route(HttpMethod::GET, "/whoami", |req| async move {
                let name = req.query("name").cloned().unwrap_or_default();
                let auth = req.header("authorization").cloned().unwrap_or_default();
                HttpResponse::ok().with_json(&serde_json::json!({
                    "name": name,
                    "auth": auth,
                }))
            })
            .websocket("/echo", |socket| async move {
                socket.accept().await?;
                if let WebSocketMessage::Text(text) = socket.receive().await? {
                    socket.send_text(text).await?;
                }
                Ok(())
            })
            .build()
    }

    #[test]
    fn test_request_builder() {
        let req = TestRequestBuilder::new(HttpMethod::GET, "/test")
            .bearer("token")
            .query("foo", "bar")
            .build();

        assert_eq!(req.method, "GET");
        assert!(req.path.contains("/test"));
        assert_eq!(
            req.headers.get("Authorization"),
            Some(&"Bearer token".to_string())
        );
        assert_eq!(req.query_params.get("foo"), Some(&"bar".to_string()));
    }

    #[tokio::test]
    async fn test_client_get() {
        let client = TestClient::new(sample_app());
        let response = client.get("/hello").await;
        assert_eq!(response.status(), Some(200));
        assert_eq!(response.body_string(), Some("Hello!".to_string()));
    }

    #[tokio::test]
    async fn test_client_unknown_route_is_fault() {
        let client = TestClient::new(sample_app());
        let response = client.get("/missing").await;
        let error = response.assert_fault();
        assert!(matches!(error, Error::RouteNotFound(_)));
        assert_eq!(response.status(), None);
    }

    #[tokio::test]
    async fn test_builder_send_carries_headers_and_query() {
        let client = TestClient::new(sample_app());
        let response = TestRequestBuilder::new(HttpMethod::GET, "/whoami")
            .bearer("secret")
            .query("name", "alice")
            .send(&client)
            .await;

        let body: serde_json::Value = response.body_json().unwrap();
        assert_eq!(body["name"], "alice");
        assert_eq!(body["auth"], "Bearer secret");
    }

    #[tokio::test]
    async fn test_websocket_echo() {
        let client = TestClient::new(sample_app());
        let (peer, handle) = client.websocket("/echo");

        peer.send_text("ping").unwrap();
        match peer.receive().await {
            Some(WebSocketMessage::Text(text)) => assert_eq!(text, "ping"),
            other => panic!("expected echoed text, got {other:?}"),
        }

        handle.await.unwrap().unwrap();
    }
}
