// Test application builder

use crate::TestClient;
use fastack_core::{
    App, AppBuilder, Controller, Error, HttpMethod, HttpRequest, HttpResponse, Middleware,
    WebSocketConnection,
};
use std::future::Future;
use std::sync::Arc;

/// Test application for integration testing
pub struct TestApp {
    pub app: App,
}

impl TestApp {
    /// Wrap a composed application
    pub fn new(app: App) -> Self {
        Self { app }
    }

    /// Create a test client for making requests
    pub fn client(&self) -> TestClient {
        TestClient::new(self.app.clone())
    }
}

/// Builder for test applications. Thin sugar over [`AppBuilder`] with
/// GET as the default verb for ad-hoc routes.
pub struct TestAppBuilder {
    builder: AppBuilder,
}

impl TestAppBuilder {
    /// Create a new test app builder
    pub fn new() -> Self {
        Self {
            builder: App::builder(),
        }
    }

    /// Register a GET route
    pub fn with_route<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.with_method_route(HttpMethod::GET, path, handler)
    }

    /// Register a route with an explicit verb
    pub fn with_method_route<F, Fut>(self, method: HttpMethod, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        Self {
            builder: self.builder.route(method, path, handler),
        }
    }

    /// Register a WebSocket route
    pub fn with_websocket<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Arc<WebSocketConnection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        Self {
            builder: self.builder.websocket(path, handler),
        }
    }

    /// Build a controller into the application
    pub fn with_controller<C: Controller>(self, controller: C) -> Result<Self, Error> {
        Ok(Self {
            builder: self.builder.include_controller(controller)?,
        })
    }

    /// Insert a typed entry into the application state
    pub fn with_state<T: Send + Sync + 'static>(self, value: T) -> Self {
        Self {
            builder: self.builder.state(value),
        }
    }

    /// Append a middleware to the application chain
    pub fn with_middleware<M: Middleware + 'static>(self, middleware: M) -> Self {
        Self {
            builder: self.builder.add_middleware(middleware),
        }
    }

    /// Compose directly on the underlying builder for anything the
    /// shortcuts above do not cover
    pub fn configure(self, f: impl FnOnce(AppBuilder) -> AppBuilder) -> Self {
        Self {
            builder: f(self.builder),
        }
    }

    /// Build the test application
    pub fn build(self) -> TestApp {
        TestApp::new(self.builder.build())
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
