//! Application composition and serving.
//!
//! [`AppBuilder`] assembles controllers, ad-hoc routes, middleware,
//! exception handlers, and shared state into an immutable [`App`].
//! Dispatch binds the application scope plus exactly one of the
//! request or websocket scopes around every handler invocation.

use crate::context::{
    current_app, current_request, with_app_context, with_request_context, with_websocket_context,
};
use crate::controller::{Controller, build_controller};
use crate::conventions::HttpMethod;
use crate::exceptions::{ExceptionContext, ExceptionHandlers, FnExceptionHandler};
use crate::logging::{debug, error, info, warn};
use crate::middleware::{Middleware, MiddlewareChain, Next, PhaseMiddleware, StateMiddleware};
use crate::routing::{HandlerFn, Route, Router, WebSocketHandlerFn, WebSocketRoute};
use crate::websocket::{WebSocketConnection, drive_stream};
use crate::{Error, ErrorKind, HttpRequest, HttpResponse, State};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming as IncomingBody;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{
    Request as HandshakeRequest, Response as HandshakeResponse,
};

/// Application metadata and runtime switches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub title: String,
    pub description: String,
    pub version: String,
    /// When set, server error details are included in responses.
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Fastack".to_string(),
            description: "Fastack Framework".to_string(),
            version: "0.1.0".to_string(),
            debug: false,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// A reusable bundle of routes, middleware, and handlers that can be
/// applied to an [`AppBuilder`] during composition.
pub trait Plugin {
    fn setup(&self, app: AppBuilder) -> Result<AppBuilder, Error>;
}

/// Builder for [`App`].
pub struct AppBuilder {
    config: AppConfig,
    router: Router,
    chain: MiddlewareChain,
    handlers: ExceptionHandlers,
    state: State,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            router: Router::new(),
            chain: MiddlewareChain::new(),
            handlers: ExceptionHandlers::new(),
            state: State::new(),
        }
    }

    /// Replace the application config.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Insert a typed entry into the application state.
    pub fn state<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.state.insert(value);
        self
    }

    /// Build a controller and absorb its routes.
    pub fn include_controller<C: Controller>(mut self, controller: C) -> Result<Self, Error> {
        let routes = build_controller(Arc::new(controller))?;
        self.router.merge(routes);
        Ok(self)
    }

    /// Register an ad-hoc route outside any controller. The route is
    /// named after its path.
    pub fn route<F, Fut>(mut self, method: HttpMethod, path: &str, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |request| Box::pin(handler(request)));
        self.router.add_route(Route {
            methods: vec![method],
            path: path.to_string(),
            name: path.to_string(),
            summary: String::new(),
            tags: Vec::new(),
            handler,
        });
        self
    }

    /// Register a WebSocket route.
    pub fn websocket<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Arc<WebSocketConnection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let handler: WebSocketHandlerFn = Arc::new(move |socket| Box::pin(handler(socket)));
        self.router.add_websocket_route(WebSocketRoute {
            path: path.to_string(),
            handler,
        });
        self
    }

    /// Append a middleware to the application chain. Middlewares run
    /// in registration order on the way in and in reverse on the way
    /// out.
    pub fn add_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.chain.use_middleware(middleware);
        self
    }

    /// Register a pre-request hook as its own middleware.
    pub fn process_request<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpRequest, Error>> + Send + 'static,
    {
        self.add_middleware(PhaseMiddleware::new().on_request(hook))
    }

    /// Register a post-response hook as its own middleware.
    pub fn process_response<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(HttpResponse, Option<Arc<Error>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_middleware(PhaseMiddleware::new().on_response(hook))
    }

    /// Register a pre-accept WebSocket hook as its own middleware.
    pub fn process_websocket<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Arc<WebSocketConnection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.add_middleware(PhaseMiddleware::new().on_websocket(hook))
    }

    /// Register a raw dispatch hook as its own middleware. The hook
    /// replaces the rest of the chain and decides whether to call it.
    pub fn process_dispatch<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(HttpRequest, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_middleware(PhaseMiddleware::new().on_dispatch(hook))
    }

    /// Register an exception handler for faults carrying the payload
    /// type `E`, directly or anywhere in their cause chain.
    pub fn exception_type<E, F>(mut self, handler: F) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
        F: Fn(&Error, &ExceptionContext) -> Option<HttpResponse> + Send + Sync + 'static,
    {
        self.handlers
            .register_type::<E, _>(FnExceptionHandler::new(handler));
        self
    }

    /// Register an exception handler for a built-in error variant.
    pub fn exception_kind<F>(mut self, kind: ErrorKind, handler: F) -> Self
    where
        F: Fn(&Error, &ExceptionContext) -> Option<HttpResponse> + Send + Sync + 'static,
    {
        self.handlers
            .register_kind(kind, FnExceptionHandler::new(handler));
        self
    }

    /// Register an exception handler for an HTTP status code.
    pub fn exception_status<F>(mut self, status: u16, handler: F) -> Self
    where
        F: Fn(&Error, &ExceptionContext) -> Option<HttpResponse> + Send + Sync + 'static,
    {
        self.handlers
            .register_status(status, FnExceptionHandler::new(handler));
        self
    }

    /// Apply a plugin to the builder.
    pub fn plugin<P: Plugin>(self, plugin: P) -> Result<Self, Error> {
        plugin.setup(self)
    }

    /// Finalize the application.
    ///
    /// The state-seeding middleware is appended after all registered
    /// middlewares, so it runs innermost and request state is
    /// populated just before the route handler.
    pub fn build(mut self) -> App {
        self.chain.use_middleware(StateMiddleware);
        App {
            inner: Arc::new(AppInner {
                config: self.config,
                router: self.router,
                chain: self.chain,
                handlers: self.handlers,
                state: self.state,
            }),
        }
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct AppInner {
    config: AppConfig,
    router: Router,
    chain: MiddlewareChain,
    handlers: ExceptionHandlers,
    state: State,
}

/// The composed application. Cheap to clone and safe to share across
/// tasks.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn state(&self) -> &State {
        &self.inner.state
    }

    /// Reverse a registered route name into a URL.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, Error> {
        self.inner.router.url_for(name, params)
    }

    pub(crate) async fn resolve_exception(
        &self,
        request: &HttpRequest,
        error: &Error,
    ) -> Option<HttpResponse> {
        let ctx = ExceptionContext::from_request(request.clone());
        self.inner.handlers.resolve(error, &ctx).await
    }

    /// Run one request through the middleware chain and the router,
    /// with the application and request scopes bound for the duration.
    ///
    /// Faults that no exception handler resolves are returned to the
    /// caller.
    pub async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        debug!(method = %request.method, path = %request.path, "Dispatching request");

        let snapshot = Arc::new(request.clone());
        let app = self.clone();
        let resolver = self.clone();
        let inner = Arc::clone(&self.inner);
        let bound_request = Arc::clone(&snapshot);

        with_app_context(
            app,
            with_request_context(bound_request, async move {
                let route_target = Arc::clone(&inner);
                let route_handler: HandlerFn = Arc::new(move |req| {
                    let target = Arc::clone(&route_target);
                    Box::pin(async move { target.router.route(req).await })
                });

                match inner.chain.apply(request, route_handler).await {
                    Ok(response) => Ok(response),
                    Err(error) => match resolver.resolve_exception(&snapshot, &error).await {
                        Some(response) => {
                            debug!(error = %error, "Fault resolved by exception handler");
                            Ok(response)
                        }
                        None => Err(error),
                    },
                }
            }),
        )
        .await
    }

    /// Match a WebSocket connection to its route and run the handler,
    /// with the application and websocket scopes bound for the
    /// duration.
    pub async fn dispatch_websocket(
        &self,
        connection: Arc<WebSocketConnection>,
    ) -> Result<(), Error> {
        let app = self.clone();
        let inner = Arc::clone(&self.inner);
        let bound = Arc::clone(&connection);

        with_app_context(
            app,
            with_websocket_context(bound, async move {
                let matched = inner
                    .router
                    .match_websocket(connection.path())
                    .map(|(route, params)| (Arc::clone(&route.handler), params));

                let Some((handler, params)) = matched else {
                    return Err(Error::RouteNotFound(format!("WS {}", connection.path())));
                };

                connection.set_path_params(params);

                // A middleware error here rejects the connection
                // before the application-level accept.
                inner.chain.process_websocket(Arc::clone(&connection)).await?;

                handler(connection).await
            }),
        )
        .await
    }

    /// Serve HTTP on the given port until the listener fails.
    pub async fn serve(self, port: u16) -> Result<(), Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;

        info!(
            address = %addr,
            title = %self.inner.config.title,
            version = %self.inner.config.version,
            "Application is running"
        );

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let app = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let app = app.clone();
                    async move { Self::handle_request(req, app).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(error = ?err, "Error serving connection");
                }
            });
        }
    }

    /// Serve WebSocket upgrades on the given port until the listener
    /// fails.
    pub async fn serve_websocket(self, port: u16) -> Result<(), Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;

        info!(address = %addr, "WebSocket listener is running");

        loop {
            let (stream, _) = listener.accept().await?;
            let app = self.clone();

            tokio::spawn(async move {
                if let Err(err) = accept_websocket(app, stream).await {
                    warn!(error = %err, "WebSocket connection failed");
                }
            });
        }
    }

    /// Handle an incoming HTTP request
    async fn handle_request(
        req: Request<IncomingBody>,
        app: App,
    ) -> Result<Response<Full<bytes::Bytes>>, hyper::Error> {
        // Convert hyper request to our HttpRequest
        let method = req.method().to_string();
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        let mut request = HttpRequest::new(method, path);

        // Copy headers
        for (name, value) in req.headers() {
            if let Ok(value_str) = value.to_str() {
                request
                    .headers
                    .insert(name.to_string(), value_str.to_string());
            }
        }

        // Read body
        let body_bytes = req.collect().await?.to_bytes();
        request.body = body_bytes.to_vec();

        let debug = app.config().debug;
        let response = match app.dispatch(request).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "Unhandled fault");
                error_response(&err, debug)
            }
        };

        // Convert our HttpResponse back to a hyper response
        let mut builder = Response::builder().status(response.status);

        if !response
            .headers
            .keys()
            .any(|key| key.eq_ignore_ascii_case("date"))
        {
            builder = builder.header("Date", httpdate::fmt_http_date(SystemTime::now()));
        }

        for (key, value) in response.headers {
            builder = builder.header(key, value);
        }

        let body = Full::new(bytes::Bytes::from(response.body));
        Ok(builder.body(body).unwrap_or_else(|err| {
            error!(error = %err, "Failed to assemble response");
            let mut fallback = Response::new(Full::new(bytes::Bytes::new()));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        }))
    }
}

/// Reverse a route name into a URL through the ambient application.
///
/// With a request scope bound and a Host header present the result is
/// absolute, honoring `X-Forwarded-Proto` when a proxy sets it.
/// Outside request scope the bare path is returned.
pub fn url_for(name: &str, params: &[(&str, &str)]) -> Result<String, Error> {
    let app = current_app()?;
    let path = app.url_for(name, params)?;

    if let Ok(request) = current_request()
        && let Some(host) = request.header("host")
    {
        let scheme = request
            .header("x-forwarded-proto")
            .map(String::as_str)
            .unwrap_or("http");
        return Ok(format!("{}://{}{}", scheme, host, path));
    }

    Ok(path)
}

/// Convert an unresolved fault into the standard error envelope.
///
/// Server error details are masked unless the application runs in
/// debug mode.
fn error_response(error: &Error, debug: bool) -> HttpResponse {
    let status = error.status_code();
    let detail = if status >= 500 && !debug {
        "Internal Server Error".to_string()
    } else {
        error.to_string()
    };

    HttpResponse::detail(&detail, status).unwrap_or_else(|_| HttpResponse::internal_server_error())
}

/// Perform the upgrade handshake, then pump frames between the socket
/// and the connection handed to the matched route handler.
async fn accept_websocket(app: App, stream: TcpStream) -> Result<(), Error> {
    let mut path = String::from("/");
    let mut headers = HashMap::new();

    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &HandshakeRequest, response: HandshakeResponse| {
            path = req.uri().path().to_string();
            for (name, value) in req.headers() {
                if let Ok(value_str) = value.to_str() {
                    headers.insert(name.to_string(), value_str.to_string());
                }
            }
            Ok(response)
        },
    )
    .await
    .map_err(|err| Error::WebSocket(err.to_string()))?;

    let (connection, transport) = WebSocketConnection::channel(path, headers);

    tokio::spawn(async move {
        if let Err(err) = app.dispatch_websocket(connection).await {
            warn!(error = %err, "WebSocket handler error");
        }
    });

    drive_stream(ws_stream, transport).await
}
