//! Exception handler registry
//!
//! Handlers turn faults into responses. Resolution tries the most
//! specific match first: handlers registered for the exact payload
//! type, then payload cause chains, then error variants, then status
//! codes. A handler may decline by returning `None`, which passes the
//! fault to the next candidate. A fault no handler resolves propagates
//! to the caller unchanged.

use crate::logging::debug;
use crate::{Error, ErrorKind, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Context information passed to exception handlers.
#[derive(Debug, Clone)]
pub struct ExceptionContext {
    /// The original HTTP request
    pub request: HttpRequest,
    /// Request ID for tracing
    pub request_id: Option<String>,
    /// The path that was being accessed
    pub path: String,
    /// The HTTP method
    pub method: String,
}

impl ExceptionContext {
    /// Create a new exception context from an HTTP request.
    pub fn from_request(request: HttpRequest) -> Self {
        let request_id = request.header("x-request-id").cloned();
        let path = request.path.clone();
        let method = request.method.clone();

        Self {
            request,
            request_id,
            path,
            method,
        }
    }
}

/// Trait for exception handlers that turn errors into responses.
///
/// Return `Some(HttpResponse)` to resolve the error, or `None` to
/// decline and let the next candidate try.
#[async_trait]
pub trait ExceptionHandler: Send + Sync + 'static {
    async fn handle(&self, error: &Error, ctx: &ExceptionContext) -> Option<HttpResponse>;
}

/// A function-based exception handler for simple cases.
pub struct FnExceptionHandler<F>
where
    F: Fn(&Error, &ExceptionContext) -> Option<HttpResponse> + Send + Sync + 'static,
{
    handler: F,
}

impl<F> FnExceptionHandler<F>
where
    F: Fn(&Error, &ExceptionContext) -> Option<HttpResponse> + Send + Sync + 'static,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> ExceptionHandler for FnExceptionHandler<F>
where
    F: Fn(&Error, &ExceptionContext) -> Option<HttpResponse> + Send + Sync + 'static,
{
    async fn handle(&self, error: &Error, ctx: &ExceptionContext) -> Option<HttpResponse> {
        (self.handler)(error, ctx)
    }
}

type MatchFn = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// A handler registered against a concrete fault type.
#[derive(Clone)]
struct TypedHandler {
    type_name: &'static str,
    /// Matches when the wrapped payload is exactly the registered type.
    exact: MatchFn,
    /// Matches when the registered type appears anywhere in the
    /// payload's cause chain.
    chained: MatchFn,
    handler: Arc<dyn ExceptionHandler>,
}

/// The per-application exception handler registry.
#[derive(Clone, Default)]
pub struct ExceptionHandlers {
    typed: Vec<TypedHandler>,
    by_kind: HashMap<ErrorKind, Arc<dyn ExceptionHandler>>,
    by_status: HashMap<u16, Arc<dyn ExceptionHandler>>,
}

impl ExceptionHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an application fault type wrapped via
    /// `Error::custom`.
    pub fn register_type<E, H>(&mut self, handler: H)
    where
        E: std::error::Error + Send + Sync + 'static,
        H: ExceptionHandler,
    {
        let exact: MatchFn = Arc::new(|error: &Error| match error {
            Error::Custom(payload) => payload.is::<E>(),
            _ => false,
        });
        let chained: MatchFn = Arc::new(|error: &Error| error.custom_ref::<E>().is_some());

        self.typed.push(TypedHandler {
            type_name: std::any::type_name::<E>(),
            exact,
            chained,
            handler: Arc::new(handler),
        });
    }

    /// Register a handler for a built-in error variant.
    pub fn register_kind<H: ExceptionHandler>(&mut self, kind: ErrorKind, handler: H) {
        self.by_kind.insert(kind, Arc::new(handler));
    }

    /// Register a handler for an HTTP status code.
    pub fn register_status<H: ExceptionHandler>(&mut self, status: u16, handler: H) {
        self.by_status.insert(status, Arc::new(handler));
    }

    /// Resolve an error to a response, most specific match first.
    pub async fn resolve(&self, error: &Error, ctx: &ExceptionContext) -> Option<HttpResponse> {
        // Exact payload type, in registration order
        for typed in &self.typed {
            if (typed.exact)(error) {
                if let Some(response) = typed.handler.handle(error, ctx).await {
                    debug!(
                        handler_type = typed.type_name,
                        "Exception resolved by exact type"
                    );
                    return Some(response);
                }
            }
        }

        // Payload cause chain
        for typed in &self.typed {
            if (typed.chained)(error) {
                if let Some(response) = typed.handler.handle(error, ctx).await {
                    debug!(
                        handler_type = typed.type_name,
                        "Exception resolved by cause chain"
                    );
                    return Some(response);
                }
            }
        }

        // Variant kind
        if let Some(handler) = self.by_kind.get(&error.kind())
            && let Some(response) = handler.handle(error, ctx).await
        {
            debug!(kind = ?error.kind(), "Exception resolved by kind");
            return Some(response);
        }

        // Status code
        if let Some(handler) = self.by_status.get(&error.status_code())
            && let Some(response) = handler.handle(error, ctx).await
        {
            debug!(
                status = error.status_code(),
                "Exception resolved by status code"
            );
            return Some(response);
        }

        None
    }
}
