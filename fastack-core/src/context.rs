//! Ambient, task-scoped execution context.
//!
//! Three scope kinds exist: application, request, and websocket. A scope is
//! bound for the dynamic extent of a future via the `with_*_context`
//! functions and read back anywhere below with the `current_*` accessors.
//! Storage is tokio task-local, so concurrent dispatches never observe each
//! other's bindings, and the previous binding is restored on every exit
//! path, cancellation included.
//!
//! ```
//! use fastack_core::context::{current_app, with_app_context};
//! use fastack_core::{App, Error};
//!
//! # tokio_test::block_on(async {
//! let app = App::builder().build();
//! with_app_context(app, async {
//!     let app = current_app()?;
//!     let _ = app.config();
//!     Ok::<_, Error>(())
//! })
//! .await
//! # })
//! # .unwrap();
//! ```

use crate::app::App;
use crate::http::HttpRequest;
use crate::websocket::WebSocketConnection;
use crate::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static APP_CONTEXT: App;
    static REQUEST_CONTEXT: Arc<HttpRequest>;
    static WEBSOCKET_CONTEXT: Arc<WebSocketConnection>;
}

/// The kind of ambient scope an accessor expected to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Application,
    Request,
    WebSocket,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Application => "application",
            ScopeKind::Request => "request",
            ScopeKind::WebSocket => "websocket",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run `fut` with the application scope bound to `app`.
///
/// Nesting is allowed; the inner binding shadows the outer one and the
/// outer binding is restored when `fut` completes, fails, or is dropped.
pub async fn with_app_context<F>(app: App, fut: F) -> F::Output
where
    F: Future,
{
    APP_CONTEXT.scope(app, fut).await
}

/// Run `fut` with the request scope bound to `request`.
pub async fn with_request_context<F>(request: Arc<HttpRequest>, fut: F) -> F::Output
where
    F: Future,
{
    REQUEST_CONTEXT.scope(request, fut).await
}

/// Run `fut` with the websocket scope bound to `connection`.
pub async fn with_websocket_context<F>(connection: Arc<WebSocketConnection>, fut: F) -> F::Output
where
    F: Future,
{
    WEBSOCKET_CONTEXT.scope(connection, fut).await
}

/// The application handle bound to the current task.
pub fn current_app() -> Result<App, Error> {
    APP_CONTEXT
        .try_with(|app| app.clone())
        .map_err(|_| Error::OutOfContext(ScopeKind::Application))
}

/// The request bound to the current task, as received at dispatch entry.
pub fn current_request() -> Result<Arc<HttpRequest>, Error> {
    REQUEST_CONTEXT
        .try_with(Arc::clone)
        .map_err(|_| Error::OutOfContext(ScopeKind::Request))
}

/// The websocket connection bound to the current task.
pub fn current_websocket() -> Result<Arc<WebSocketConnection>, Error> {
    WEBSOCKET_CONTEXT
        .try_with(Arc::clone)
        .map_err(|_| Error::OutOfContext(ScopeKind::WebSocket))
}

pub fn has_app_context() -> bool {
    APP_CONTEXT.try_with(|_| ()).is_ok()
}

pub fn has_request_context() -> bool {
    REQUEST_CONTEXT.try_with(|_| ()).is_ok()
}

pub fn has_websocket_context() -> bool {
    WEBSOCKET_CONTEXT.try_with(|_| ()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;

    fn request(path: &str) -> Arc<HttpRequest> {
        Arc::new(HttpRequest::new("GET".to_string(), path.to_string()))
    }

    #[tokio::test]
    async fn test_accessors_fail_outside_scope() {
        let err = current_app().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Working outside of application context."
        );

        let err = current_request().unwrap_err();
        assert_eq!(err.to_string(), "Working outside of request context.");

        let err = current_websocket().unwrap_err();
        assert_eq!(err.to_string(), "Working outside of websocket context.");
    }

    #[tokio::test]
    async fn test_binding_visible_within_scope() {
        assert!(!has_request_context());

        with_request_context(request("/a"), async {
            assert!(has_request_context());
            let req = current_request().unwrap();
            assert_eq!(req.path, "/a");
        })
        .await;

        assert!(!has_request_context());
    }

    #[tokio::test]
    async fn test_nested_scopes_restore_outer_binding() {
        with_request_context(request("/outer"), async {
            assert_eq!(current_request().unwrap().path, "/outer");

            with_request_context(request("/inner"), async {
                assert_eq!(current_request().unwrap().path, "/inner");
            })
            .await;

            assert_eq!(current_request().unwrap().path, "/outer");
        })
        .await;
    }

    #[tokio::test]
    async fn test_scope_unwinds_on_error() {
        let result: Result<(), Error> = with_request_context(request("/failing"), async {
            assert!(has_request_context());
            Err(Error::Internal("boom".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert!(!has_request_context());
    }

    #[tokio::test]
    async fn test_scope_unwinds_when_future_is_dropped() {
        let scoped = with_request_context(request("/cancelled"), std::future::pending::<()>());

        tokio::select! {
            _ = scoped => unreachable!("pending future cannot complete"),
            _ = tokio::task::yield_now() => {}
        }

        assert!(!has_request_context());
    }

    #[tokio::test]
    async fn test_joined_scopes_stay_isolated() {
        let left = with_request_context(request("/left"), async {
            for _ in 0..10 {
                tokio::task::yield_now().await;
                assert_eq!(current_request().unwrap().path, "/left");
            }
        });
        let right = with_request_context(request("/right"), async {
            for _ in 0..10 {
                tokio::task::yield_now().await;
                assert_eq!(current_request().unwrap().path, "/right");
            }
        });

        tokio::join!(left, right);
    }

    #[tokio::test]
    async fn test_spawned_tasks_do_not_inherit_scope() {
        with_request_context(request("/parent"), async {
            let child = tokio::spawn(async { has_request_context() });
            assert!(!child.await.unwrap());
        })
        .await;
    }

    #[tokio::test]
    async fn test_app_scope_returns_handle_clone() {
        let app = App::builder().build();
        with_app_context(app, async {
            assert!(has_app_context());
            let handle = current_app().unwrap();
            let again = current_app().unwrap();
            assert_eq!(handle.config().title, again.config().title);
        })
        .await;
    }
}
