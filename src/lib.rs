// Fastack - A convention-driven web framework for Rust
//
// Controllers declare resource endpoints through trait methods, middleware
// and exception handlers compose per application, and handlers reach the
// current application, request, or websocket through task-scoped context.

// Re-export core functionality
pub use fastack_core::*;

// Re-export optional crates
#[cfg(feature = "testing")]
pub use fastack_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ApiEndpoint,
        ApiModel,
        App,
        AppBuilder,
        AppConfig,
        Controller,
        CreateEndpoint,
        DestroyEndpoint,
        Error,
        ErrorKind,
        HttpMethod,
        HttpRequest,
        HttpResponse,
        Json,
        ListEndpoint,
        Middleware,
        Plugin,
        Responder,
        RetrieveEndpoint,
        Route,
        RouteMeta,
        Router,
        State,
        UpdateEndpoint,
        WebSocketConnection,
        WebSocketMessage,
        current_app,
        current_request,
        current_websocket,
        url_for,
    };
}
