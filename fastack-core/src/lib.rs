// Core library for the Fastack web framework
// This module contains the foundational types, traits, and runtime components

pub mod app;
pub mod context;
pub mod controller;
pub mod conventions;
pub mod error;
pub mod exceptions;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod routing;
pub mod state;
pub mod status;
pub mod websocket;

// Re-export commonly used types; logging stays namespaced
pub use app::*;
pub use context::*;
pub use controller::*;
pub use conventions::*;
pub use error::*;
pub use exceptions::*;
pub use http::*;
pub use middleware::*;
pub use routing::*;
pub use state::*;
pub use status::*;
pub use websocket::*;
