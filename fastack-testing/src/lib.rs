//! Testing utilities for the Fastack framework.
//!
//! [`TestClient`] drives requests through the full application
//! pipeline (middleware, routing, exception handling) without opening
//! a socket, and [`TestAppBuilder`] assembles small applications for
//! integration tests.
//!
//! ## Quick Start
//!
//! ```
//! use fastack_testing::*;
//! use fastack_core::HttpResponse;
//!
//! # tokio_test::block_on(async {
//! let app = TestAppBuilder::new()
//!     .with_route("/hello", |_req| async {
//!         Ok(HttpResponse::ok().with_body(b"Hello!".to_vec()))
//!     })
//!     .build();
//!
//! let client = app.client();
//! let response = client.get("/hello").await;
//! assert_eq!(response.status(), Some(200));
//! assert_eq!(response.body_string(), Some("Hello!".to_string()));
//! # });
//! ```
//!
//! ## Testing Controllers
//!
//! ```no_run
//! use fastack_testing::*;
//! use fastack_core::{App, HttpResponse};
//! # fn controller_app() -> App { App::builder().build() }
//!
//! # tokio_test::block_on(async {
//! // Any composed App works; controllers included
//! let client = TestClient::new(controller_app());
//! let response = client.get("/user/1").await;
//! assert_status(&response, 200);
//! # });
//! ```
//!
//! ## WebSockets
//!
//! ```
//! use fastack_testing::*;
//! use fastack_core::WebSocketMessage;
//!
//! # tokio_test::block_on(async {
//! let app = TestAppBuilder::new()
//!     .with_websocket("/echo", |socket| async move {
//!         socket.accept().await?;
//!         if let WebSocketMessage::Text(text) = socket.receive().await? {
//!             socket.send_text(text).await?;
//!         }
//!         Ok(())
//!     })
//!     .build();
//!
//! let (peer, handle) = app.client().websocket("/echo");
//! peer.send_text("ping").unwrap();
//! assert_eq!(
//!     peer.receive().await,
//!     Some(WebSocketMessage::Text("ping".to_string()))
//! );
//! handle.await.unwrap().unwrap();
//! # });
//! ```

mod assertions;
mod test_app;
mod test_client;

pub use assertions::{
    assert_body_contains, assert_client_error, assert_detail, assert_fault_kind, assert_header,
    assert_http_status, assert_json, assert_json_content_type, assert_server_error, assert_status,
    assert_success,
};
pub use test_app::{TestApp, TestAppBuilder};
pub use test_client::{TestClient, TestRequestBuilder, TestResponse};
