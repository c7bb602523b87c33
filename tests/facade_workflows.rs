//! Integration tests for common Fastack workflows.
//!
//! Everything here goes through the `fastack` facade and the
//! `fastack_testing` client, the way application code would.

use fastack::prelude::*;
use fastack_testing::{TestAppBuilder, TestClient, assert_detail, assert_status};
use std::sync::Arc;

// =============================================================================
// Controller workflow
// =============================================================================

struct TaskController;

#[async_trait::async_trait]
impl ListEndpoint for TaskController {
    async fn list(&self, _request: HttpRequest) -> Result<HttpResponse, Error> {
        HttpResponse::ok().with_json(&serde_json::json!([{ "id": 1 }, { "id": 2 }]))
    }
}

#[async_trait::async_trait]
impl RetrieveEndpoint for TaskController {
    async fn retrieve(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let id = request
            .param("id")
            .cloned()
            .ok_or_else(|| Error::BadRequest("missing id".to_string()))?;
        HttpResponse::ok().with_json(&serde_json::json!({ "id": id }))
    }
}

impl Controller for TaskController {
    fn responders(self: Arc<Self>) -> Vec<Responder> {
        vec![
            Arc::clone(&self).list_responder(),
            Arc::clone(&self).retrieve_responder(),
        ]
    }
}

#[tokio::test]
async fn test_controller_workflow() {
    let app = TestAppBuilder::new()
        .with_controller(TaskController)
        .unwrap()
        .build();
    let client = app.client();

    let collection = client.get("/task").await;
    assert_status(&collection, 200);
    let items: Vec<serde_json::Value> = collection.body_json().unwrap();
    assert_eq!(items.len(), 2);

    let item = client.get("/task/9").await;
    assert_status(&item, 200);
    let body: serde_json::Value = item.body_json().unwrap();
    assert_eq!(body["id"], "9");
}

// =============================================================================
// Exception translation workflow
// =============================================================================

#[tokio::test]
async fn test_exception_translation_workflow() {
    let app = TestAppBuilder::new()
        .with_route("/missing", |_req| async {
            Err(Error::NotFound("no such record".to_string()))
        })
        .configure(|builder| {
            builder.exception_kind(ErrorKind::NotFound, |error, _ctx| {
                HttpResponse::detail(&error.to_string(), 404).ok()
            })
        })
        .build();
    let client = app.client();

    let response = client.get("/missing").await;
    assert_status(&response, 404);
    assert_detail(&response, "Not Found: no such record");
}

// =============================================================================
// Application state workflow
// =============================================================================

#[derive(Clone)]
struct ApiKeys {
    primary: &'static str,
}

#[tokio::test]
async fn test_state_workflow() {
    let app = TestAppBuilder::new()
        .with_state(ApiKeys { primary: "sk-test" })
        .with_route("/keys", |req| async move {
            let keys = req
                .state
                .get::<ApiKeys>()
                .ok_or_else(|| Error::Internal("state missing".to_string()))?;
            Ok(HttpResponse::text(keys.primary))
        })
        .build();
    let client = app.client();

    let response = client.get("/keys").await;
    assert_status(&response, 200);
    assert_eq!(response.body_string().unwrap(), "sk-test");
}

// =============================================================================
// Request builder workflow
// =============================================================================

#[tokio::test]
async fn test_request_builder_workflow() {
    let app = TestAppBuilder::new()
        .with_method_route(HttpMethod::POST, "/echo", |req| async move {
            let value: serde_json::Value = req.json()?;
            HttpResponse::json(&value)
        })
        .build();
    let client = TestClient::new(app.app.clone());

    let response = fastack_testing::TestRequestBuilder::new(HttpMethod::POST, "/echo")
        .json(&serde_json::json!({ "note": "ship it" }))
        .unwrap()
        .send(&client)
        .await;

    assert_status(&response, 200);
    let body: serde_json::Value = response.body_json().unwrap();
    assert_eq!(body["note"], "ship it");
}

// =============================================================================
// WebSocket workflow
// =============================================================================

#[tokio::test]
async fn test_websocket_workflow() {
    let app = TestAppBuilder::new()
        .with_websocket("/echo", |socket| async move {
            socket.accept().await?;
            loop {
                match socket.receive().await? {
                    WebSocketMessage::Text(text) => socket.send_text(text).await?,
                    WebSocketMessage::Close => break,
                    _ => {}
                }
            }
            Ok(())
        })
        .build();
    let client = app.client();

    let (peer, handle) = client.websocket("/echo");
    peer.send_text("hello").unwrap();
    assert!(matches!(
        peer.receive().await,
        Some(WebSocketMessage::Text(text)) if text == "hello"
    ));

    peer.send(WebSocketMessage::Close).unwrap();
    handle.await.unwrap().unwrap();
}
