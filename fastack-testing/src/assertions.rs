// Test assertions for HTTP responses

use crate::TestResponse;
use fastack_core::{ErrorKind, HttpResponse, HttpStatus};

/// Assert that a response has a specific status code
pub fn assert_status(response: &TestResponse, expected: u16) {
    match response {
        TestResponse::Success(resp) => assert_eq!(
            resp.status, expected,
            "Expected status {}, got {}",
            expected, resp.status
        ),
        TestResponse::Fault(error) => {
            panic!("Expected status {}, got unresolved fault: {}", expected, error)
        }
    }
}

/// Assert that a response has a specific HTTP status
pub fn assert_http_status(response: &HttpResponse, expected: HttpStatus) {
    assert_eq!(
        response.status,
        expected.code(),
        "Expected status {}, got {}",
        expected.code(),
        response.status
    );
}

/// Assert that the request ended in an unresolved fault of the given
/// kind
pub fn assert_fault_kind(response: &TestResponse, expected: ErrorKind) {
    match response {
        TestResponse::Fault(error) => assert_eq!(
            error.kind(),
            expected,
            "Expected {:?} fault, got {:?}",
            expected,
            error.kind()
        ),
        TestResponse::Success(resp) => {
            panic!("Expected {:?} fault, got status {}", expected, resp.status)
        }
    }
}

/// Assert that a response body contains JSON matching expected value
pub fn assert_json<T>(response: &TestResponse, expected: &T)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let actual: T = response
        .body_json()
        .expect("Failed to deserialize response body");
    assert_eq!(actual, *expected, "JSON bodies do not match");
}

/// Assert the "detail" field of the standard error envelope
pub fn assert_detail(response: &TestResponse, expected: &str) {
    let actual = response.detail();
    assert_eq!(
        actual.as_deref(),
        Some(expected),
        "Expected detail '{}', got {:?}",
        expected,
        actual
    );
}

/// Assert that a response has a specific header
pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key).map(|s| s.as_str());
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

/// Assert that a response body contains a string
pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string().unwrap_or_default();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}', but it didn't. Body: {}",
        expected,
        body
    );
}

/// Assert that a response is successful (2xx status)
pub fn assert_success(response: &TestResponse) {
    let status = response.status().unwrap_or(0);
    assert!(
        (200..300).contains(&status),
        "Expected successful status (2xx), got {}",
        status
    );
}

/// Assert that a response is a client error (4xx status)
pub fn assert_client_error(response: &TestResponse) {
    let status = response.status().unwrap_or(0);
    assert!(
        (400..500).contains(&status),
        "Expected client error status (4xx), got {}",
        status
    );
}

/// Assert that a response is a server error (5xx status)
pub fn assert_server_error(response: &TestResponse) {
    let status = response.status().unwrap_or(0);
    assert!(
        (500..600).contains(&status),
        "Expected server error status (5xx), got {}",
        status
    );
}

/// Assert that a response has JSON content type
pub fn assert_json_content_type(response: &TestResponse) {
    let content_type = response.header("Content-Type");
    assert!(
        content_type
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false),
        "Expected JSON content type, got {:?}",
        content_type
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastack_core::Error;
    use std::collections::HashMap;

    fn create_test_response(status: u16, body: &str) -> TestResponse {
        TestResponse::Success(HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.as_bytes().to_vec(),
        })
    }

    #[test]
    fn test_assert_status() {
        let response = create_test_response(200, "OK");
        assert_status(&response, 200);
    }

    #[test]
    #[should_panic(expected = "unresolved fault")]
    fn test_assert_status_panics_on_fault() {
        let response = TestResponse::Fault(Error::RouteNotFound("/missing".to_string()));
        assert_status(&response, 200);
    }

    #[test]
    fn test_assert_fault_kind() {
        let response = TestResponse::Fault(Error::Unauthorized("no token".to_string()));
        assert_fault_kind(&response, ErrorKind::Unauthorized);
    }

    #[test]
    fn test_assert_detail() {
        let response = create_test_response(404, r#"{"detail":"Not Found: user 7"}"#);
        assert_detail(&response, "Not Found: user 7");
    }

    #[test]
    fn test_assert_body_contains() {
        let response = create_test_response(200, "Hello World");
        assert_body_contains(&response, "Hello");
    }

    #[test]
    fn test_assert_json() {
        let response = create_test_response(200, r#"{"id": 7, "name": "ada"}"#);
        assert_json(&response, &serde_json::json!({"id": 7, "name": "ada"}));
    }

    #[test]
    fn test_assert_http_status() {
        assert_http_status(&HttpResponse::no_content(), HttpStatus::NoContent);
    }

    #[test]
    fn test_assert_status_ranges() {
        assert_success(&create_test_response(200, "OK"));
        assert_success(&create_test_response(204, ""));
        assert_client_error(&create_test_response(404, "Not Found"));
        assert_client_error(&create_test_response(422, "Unprocessable"));
        assert_server_error(&create_test_response(500, "Internal Error"));
        assert_server_error(&create_test_response(503, "Unavailable"));
    }

    #[test]
    fn test_assert_header() {
        let mut response = HttpResponse::ok();
        response
            .headers
            .insert("X-Custom".to_string(), "value".to_string());
        let test_response = TestResponse::Success(response);
        assert_header(&test_response, "X-Custom", "value");
    }

    #[test]
    fn test_assert_json_content_type() {
        let mut response = HttpResponse::ok();
        response.headers.insert(
            "Content-Type".to_string(),
            "application/json".to_string(),
        );
        let test_response = TestResponse::Success(response);
        assert_json_content_type(&test_response);
    }
}
