// HTTP verbs and the method-name convention table for controllers

use std::collections::HashMap;

/// HTTP methods
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
    CONNECT,
    TRACE,
}

impl HttpMethod {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            "CONNECT" => Some(HttpMethod::CONNECT),
            "TRACE" => Some(HttpMethod::TRACE),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::CONNECT => "CONNECT",
            HttpMethod::TRACE => "TRACE",
        }
    }
}

/// The five conventional REST endpoints a controller can expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiEndpoint {
    List,
    Create,
    Retrieve,
    Update,
    Destroy,
}

impl ApiEndpoint {
    pub const ALL: [ApiEndpoint; 5] = [
        ApiEndpoint::List,
        ApiEndpoint::Create,
        ApiEndpoint::Retrieve,
        ApiEndpoint::Update,
        ApiEndpoint::Destroy,
    ];

    /// The controller method name this endpoint binds to.
    pub fn method_name(&self) -> &'static str {
        match self {
            ApiEndpoint::List => "list",
            ApiEndpoint::Create => "create",
            ApiEndpoint::Retrieve => "retrieve",
            ApiEndpoint::Update => "update",
            ApiEndpoint::Destroy => "destroy",
        }
    }

    pub fn verb(&self) -> HttpMethod {
        match self {
            ApiEndpoint::List => HttpMethod::GET,
            ApiEndpoint::Create => HttpMethod::POST,
            ApiEndpoint::Retrieve => HttpMethod::GET,
            ApiEndpoint::Update => HttpMethod::PUT,
            ApiEndpoint::Destroy => HttpMethod::DELETE,
        }
    }

    /// Path suffix appended to the controller prefix. Collection
    /// endpoints contribute nothing, item endpoints contribute the id
    /// segment.
    pub fn path_template(&self) -> &'static str {
        match self {
            ApiEndpoint::List => "",
            ApiEndpoint::Create => "",
            ApiEndpoint::Retrieve => "/{id}",
            ApiEndpoint::Update => "/{id}",
            ApiEndpoint::Destroy => "/{id}",
        }
    }
}

/// A single convention row: the verb and path suffix for a method name.
#[derive(Clone, Debug)]
pub struct Convention {
    pub method: HttpMethod,
    pub path: String,
}

/// Maps controller method names to their conventional verb and path.
///
/// The standard table covers the five REST endpoints; controllers can
/// extend or replace rows to teach the build pipeline new conventions.
#[derive(Clone, Debug)]
pub struct ConventionTable {
    entries: HashMap<String, Convention>,
}

impl ConventionTable {
    /// A table with no rows. Only literal verb names and explicitly
    /// flagged actions survive the build against an empty table.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The standard REST table: list, create, retrieve, update, destroy.
    pub fn standard() -> Self {
        let mut entries = HashMap::new();
        for endpoint in ApiEndpoint::ALL {
            entries.insert(
                endpoint.method_name().to_string(),
                Convention {
                    method: endpoint.verb(),
                    path: endpoint.path_template().to_string(),
                },
            );
        }
        Self { entries }
    }

    /// Add or replace a row, consuming and returning the table.
    pub fn with_entry(
        mut self,
        method_name: impl Into<String>,
        method: HttpMethod,
        path: impl Into<String>,
    ) -> Self {
        self.entries.insert(
            method_name.into(),
            Convention {
                method,
                path: path.into(),
            },
        );
        self
    }

    pub fn lookup(&self, method_name: &str) -> Option<&Convention> {
        self.entries.get(method_name)
    }

    /// Conventional path suffix for a method name, empty on a miss.
    pub fn default_path(&self, method_name: &str) -> String {
        self.lookup(method_name)
            .map(|c| c.path.clone())
            .unwrap_or_default()
    }

    /// Conventional verb for a method name, if the table has a row.
    pub fn default_verb(&self, method_name: &str) -> Option<HttpMethod> {
        self.lookup(method_name).map(|c| c.method.clone())
    }
}

impl Default for ConventionTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_method_from_str() {
        assert_eq!(HttpMethod::from_str("GET"), Some(HttpMethod::GET));
        assert_eq!(HttpMethod::from_str("get"), Some(HttpMethod::GET));
        assert_eq!(HttpMethod::from_str("Delete"), Some(HttpMethod::DELETE));
        assert_eq!(HttpMethod::from_str("TRACE"), Some(HttpMethod::TRACE));
        assert_eq!(HttpMethod::from_str("retrieve"), None);
        assert_eq!(HttpMethod::from_str(""), None);
    }

    #[test]
    fn test_http_method_as_str_round_trip() {
        for verb in [
            HttpMethod::GET,
            HttpMethod::POST,
            HttpMethod::PUT,
            HttpMethod::DELETE,
            HttpMethod::PATCH,
            HttpMethod::HEAD,
            HttpMethod::OPTIONS,
            HttpMethod::CONNECT,
            HttpMethod::TRACE,
        ] {
            assert_eq!(HttpMethod::from_str(verb.as_str()), Some(verb));
        }
    }

    #[test]
    fn test_standard_table_rows() {
        let table = ConventionTable::standard();

        let list = table.lookup("list").unwrap();
        assert_eq!(list.method, HttpMethod::GET);
        assert_eq!(list.path, "");

        let create = table.lookup("create").unwrap();
        assert_eq!(create.method, HttpMethod::POST);
        assert_eq!(create.path, "");

        let retrieve = table.lookup("retrieve").unwrap();
        assert_eq!(retrieve.method, HttpMethod::GET);
        assert_eq!(retrieve.path, "/{id}");

        let update = table.lookup("update").unwrap();
        assert_eq!(update.method, HttpMethod::PUT);
        assert_eq!(update.path, "/{id}");

        let destroy = table.lookup("destroy").unwrap();
        assert_eq!(destroy.method, HttpMethod::DELETE);
        assert_eq!(destroy.path, "/{id}");
    }

    #[test]
    fn test_with_entry_overrides_standard_row() {
        let table =
            ConventionTable::standard().with_entry("destroy", HttpMethod::POST, "/{id}/delete");

        let destroy = table.lookup("destroy").unwrap();
        assert_eq!(destroy.method, HttpMethod::POST);
        assert_eq!(destroy.path, "/{id}/delete");

        // Other rows are untouched
        assert_eq!(table.default_verb("list"), Some(HttpMethod::GET));
    }

    #[test]
    fn test_lookup_miss_defaults() {
        let table = ConventionTable::standard();
        assert!(table.lookup("archive").is_none());
        assert_eq!(table.default_path("archive"), "");
        assert_eq!(table.default_verb("archive"), None);
    }

    #[test]
    fn test_empty_table_has_no_rows() {
        let table = ConventionTable::empty();
        assert!(table.lookup("list").is_none());
        assert_eq!(table.default_path("list"), "");
    }
}
