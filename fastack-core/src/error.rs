// Error types for the Fastack framework

use crate::context::ScopeKind;
use crate::HttpStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// An ambient accessor was called with no enclosing scope of the
    /// named kind.
    #[error("Working outside of {0} context.")]
    OutOfContext(ScopeKind),

    /// A controller declaration violated the build contract. Raised at
    /// composition time, never during dispatch.
    #[error("Controller build error: {0}")]
    Build(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Faults applications raise to produce a specific status
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable Entity: {0}")]
    UnprocessableEntity(String),

    #[error("Too Many Requests: {0}")]
    TooManyRequests(String),

    #[error("Not Implemented: {0}")]
    NotImplemented(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),

    /// An application-defined fault, resolvable by type through the
    /// exception handler registry.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

/// Variant discriminants, used as exception handler registry keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    OutOfContext,
    Build,
    RouteNotFound,
    MethodNotAllowed,
    Serialization,
    Deserialization,
    Validation,
    WebSocket,
    Internal,
    Io,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    UnprocessableEntity,
    TooManyRequests,
    NotImplemented,
    ServiceUnavailable,
    Custom,
}

impl Error {
    /// Wrap an application-defined error for handler resolution by type.
    pub fn custom<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Custom(Box::new(error))
    }

    /// Get the variant discriminant for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OutOfContext(_) => ErrorKind::OutOfContext,
            Error::Build(_) => ErrorKind::Build,
            Error::RouteNotFound(_) => ErrorKind::RouteNotFound,
            Error::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Deserialization(_) => ErrorKind::Deserialization,
            Error::Validation(_) => ErrorKind::Validation,
            Error::WebSocket(_) => ErrorKind::WebSocket,
            Error::Internal(_) => ErrorKind::Internal,
            Error::Io(_) => ErrorKind::Io,
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::UnprocessableEntity(_) => ErrorKind::UnprocessableEntity,
            Error::TooManyRequests(_) => ErrorKind::TooManyRequests,
            Error::NotImplemented(_) => ErrorKind::NotImplemented,
            Error::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Error::Custom(_) => ErrorKind::Custom,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => HttpStatus::NotFound.code(),
            Error::MethodNotAllowed(_) => HttpStatus::MethodNotAllowed.code(),
            Error::Deserialization(_) => HttpStatus::BadRequest.code(),
            Error::Validation(_) => HttpStatus::BadRequest.code(),

            Error::BadRequest(_) => HttpStatus::BadRequest.code(),
            Error::Unauthorized(_) => HttpStatus::Unauthorized.code(),
            Error::Forbidden(_) => HttpStatus::Forbidden.code(),
            Error::NotFound(_) => HttpStatus::NotFound.code(),
            Error::Conflict(_) => HttpStatus::Conflict.code(),
            Error::UnprocessableEntity(_) => HttpStatus::UnprocessableEntity.code(),
            Error::TooManyRequests(_) => HttpStatus::TooManyRequests.code(),

            Error::NotImplemented(_) => HttpStatus::NotImplemented.code(),
            Error::ServiceUnavailable(_) => HttpStatus::ServiceUnavailable.code(),

            // Everything else is a server-side failure
            _ => HttpStatus::InternalServerError.code(),
        }
    }

    /// Get the HttpStatus enum for this error
    pub fn http_status(&self) -> HttpStatus {
        HttpStatus::from_code(self.status_code()).unwrap_or(HttpStatus::InternalServerError)
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.http_status().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.http_status().is_server_error()
    }

    /// Downcast a wrapped application fault, walking its cause chain.
    pub fn custom_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Custom(payload) => {
                let mut current: Option<&(dyn std::error::Error + 'static)> =
                    Some(payload.as_ref());
                while let Some(err) = current {
                    if let Some(found) = err.downcast_ref::<E>() {
                        return Some(found);
                    }
                    current = err.source();
                }
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("quota exhausted for {tenant}")]
    struct QuotaError {
        tenant: String,
    }

    #[derive(Debug, Error)]
    #[error("storage layer failed")]
    struct StorageError {
        #[source]
        cause: QuotaError,
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::Unauthorized("no token".into()).status_code(), 401);
        assert_eq!(Error::RouteNotFound("GET /x".into()).status_code(), 404);
        assert_eq!(Error::MethodNotAllowed("POST /x".into()).status_code(), 405);
        assert_eq!(Error::Build("bad".into()).status_code(), 500);
        assert_eq!(Error::Deserialization("bad json".into()).status_code(), 400);
    }

    #[test]
    fn test_error_classes() {
        assert!(Error::Conflict("dup".into()).is_client_error());
        assert!(Error::ServiceUnavailable("down".into()).is_server_error());
        assert!(!Error::NotFound("x".into()).is_server_error());
    }

    #[test]
    fn test_kind_discriminants() {
        assert_eq!(Error::Validation("v".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            Error::custom(QuotaError {
                tenant: "acme".into()
            })
            .kind(),
            ErrorKind::Custom
        );
    }

    #[test]
    fn test_custom_ref_direct() {
        let err = Error::custom(QuotaError {
            tenant: "acme".into(),
        });
        let quota = err.custom_ref::<QuotaError>().unwrap();
        assert_eq!(quota.tenant, "acme");
        assert!(err.custom_ref::<StorageError>().is_none());
    }

    #[test]
    fn test_custom_ref_walks_cause_chain() {
        let err = Error::custom(StorageError {
            cause: QuotaError {
                tenant: "acme".into(),
            },
        });
        assert!(err.custom_ref::<StorageError>().is_some());
        assert!(err.custom_ref::<QuotaError>().is_some());
    }

    #[test]
    fn test_custom_display_is_transparent() {
        let err = Error::custom(QuotaError {
            tenant: "acme".into(),
        });
        assert_eq!(err.to_string(), "quota exhausted for acme");
    }
}
