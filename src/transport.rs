//! HTTP transport seam between the deploy pipeline and the hosting API.
//!
//! The pipeline never talks to the network directly: every wire operation
//! goes through the [`Transport`] trait, so tests can substitute a scripted
//! in-memory double. The trait returns boxed `Send` futures to stay
//! object-safe without an async-trait dependency.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// HTTP method used for an API request.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    /// Fetch a resource.
    Get,
    /// Create a resource.
    Post,
    /// Replace or update a resource.
    Put,
    /// Delete a resource.
    Delete,
}

impl Method {
    /// Uppercase wire form of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body carried by an API request.
#[derive(Clone, Debug)]
pub enum RequestBody {
    /// No body (GET, DELETE).
    Empty,
    /// A JSON document.
    Json(serde_json::Value),
    /// Raw bytes with an explicit content type (file uploads, archives).
    Binary {
        /// Content type announced to the server.
        content_type: &'static str,
        /// Payload bytes, sent verbatim.
        bytes: Vec<u8>,
    },
}

/// One request against the hosting API.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Resource path starting with `/`, relative to the API endpoint.
    pub path: String,
    /// Request body.
    pub body: RequestBody,
}

impl ApiRequest {
    /// Builds a body-less request.
    #[must_use]
    pub const fn new(method: Method, path: String) -> Self {
        Self {
            method,
            path,
            body: RequestBody::Empty,
        }
    }

    /// Attaches a JSON body.
    #[must_use]
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Attaches a binary body with the given content type.
    #[must_use]
    pub fn with_binary(mut self, content_type: &'static str, bytes: Vec<u8>) -> Self {
        self.body = RequestBody::Binary {
            content_type,
            bytes,
        };
        self
    }
}

/// Successful response from the hosting API.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code (always a success status).
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

/// Errors raised by a transport.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// Raised when the request cannot be sent or the response cannot be
    /// read (DNS, TLS, timeouts, connection loss).
    #[error("transport failure for {method} {path}: {message}")]
    Connection {
        /// Method of the failed request.
        method: Method,
        /// Path of the failed request.
        path: String,
        /// Operating system or client error string.
        message: String,
    },
    /// Raised when the server answers with a non-success status.
    #[error("server returned {status} for {method} {path}: {detail}")]
    Status {
        /// HTTP status code returned by the server.
        status: u16,
        /// Method of the rejected request.
        method: Method,
        /// Path of the rejected request.
        path: String,
        /// Leading portion of the error response body.
        detail: String,
    },
}

/// Future returned by transport operations.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Minimal interface the deploy pipeline requires from an HTTP client.
pub trait Transport: Send + Sync {
    /// Sends one request and resolves with the successful response.
    ///
    /// Implementations must map non-success HTTP statuses to
    /// [`TransportError::Status`]; callers never inspect failure bodies.
    fn send(&self, request: ApiRequest) -> TransportFuture<'_, ApiResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_wire_forms_are_uppercase() {
        assert_eq!(Method::Get.as_str(), "GET");
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn request_builder_attaches_bodies() {
        let json = ApiRequest::new(Method::Post, String::from("/sites"))
            .with_json(serde_json::json!({"files": {}}));
        assert!(matches!(json.body, RequestBody::Json(_)));

        let binary = ApiRequest::new(Method::Put, String::from("/sites/1"))
            .with_binary("application/zip", vec![0x50, 0x4b]);
        let RequestBody::Binary {
            content_type,
            bytes,
        } = binary.body
        else {
            panic!("expected binary body");
        };
        assert_eq!(content_type, "application/zip");
        assert_eq!(bytes, vec![0x50, 0x4b]);
    }
}
