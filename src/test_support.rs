//! Scripted in-memory transport shared by unit and integration tests.
//!
//! [`FakeTransport`] records every request it sees and replies from stubbed
//! responses, so the deploy pipeline can be exercised end-to-end without a
//! network. Responses for an exact method + path are consumed as a queue
//! (the final one repeats once drained), which lets tests script a session
//! moving through its lifecycle states across successive refreshes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use crate::transport::{
    ApiRequest, ApiResponse, Method, RequestBody, Transport, TransportError, TransportFuture,
};

/// One request observed by [`FakeTransport`], decomposed for assertions.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    /// HTTP method of the request.
    pub method: Method,
    /// Request path, including the leading slash.
    pub path: String,
    /// Content type, for binary bodies.
    pub content_type: Option<String>,
    /// Parsed body, for JSON requests.
    pub json: Option<serde_json::Value>,
    /// Raw payload, for binary requests.
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct FakeState {
    exact: HashMap<(Method, String), VecDeque<Result<ApiResponse, TransportError>>>,
    prefixes: Vec<(Method, String, Result<ApiResponse, TransportError>)>,
    recorded: Vec<RecordedRequest>,
}

/// Scripted [`Transport`] double that records every request.
#[derive(Clone, Debug, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    /// Creates an empty fake; unmatched requests fail loudly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for an exact method + path. Queued responses are
    /// consumed in order; the last one keeps being replayed once the queue
    /// is down to a single entry.
    pub fn stub(&self, method: Method, path: &str, response: Result<ApiResponse, TransportError>) {
        let mut state = self.lock();
        state
            .exact
            .entry((method, path.to_owned()))
            .or_default()
            .push_back(response);
    }

    /// Replies with `response` to every request whose path starts with
    /// `prefix` and has no exact stub.
    pub fn stub_prefix(
        &self,
        method: Method,
        prefix: &str,
        response: Result<ApiResponse, TransportError>,
    ) {
        let mut state = self.lock();
        state.prefixes.push((method, prefix.to_owned(), response));
    }

    /// Every request observed so far, in arrival order.
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.lock().recorded.clone()
    }

    /// Paths of the recorded requests that used the given method.
    #[must_use]
    pub fn paths_for(&self, method: Method) -> Vec<String> {
        self.lock()
            .recorded
            .iter()
            .filter(|request| request.method == method)
            .map(|request| request.path.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut state = self.lock();
        state.recorded.push(record(request));

        let key = (request.method, request.path.clone());
        if let Some(queue) = state.exact.get_mut(&key) {
            if queue.len() > 1 {
                if let Some(response) = queue.pop_front() {
                    return response;
                }
            }
            if let Some(response) = queue.front() {
                return response.clone();
            }
        }

        for (method, prefix, response) in &state.prefixes {
            if *method == request.method && request.path.starts_with(prefix.as_str()) {
                return response.clone();
            }
        }

        Err(TransportError::Connection {
            method: request.method,
            path: request.path.clone(),
            message: String::from("no stubbed response"),
        })
    }
}

fn record(request: &ApiRequest) -> RecordedRequest {
    let (content_type, json, bytes) = match &request.body {
        RequestBody::Empty => (None, None, None),
        RequestBody::Json(value) => (None, Some(value.clone()), None),
        RequestBody::Binary {
            content_type,
            bytes,
        } => (Some((*content_type).to_owned()), None, Some(bytes.clone())),
    };
    RecordedRequest {
        method: request.method,
        path: request.path.clone(),
        content_type,
        json,
        bytes,
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: ApiRequest) -> TransportFuture<'_, ApiResponse> {
        let result = self.respond(&request);
        Box::pin(async move { result })
    }
}

/// 200 response wrapping a JSON document.
#[must_use]
pub fn json_response(value: &serde_json::Value) -> ApiResponse {
    ApiResponse {
        status: 200,
        body: serde_json::to_vec(value).unwrap_or_default(),
    }
}

/// 200 response with an empty body (upload and delete acknowledgements).
#[must_use]
pub fn empty_response() -> ApiResponse {
    ApiResponse {
        status: 200,
        body: Vec::new(),
    }
}

/// Session document JSON shaped like the hosting API's responses.
#[must_use]
pub fn site_document(id: &str, state: &str, required: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "state": state,
        "required": required,
    })
}
