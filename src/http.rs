//! reqwest-backed implementation of the transport seam.

use std::time::Duration;

use reqwest::Client;

use crate::transport::{
    ApiRequest, ApiResponse, Method, RequestBody, Transport, TransportError, TransportFuture,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on how much of an error body is carried into error messages.
const ERROR_DETAIL_LIMIT: usize = 512;

/// HTTPS transport for the hosting API, authenticating with a bearer token.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl HttpTransport {
    /// Creates a transport for `endpoint` (a base URL without a trailing
    /// slash) using `access_token` for bearer authentication.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, access_token: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            access_token: access_token.into(),
        }
    }

    fn request_url(&self, method: Method, path: &str) -> Result<reqwest::Url, TransportError> {
        let raw = format!("{}{path}", self.endpoint);
        reqwest::Url::parse(&raw).map_err(|err| TransportError::Connection {
            method,
            path: path.to_owned(),
            message: err.to_string(),
        })
    }
}

const fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn error_detail(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(ERROR_DETAIL_LIMIT)
        .collect()
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> TransportFuture<'_, ApiResponse> {
        Box::pin(async move {
            let ApiRequest { method, path, body } = request;
            let url = self.request_url(method, &path)?;

            let mut builder = self
                .client
                .request(reqwest_method(method), url)
                .header("Authorization", format!("Bearer {}", self.access_token));
            builder = match body {
                RequestBody::Empty => builder,
                RequestBody::Json(value) => builder.json(&value),
                RequestBody::Binary {
                    content_type,
                    bytes,
                } => builder.header("Content-Type", content_type).body(bytes),
            };

            let response =
                builder
                    .send()
                    .await
                    .map_err(|err| TransportError::Connection {
                        method,
                        path: path.clone(),
                        message: err.to_string(),
                    })?;

            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|err| TransportError::Connection {
                    method,
                    path: path.clone(),
                    message: err.to_string(),
                })?;

            if status.is_success() {
                Ok(ApiResponse {
                    status: status.as_u16(),
                    body: bytes.to_vec(),
                })
            } else {
                Err(TransportError::Status {
                    status: status.as_u16(),
                    method,
                    path,
                    detail: error_detail(&bytes),
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_joins_endpoint_and_path() {
        let transport = HttpTransport::new("https://api.example.test/v1/", "tok");
        let url = transport
            .request_url(Method::Get, "/sites/abc")
            .unwrap_or_else(|err| panic!("url should parse: {err}"));
        assert_eq!(url.as_str(), "https://api.example.test/v1/sites/abc");
    }

    #[test]
    fn request_url_percent_encodes_awkward_path_characters() {
        let transport = HttpTransport::new("https://api.example.test", "tok");
        let url = transport
            .request_url(Method::Put, "/sites/abc/files/img/a b.png")
            .unwrap_or_else(|err| panic!("url should parse: {err}"));
        assert_eq!(
            url.as_str(),
            "https://api.example.test/sites/abc/files/img/a%20b.png"
        );
    }

    #[test]
    fn error_detail_truncates_long_bodies() {
        let body = vec![b'x'; 2048];
        assert_eq!(error_detail(&body).len(), ERROR_DETAIL_LIMIT);
    }
}
