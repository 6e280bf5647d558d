//! Typed client for the `/sites` resource family.
//!
//! Thin wrappers mapping each wire operation onto the transport seam. No
//! diffing or orchestration logic lives here; the deploy pipeline drives
//! these calls from [`crate::deploy`].

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::digest::Manifest;
use crate::site::{AttributeUpdate, Form, Site, SiteFile, SiteId, Snippet, Submission};
use crate::transport::{ApiRequest, Method, Transport, TransportError};

const ZIP_CONTENT_TYPE: &str = "application/zip";
const OCTET_STREAM_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors raised by the typed API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Raised when the transport fails or the server rejects a request.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Raised when a request payload cannot be encoded as JSON.
    #[error("failed to encode request payload: {0}")]
    Encode(String),
    /// Raised when a response body cannot be decoded.
    #[error("failed to decode response for {path}: {message}")]
    Decode {
        /// Path of the request whose response was malformed.
        path: String,
        /// Decoder error string.
        message: String,
    },
}

/// JSON payload negotiating a deploy: the full digest manifest.
#[derive(Serialize)]
struct DeployPayload<'a> {
    files: &'a BTreeMap<String, String>,
}

/// Typed client over a [`Transport`].
#[derive(Clone, Debug)]
pub struct SitesClient<T> {
    transport: T,
}

impl<T: Transport> SitesClient<T> {
    /// Creates a client over the given transport.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    async fn request_json<D: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<D, ClientError> {
        let path = request.path.clone();
        let response = self.transport.send(request).await?;
        serde_json::from_slice(&response.body).map_err(|err| ClientError::Decode {
            path,
            message: err.to_string(),
        })
    }

    async fn request_ignoring_response(&self, request: ApiRequest) -> Result<(), ClientError> {
        self.transport.send(request).await?;
        Ok(())
    }

    fn manifest_body(manifest: &Manifest) -> Result<serde_json::Value, ClientError> {
        serde_json::to_value(DeployPayload {
            files: manifest.files(),
        })
        .map_err(|err| ClientError::Encode(err.to_string()))
    }

    /// Creates a new site by submitting a digest manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the session
    /// document cannot be decoded.
    pub async fn create_deploy(&self, manifest: &Manifest) -> Result<Site, ClientError> {
        let body = Self::manifest_body(manifest)?;
        self.request_json(ApiRequest::new(Method::Post, String::from("/sites")).with_json(body))
            .await
    }

    /// Starts a new deploy of an existing site from a digest manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the session
    /// document cannot be decoded.
    pub async fn update_deploy(&self, id: &SiteId, manifest: &Manifest) -> Result<Site, ClientError> {
        let body = Self::manifest_body(manifest)?;
        self.request_json(
            ApiRequest::new(Method::Put, format!("/sites/{id}")).with_json(body),
        )
        .await
    }

    /// Creates a new site from a pre-built zip archive; the server unpacks
    /// and publishes it without per-file negotiation.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the session
    /// document cannot be decoded.
    pub async fn create_archive_deploy(&self, archive: Vec<u8>) -> Result<Site, ClientError> {
        self.request_json(
            ApiRequest::new(Method::Post, String::from("/sites"))
                .with_binary(ZIP_CONTENT_TYPE, archive),
        )
        .await
    }

    /// Starts a new deploy of an existing site from a zip archive.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the session
    /// document cannot be decoded.
    pub async fn update_archive_deploy(
        &self,
        id: &SiteId,
        archive: Vec<u8>,
    ) -> Result<Site, ClientError> {
        self.request_json(
            ApiRequest::new(Method::Put, format!("/sites/{id}"))
                .with_binary(ZIP_CONTENT_TYPE, archive),
        )
        .await
    }

    /// Uploads the raw bytes of one file to its per-path endpoint. The
    /// response body is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the transfer fails.
    pub async fn upload_file(
        &self,
        id: &SiteId,
        relative: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ClientError> {
        self.request_ignoring_response(
            ApiRequest::new(Method::Put, format!("/sites/{id}/files/{relative}"))
                .with_binary(OCTET_STREAM_CONTENT_TYPE, bytes),
        )
        .await
    }

    /// Fetches a fresh session document for the site.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the session
    /// document cannot be decoded.
    pub async fn fetch_site(&self, id: &SiteId) -> Result<Site, ClientError> {
        self.request_json(ApiRequest::new(Method::Get, format!("/sites/{id}")))
            .await
    }

    /// Patches whitelisted attributes and returns the updated session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the session
    /// document cannot be decoded.
    pub async fn update_attributes(
        &self,
        id: &SiteId,
        update: &AttributeUpdate,
    ) -> Result<Site, ClientError> {
        let body = serde_json::to_value(update).map_err(|err| ClientError::Encode(err.to_string()))?;
        self.request_json(ApiRequest::new(Method::Put, format!("/sites/{id}")).with_json(body))
            .await
    }

    /// Deletes the site server-side. The response body is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails.
    pub async fn delete_site(&self, id: &SiteId) -> Result<(), ClientError> {
        self.request_ignoring_response(ApiRequest::new(Method::Delete, format!("/sites/{id}")))
            .await
    }

    /// Lists the forms discovered on the site.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the documents
    /// cannot be decoded.
    pub async fn forms(&self, id: &SiteId) -> Result<Vec<Form>, ClientError> {
        self.request_json(ApiRequest::new(Method::Get, format!("/sites/{id}/forms")))
            .await
    }

    /// Lists the submissions received by the site's forms.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the documents
    /// cannot be decoded.
    pub async fn submissions(&self, id: &SiteId) -> Result<Vec<Submission>, ClientError> {
        self.request_json(ApiRequest::new(Method::Get, format!("/sites/{id}/submissions")))
            .await
    }

    /// Lists the files of the current deploy.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the documents
    /// cannot be decoded.
    pub async fn files(&self, id: &SiteId) -> Result<Vec<SiteFile>, ClientError> {
        self.request_json(ApiRequest::new(Method::Get, format!("/sites/{id}/files")))
            .await
    }

    /// Fetches one hosted file's metadata by its path within the site.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the document
    /// cannot be decoded.
    pub async fn file(&self, id: &SiteId, path: &str) -> Result<SiteFile, ClientError> {
        self.request_json(ApiRequest::new(Method::Get, format!("/sites/{id}/files/{path}")))
            .await
    }

    /// Lists the snippets injected into the site's pages.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the documents
    /// cannot be decoded.
    pub async fn snippets(&self, id: &SiteId) -> Result<Vec<Snippet>, ClientError> {
        self.request_json(ApiRequest::new(Method::Get, format!("/sites/{id}/snippets")))
            .await
    }

    /// Fetches one snippet by its numeric index.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or the document
    /// cannot be decoded.
    pub async fn snippet(&self, id: &SiteId, snippet_id: u64) -> Result<Snippet, ClientError> {
        self.request_json(ApiRequest::new(
            Method::Get,
            format!("/sites/{id}/snippets/{snippet_id}"),
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeTransport, json_response, site_document};

    fn manifest_of(pairs: &[(&str, &str)]) -> Manifest {
        pairs
            .iter()
            .map(|(rel, sha)| ((*rel).to_owned(), (*sha).to_owned()))
            .collect()
    }

    #[tokio::test]
    async fn create_deploy_posts_manifest_and_parses_session() {
        let transport = FakeTransport::new();
        transport.stub(
            Method::Post,
            "/sites",
            Ok(json_response(&site_document("site-1", "uploading", &["aa"]))),
        );
        let client = SitesClient::new(transport.clone());

        let manifest = manifest_of(&[("index.html", "aa"), ("css/site.css", "bb")]);
        let site = client
            .create_deploy(&manifest)
            .await
            .unwrap_or_else(|err| panic!("create should succeed: {err}"));

        assert_eq!(site.id.as_str(), "site-1");
        assert_eq!(site.required, vec!["aa"]);

        let recorded = transport.recorded();
        assert_eq!(recorded.len(), 1);
        let first = recorded.first().unwrap_or_else(|| panic!("one request"));
        assert_eq!(
            first.json,
            Some(serde_json::json!({
                "files": {"index.html": "aa", "css/site.css": "bb"}
            }))
        );
    }

    #[tokio::test]
    async fn update_attributes_sends_only_set_fields() {
        let transport = FakeTransport::new();
        transport.stub(
            Method::Put,
            "/sites/site-1",
            Ok(json_response(&site_document("site-1", "current", &[]))),
        );
        let client = SitesClient::new(transport.clone());

        let update = AttributeUpdate {
            name: Some(String::from("foo")),
            ..AttributeUpdate::default()
        };
        client
            .update_attributes(&SiteId::from("site-1"), &update)
            .await
            .unwrap_or_else(|err| panic!("update should succeed: {err}"));

        let recorded = transport.recorded();
        let first = recorded.first().unwrap_or_else(|| panic!("one request"));
        assert_eq!(first.json, Some(serde_json::json!({"name": "foo"})));
    }

    #[tokio::test]
    async fn delete_site_ignores_the_response_body() {
        let transport = FakeTransport::new();
        transport.stub(
            Method::Delete,
            "/sites/site-1",
            Ok(crate::test_support::empty_response()),
        );
        let client = SitesClient::new(transport);

        let result = client.delete_site(&SiteId::from("site-1")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn malformed_session_document_is_a_decode_error() {
        let transport = FakeTransport::new();
        transport.stub(
            Method::Get,
            "/sites/site-1",
            Ok(crate::test_support::empty_response()),
        );
        let client = SitesClient::new(transport);

        let result = client.fetch_site(&SiteId::from("site-1")).await;
        assert!(matches!(result, Err(ClientError::Decode { .. })));
    }
}
