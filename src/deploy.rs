//! End-to-end deploy pipeline: scan, digest, negotiate, upload, poll.
//!
//! The deployer scans a local directory, fingerprints every file, submits
//! the manifest, uploads exactly the files the server reports as missing,
//! and polls the session until the server publishes it. Archives skip the
//! negotiation and travel whole. Every stage fails fast: the first error
//! aborts the attempt, and in-flight sibling reads or uploads are
//! cancelled by dropping the stream that owns them.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::client::{ClientError, SitesClient};
use crate::digest::{self, DigestError, Manifest};
use crate::scan::{self, FileEntry, ScanError};
use crate::site::{Site, SiteId, SiteState, SiteUpdate};
use crate::transport::Transport;

/// Number of file uploads allowed in flight at once.
const UPLOAD_CONCURRENCY: usize = 16;
/// Initial delay between readiness checks.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Ceiling for the backed-off readiness interval.
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(15);
/// Default overall readiness deadline.
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors surfaced while running a deploy.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Raised when scanning the source directory fails.
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),
    /// Raised when digesting file contents fails.
    #[error("digest failed: {0}")]
    Digest(#[from] DigestError),
    /// Raised when the manifest or archive submission fails.
    #[error("deploy negotiation failed: {source}")]
    Negotiation {
        /// Underlying API failure.
        #[source]
        source: ClientError,
    },
    /// Raised when a batch member cannot be read from disk.
    #[error("failed to read {path}: {message}")]
    ReadSource {
        /// Relative path of the unreadable file.
        path: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when transmitting one file fails.
    #[error("upload of {path} failed: {source}")]
    Upload {
        /// Relative path of the file whose transfer failed.
        path: String,
        /// Underlying API failure.
        #[source]
        source: ClientError,
    },
    /// Raised when re-fetching the session after an upload batch fails.
    #[error("session refresh failed: {source}")]
    Refresh {
        /// Underlying API failure.
        #[source]
        source: ClientError,
    },
    /// Raised when a status fetch fails during the readiness wait.
    #[error("readiness poll failed: {source}")]
    Poll {
        /// Underlying API failure.
        #[source]
        source: ClientError,
    },
    /// Raised when the server reports the deploy as failed.
    #[error("deploy of site {site_id} failed server-side")]
    DeployFailed {
        /// Site whose deploy reached the failed terminal state.
        site_id: SiteId,
    },
    /// Raised when the deploy does not go live before the deadline.
    #[error("timed out after {waited_secs}s waiting for site {site_id} to go live")]
    PollTimeout {
        /// Site that never reported the live state.
        site_id: SiteId,
        /// Seconds spent waiting before giving up.
        waited_secs: u64,
    },
    /// Raised when the archive file cannot be read.
    #[error("failed to read archive {path}: {message}")]
    ReadArchive {
        /// Archive path the caller supplied.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when an attribute patch is rejected.
    #[error("attribute update failed: {source}")]
    Attributes {
        /// Underlying API failure.
        #[source]
        source: ClientError,
    },
    /// Raised when deleting the site fails.
    #[error("site deletion failed: {source}")]
    Destroy {
        /// Underlying API failure.
        #[source]
        source: ClientError,
    },
}

/// Runs the deploy pipeline against the hosting API.
#[derive(Clone, Debug)]
pub struct Deployer<T> {
    client: SitesClient<T>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl<T: Transport> Deployer<T> {
    /// Creates a deployer with the default readiness policy.
    #[must_use]
    pub const fn new(client: SitesClient<T>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Overrides the initial readiness poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the readiness deadline.
    #[must_use]
    pub const fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// The typed API client backing this deployer.
    #[must_use]
    pub const fn client(&self) -> &SitesClient<T> {
        &self.client
    }

    /// Deploys the directory at `dir`, creating a new site when `site_id`
    /// is `None` and redeploying the existing one otherwise. Only files the
    /// server reports as missing are uploaded. Returns the refreshed
    /// session; callers wanting the live state follow up with
    /// [`Deployer::wait_until_live`].
    ///
    /// # Errors
    ///
    /// Returns [`DeployError`] when any stage fails; the attempt is
    /// abandoned at the first error and already-uploaded files are not
    /// rolled back.
    pub async fn deploy_directory(
        &self,
        site_id: Option<&SiteId>,
        dir: &Utf8Path,
    ) -> Result<Site, DeployError> {
        let entries = scan::scan_directory(dir)?;
        let manifest = digest::digest_files(&entries).await?;
        info!(files = entries.len(), "negotiating deploy");

        let site = match site_id {
            Some(id) => self.client.update_deploy(id, &manifest).await,
            None => self.client.create_deploy(&manifest).await,
        }
        .map_err(|source| DeployError::Negotiation { source })?;

        let batch = required_batch(&entries, &manifest, &site);
        info!(site = %site.id, required = batch.len(), of = entries.len(), "uploading");
        self.upload_batch(site, &batch).await
    }

    /// Submits a pre-built zip archive as a whole deploy. No manifest is
    /// negotiated and no per-file uploads happen; the server unpacks the
    /// archive itself.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::ReadArchive`] when the archive cannot be
    /// read, or [`DeployError::Negotiation`] when the submission fails.
    pub async fn deploy_archive(
        &self,
        site_id: Option<&SiteId>,
        archive: &Utf8Path,
    ) -> Result<Site, DeployError> {
        let bytes = tokio::fs::read(archive)
            .await
            .map_err(|err| DeployError::ReadArchive {
                path: archive.to_path_buf(),
                message: err.to_string(),
            })?;
        info!(archive = %archive, bytes = bytes.len(), "submitting archive deploy");

        match site_id {
            Some(id) => self.client.update_archive_deploy(id, bytes).await,
            None => self.client.create_archive_deploy(bytes).await,
        }
        .map_err(|source| DeployError::Negotiation { source })
    }

    /// Applies an explicit update to an existing site: an attribute patch,
    /// or a full redeploy from a directory or archive.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Attributes`] for a rejected patch, or any
    /// pipeline error for the redeploy variants.
    pub async fn update(&self, site_id: &SiteId, update: SiteUpdate) -> Result<Site, DeployError> {
        match update {
            SiteUpdate::Attributes(attributes) => self
                .client
                .update_attributes(site_id, &attributes)
                .await
                .map_err(|source| DeployError::Attributes { source }),
            SiteUpdate::RedeployFromDirectory(dir) => {
                self.deploy_directory(Some(site_id), &dir).await
            }
            SiteUpdate::RedeployFromArchive(path) => self.deploy_archive(Some(site_id), &path).await,
        }
    }

    /// Deletes the site server-side, consuming the session handle so it
    /// cannot be used for further lifecycle operations.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Destroy`] when the deletion fails.
    pub async fn destroy(&self, site: Site) -> Result<(), DeployError> {
        self.client
            .delete_site(&site.id)
            .await
            .map_err(|source| DeployError::Destroy { source })
    }

    /// Polls the session until the server reports it live.
    ///
    /// Completes only on the `current` state. The `error` state and any
    /// fetch failure are fatal and never retried; intermediate states are
    /// re-checked with an interval that doubles up to a ceiling, and the
    /// wait gives up at the configured deadline.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::DeployFailed`] when the server reports the
    /// failed state, [`DeployError::Poll`] when a status fetch fails, or
    /// [`DeployError::PollTimeout`] at the deadline.
    pub async fn wait_until_live(&self, site: &Site) -> Result<Site, DeployError> {
        let started = Instant::now();
        let deadline = started + self.poll_timeout;
        let mut interval = self.poll_interval;
        let mut current = site.clone();

        loop {
            if current.state.is_live() {
                return Ok(current);
            }
            if current.state.is_failed() {
                return Err(DeployError::DeployFailed {
                    site_id: current.id.clone(),
                });
            }
            if Instant::now() > deadline {
                return Err(DeployError::PollTimeout {
                    site_id: current.id.clone(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }

            debug!(site = %current.id, state = %current.state, "deploy not live yet");
            sleep(interval).await;
            interval = (interval * 2).min(MAX_POLL_INTERVAL);
            current = self
                .client
                .fetch_site(&current.id)
                .await
                .map_err(|source| DeployError::Poll { source })?;
        }
    }

    /// Uploads exactly the batch members, then returns a freshly fetched
    /// session. A session not in the `uploading` state is returned
    /// unchanged; an empty batch skips straight to the refresh. The first
    /// read or transfer error aborts the batch, cancelling in-flight
    /// siblings, and is the only error reported.
    async fn upload_batch(&self, site: Site, batch: &[&FileEntry]) -> Result<Site, DeployError> {
        if site.state != SiteState::Uploading {
            return Ok(site);
        }
        if batch.is_empty() {
            return self.refresh(&site.id).await;
        }

        let mut uploads = stream::iter(batch.iter().copied())
            .map(|entry| self.upload_one(&site.id, entry))
            .buffer_unordered(UPLOAD_CONCURRENCY);

        let mut completed = 0_usize;
        while let Some(result) = uploads.next().await {
            let relative = result?;
            completed += 1;
            debug!(file = relative, completed, total = batch.len(), "uploaded");
        }
        drop(uploads);

        self.refresh(&site.id).await
    }

    async fn upload_one<'a>(
        &self,
        site_id: &SiteId,
        entry: &'a FileEntry,
    ) -> Result<&'a str, DeployError> {
        let bytes = tokio::fs::read(&entry.absolute)
            .await
            .map_err(|err| DeployError::ReadSource {
                path: entry.relative.clone(),
                message: err.to_string(),
            })?;
        self.client
            .upload_file(site_id, &entry.relative, bytes)
            .await
            .map_err(|source| DeployError::Upload {
                path: entry.relative.clone(),
                source,
            })?;
        Ok(entry.relative.as_str())
    }

    async fn refresh(&self, id: &SiteId) -> Result<Site, DeployError> {
        self.client
            .fetch_site(id)
            .await
            .map_err(|source| DeployError::Refresh { source })
    }
}

/// Files whose digest is in the session's required set; everything else is
/// already held by the server and never transmitted.
fn required_batch<'a>(
    entries: &'a [FileEntry],
    manifest: &Manifest,
    site: &Site,
) -> Vec<&'a FileEntry> {
    let required: HashSet<&str> = site.required.iter().map(String::as_str).collect();
    entries
        .iter()
        .filter(|entry| {
            manifest
                .digest_for(&entry.relative)
                .is_some_and(|digest| required.contains(digest))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeTransport, json_response, site_document};
    use crate::transport::Method;

    fn entry(relative: &str) -> FileEntry {
        FileEntry {
            relative: relative.to_owned(),
            absolute: Utf8PathBuf::from(format!("/tmp/{relative}")),
        }
    }

    fn site_with(id: &str, state: &str, required: &[&str]) -> Site {
        serde_json::from_value(site_document(id, state, required))
            .unwrap_or_else(|err| panic!("site should deserialise: {err}"))
    }

    #[test]
    fn required_batch_keeps_only_entries_with_required_digests() {
        let entries = vec![entry("a"), entry("b"), entry("c")];
        let manifest: Manifest = [
            (String::from("a"), String::from("sha-a")),
            (String::from("b"), String::from("sha-b")),
            (String::from("c"), String::from("sha-c")),
        ]
        .into_iter()
        .collect();
        let site = site_with("s", "uploading", &["sha-a", "sha-c"]);

        let batch = required_batch(&entries, &manifest, &site);
        let relative: Vec<&str> = batch.iter().map(|e| e.relative.as_str()).collect();
        assert_eq!(relative, vec!["a", "c"]);
    }

    #[test]
    fn required_batch_ignores_digests_outside_the_manifest() {
        let entries = vec![entry("a")];
        let manifest: Manifest = [(String::from("a"), String::from("sha-a"))]
            .into_iter()
            .collect();
        let site = site_with("s", "uploading", &["sha-a", "sha-unrelated"]);

        assert_eq!(required_batch(&entries, &manifest, &site).len(), 1);
    }

    #[tokio::test]
    async fn upload_batch_is_a_no_op_outside_the_uploading_state() {
        let transport = FakeTransport::new();
        let deployer = Deployer::new(SitesClient::new(transport.clone()));
        let site = site_with("s", "processing", &[]);

        let unchanged = deployer
            .upload_batch(site.clone(), &[])
            .await
            .unwrap_or_else(|err| panic!("no-op should succeed: {err}"));

        assert_eq!(unchanged, site);
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_skips_straight_to_the_refresh() {
        let transport = FakeTransport::new();
        transport.stub(
            Method::Get,
            "/sites/s",
            Ok(json_response(&site_document("s", "processing", &[]))),
        );
        let deployer = Deployer::new(SitesClient::new(transport.clone()));
        let site = site_with("s", "uploading", &[]);

        let refreshed = deployer
            .upload_batch(site, &[])
            .await
            .unwrap_or_else(|err| panic!("refresh should succeed: {err}"));

        assert_eq!(refreshed.state, SiteState::Processing);
        assert_eq!(transport.paths_for(Method::Put), Vec::<String>::new());
        assert_eq!(transport.paths_for(Method::Get), vec!["/sites/s"]);
    }

    #[tokio::test]
    async fn wait_until_live_returns_immediately_for_a_live_session() {
        let transport = FakeTransport::new();
        let deployer = Deployer::new(SitesClient::new(transport.clone()));
        let site = site_with("s", "current", &[]);

        let live = deployer
            .wait_until_live(&site)
            .await
            .unwrap_or_else(|err| panic!("live session should resolve: {err}"));

        assert!(live.state.is_live());
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn wait_until_live_fails_fast_on_the_error_state() {
        let transport = FakeTransport::new();
        let deployer = Deployer::new(SitesClient::new(transport));
        let site = site_with("s", "error", &[]);

        let result = deployer.wait_until_live(&site).await;
        assert!(matches!(result, Err(DeployError::DeployFailed { .. })));
    }
}
