//! Content digesting for deploy manifests.
//!
//! Every scanned file is read in full and fingerprinted with SHA-1; the
//! server compares digests literally, so the algorithm is fixed by the wire
//! protocol. Reads fan out concurrently with a bounded width; the first
//! failure propagates immediately and cancels reads still in flight.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use futures::stream::{self, StreamExt};
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::scan::FileEntry;

/// Number of file reads allowed in flight at once.
const READ_CONCURRENCY: usize = 32;

/// Deploy manifest: relative path mapped to the hex SHA-1 of its content.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Manifest {
    digests: BTreeMap<String, String>,
}

impl Manifest {
    /// Looks up the digest recorded for a relative path.
    #[must_use]
    pub fn digest_for(&self, relative: &str) -> Option<&str> {
        self.digests.get(relative).map(String::as_str)
    }

    /// Map view submitted as the negotiation payload.
    #[must_use]
    pub const fn files(&self) -> &BTreeMap<String, String> {
        &self.digests
    }

    /// Number of files in the manifest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Returns `true` when the manifest covers no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

impl FromIterator<(String, String)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            digests: iter.into_iter().collect(),
        }
    }
}

/// Errors raised while digesting files.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Raised when a file's contents cannot be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// File that could not be read.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
}

/// Hex-encoded SHA-1 of `data`.
#[must_use]
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Reads every entry concurrently and builds the deploy manifest, keyed by
/// relative path.
///
/// # Errors
///
/// Returns [`DigestError::Read`] for the first file that cannot be read; no
/// partial manifest is returned, and pending reads are cancelled.
pub async fn digest_files(entries: &[FileEntry]) -> Result<Manifest, DigestError> {
    let mut reads = stream::iter(entries)
        .map(|entry| async move {
            let data =
                tokio::fs::read(&entry.absolute)
                    .await
                    .map_err(|err| DigestError::Read {
                        path: entry.absolute.clone(),
                        message: err.to_string(),
                    })?;
            Ok::<_, DigestError>((entry.relative.clone(), digest_bytes(&data)))
        })
        .buffer_unordered(READ_CONCURRENCY);

    let mut digests = BTreeMap::new();
    while let Some(result) = reads.next().await {
        let (relative, digest) = result?;
        digests.insert(relative, digest);
    }

    Ok(Manifest { digests })
}
