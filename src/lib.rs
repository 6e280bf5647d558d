//! Core library for the Halyard static-site deploy tool.
//!
//! The crate implements the deploy pipeline against the hosting API: scan a
//! local directory, fingerprint every file with SHA-1, negotiate with the
//! server over which content it already holds, upload only the missing
//! files, and poll the deploy session until it goes live. Pre-built zip
//! archives can be submitted whole instead. The HTTP layer is a trait seam
//! ([`Transport`]) so the pipeline is testable without a network.

pub mod client;
pub mod config;
pub mod config_store;
pub mod deploy;
pub mod digest;
pub mod http;
pub mod scan;
pub mod site;
pub mod test_support;
pub mod transport;

pub use client::{ClientError, SitesClient};
pub use config::{ConfigError, DEFAULT_ENDPOINT, HalyardConfig};
pub use config_store::{ConfigStore, ConfigStoreError, ConfigWriter};
pub use deploy::{DeployError, Deployer};
pub use digest::{DigestError, Manifest, digest_bytes, digest_files};
pub use http::HttpTransport;
pub use scan::{FileEntry, ScanError, scan_directory};
pub use site::{
    AttributeUpdate, Form, Site, SiteFile, SiteId, SiteState, SiteUpdate, Snippet, Submission,
};
pub use transport::{
    ApiRequest, ApiResponse, Method, RequestBody, Transport, TransportError, TransportFuture,
};
