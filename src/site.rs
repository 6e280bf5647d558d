//! Deploy-session documents and update payloads for the hosting API.
//!
//! A [`Site`] is an immutable snapshot of one deploy session as the server
//! reported it: every refresh produces a new value, nothing is mutated in
//! place. Lifecycle state is server-authoritative and never computed
//! locally.

use std::fmt;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Identifier of a site on the hosting service.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    /// Wraps a raw identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrowed form of the identifier.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for SiteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SiteId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state the server reports for a deploy session.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SiteState {
    /// Waiting for required files to be uploaded.
    Uploading,
    /// All content received; the server is publishing the deploy.
    Processing,
    /// The deploy is live. Terminal.
    Current,
    /// The deploy failed server-side. Terminal.
    Error,
    /// A state this client does not recognise; treated as not yet live.
    #[serde(other)]
    Unknown,
}

impl SiteState {
    /// Returns `true` once the deploy is live.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Current)
    }

    /// Returns `true` for the failed terminal state.
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for SiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Current => "current",
            Self::Error => "error",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One deploy session document as returned by the hosting API.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Site {
    /// Server-assigned site identifier.
    pub id: SiteId,
    /// Current lifecycle state.
    pub state: SiteState,
    /// Hex SHA-1 digests the server still needs uploaded. Empty once the
    /// server holds all content, and absent outside negotiation responses.
    #[serde(default)]
    pub required: Vec<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Custom domain routed to the site.
    #[serde(default)]
    pub custom_domain: Option<String>,
    /// Address notified about form submissions.
    #[serde(default)]
    pub notification_email: Option<String>,
    /// Public URL of the live site.
    #[serde(default)]
    pub url: Option<String>,
    /// Dashboard URL for the site on the hosting service.
    #[serde(default)]
    pub admin_url: Option<String>,
}

/// Attribute patch for a site.
///
/// Only these fields can change without a redeploy; anything else requires
/// submitting new content. Unset fields are omitted from the request body,
/// so a patch never clobbers attributes it does not mention.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AttributeUpdate {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New custom domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<String>,
    /// New address for form submission notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_email: Option<String>,
    /// New access password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl AttributeUpdate {
    /// Returns `true` when no field is set and the patch would be a no-op.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.custom_domain.is_none()
            && self.notification_email.is_none()
            && self.password.is_none()
    }
}

/// Explicit, caller-chosen update mode for an existing site.
///
/// The three modes are mutually exclusive by construction; there is no
/// precedence to infer when a caller wants both new content and new
/// attributes — issue two updates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SiteUpdate {
    /// Patch whitelisted attributes in place; no scan or upload happens.
    Attributes(AttributeUpdate),
    /// Re-run the full deploy pipeline from a local directory.
    RedeployFromDirectory(Utf8PathBuf),
    /// Submit a pre-built zip archive as the new deploy.
    RedeployFromArchive(Utf8PathBuf),
}

/// A form discovered in the site's deployed pages.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Form {
    /// Server-assigned form identifier.
    pub id: String,
    /// Form name, when one was declared in the markup.
    #[serde(default)]
    pub name: Option<String>,
    /// Number of submissions received so far.
    #[serde(default)]
    pub submission_count: Option<u64>,
}

/// One submission received by a form on the site.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Submission {
    /// Server-assigned submission identifier.
    pub id: String,
    /// Submitter name field, when present.
    #[serde(default)]
    pub name: Option<String>,
    /// Submitter email field, when present.
    #[serde(default)]
    pub email: Option<String>,
    /// Free-text body of the submission.
    #[serde(default)]
    pub body: Option<String>,
}

/// A file hosted as part of the current deploy.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct SiteFile {
    /// Server-assigned file identifier.
    pub id: String,
    /// Path of the file within the site.
    #[serde(default)]
    pub path: Option<String>,
    /// Hex SHA-1 digest of the file's content.
    #[serde(default)]
    pub sha: Option<String>,
    /// MIME type the file is served with.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
}

/// An HTML snippet the hosting service injects into every page.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Snippet {
    /// Numeric snippet index within the site.
    pub id: u64,
    /// Human-readable title.
    #[serde(default)]
    pub title: Option<String>,
    /// Markup injected into every page.
    #[serde(default)]
    pub general: Option<String>,
    /// Markup injected into goal pages only.
    #[serde(default)]
    pub goal: Option<String>,
}
