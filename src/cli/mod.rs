//! Command-line interface definitions for the `halyard` binary.
//!
//! This module centralises the clap parser structures so both the main
//! binary and the build script can reuse them when generating the manual
//! page.

use clap::Parser;

/// Top-level CLI for the `halyard` binary.
#[derive(Debug, Parser)]
#[command(
    name = "halyard",
    about = "Deploy static sites by uploading only the content the server is missing",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Deploy a directory or archive and wait for it to go live.
    #[command(name = "deploy", about = "Deploy a directory or zip archive")]
    Deploy(DeployCommand),
    /// Show the deploy state of a site.
    #[command(name = "status", about = "Show the deploy state of a site")]
    Status(StatusCommand),
    /// Update site attributes without redeploying content.
    #[command(name = "update", about = "Update site attributes without redeploying")]
    Update(UpdateCommand),
    /// Delete a site from the hosting service.
    #[command(name = "destroy", about = "Delete a site from the hosting service")]
    Destroy(DestroyCommand),
}

/// Arguments for the `halyard deploy` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DeployCommand {
    /// Directory to deploy, or a zip archive when --archive is set.
    #[arg(value_name = "PATH")]
    pub(crate) path: String,
    /// Treat PATH as a pre-built zip archive and submit it whole.
    ///
    /// Archive deploys skip per-file negotiation entirely; the server
    /// unpacks and publishes the archive itself.
    #[arg(long)]
    pub(crate) archive: bool,
    /// Deploy to this site instead of the one linked in configuration.
    #[arg(long, value_name = "ID")]
    pub(crate) site: Option<String>,
    /// Return as soon as the upload finishes instead of waiting for the
    /// deploy to go live.
    #[arg(long)]
    pub(crate) no_wait: bool,
}

/// Arguments for the `halyard status` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct StatusCommand {
    /// Site to inspect instead of the one linked in configuration.
    #[arg(long, value_name = "ID")]
    pub(crate) site: Option<String>,
    /// Keep polling until the deploy goes live or fails.
    #[arg(long)]
    pub(crate) wait: bool,
}

/// Arguments for the `halyard update` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct UpdateCommand {
    /// Site to update instead of the one linked in configuration.
    #[arg(long, value_name = "ID")]
    pub(crate) site: Option<String>,
    /// New display name.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: Option<String>,
    /// New custom domain.
    #[arg(long, value_name = "DOMAIN")]
    pub(crate) custom_domain: Option<String>,
    /// New address for form submission notifications.
    #[arg(long, value_name = "EMAIL")]
    pub(crate) notification_email: Option<String>,
    /// New access password.
    #[arg(long, value_name = "PASSWORD")]
    pub(crate) password: Option<String>,
}

/// Arguments for the `halyard destroy` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DestroyCommand {
    /// Site to delete instead of the one linked in configuration.
    #[arg(long, value_name = "ID")]
    pub(crate) site: Option<String>,
}
