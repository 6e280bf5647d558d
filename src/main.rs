//! Binary entry point for the Halyard CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use halyard::{
    AttributeUpdate, ConfigStore, ConfigWriter, DeployError, Deployer, HalyardConfig,
    HttpTransport, Site, SiteId, SiteUpdate, SitesClient,
};

mod cli;
use cli::{Cli, DeployCommand, DestroyCommand, StatusCommand, UpdateCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("no site id: pass --site or deploy once to link this project")]
    MissingSiteId,
    #[error("nothing to update: pass at least one attribute flag")]
    EmptyUpdate,
    #[error(transparent)]
    Deploy(#[from] DeployError),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config =
        HalyardConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;

    let transport = HttpTransport::new(&config.endpoint, &config.access_token);
    let deployer = Deployer::new(SitesClient::new(transport))
        .with_poll_interval(config.poll_interval())
        .with_poll_timeout(config.poll_timeout());
    let store = ConfigStore::new();

    match cli {
        Cli::Deploy(args) => deploy(&deployer, &store, args).await,
        Cli::Status(args) => status(&deployer, &store, args).await,
        Cli::Update(args) => update(&deployer, &store, args).await,
        Cli::Destroy(args) => destroy(&deployer, &store, args).await,
    }
}

async fn deploy(
    deployer: &Deployer<HttpTransport>,
    store: &ConfigStore,
    args: DeployCommand,
) -> Result<(), CliError> {
    let target = args.site.map(SiteId::from).or_else(|| stored_site_id(store));
    let path = Utf8PathBuf::from(args.path);

    let deployed = if args.archive {
        deployer.deploy_archive(target.as_ref(), &path).await?
    } else {
        deployer.deploy_directory(target.as_ref(), &path).await?
    };

    if target.is_none() {
        link_site(store, &deployed);
    }

    let ready = if args.no_wait {
        deployed
    } else {
        deployer.wait_until_live(&deployed).await?
    };
    print_site(&ready);
    Ok(())
}

async fn status(
    deployer: &Deployer<HttpTransport>,
    store: &ConfigStore,
    args: StatusCommand,
) -> Result<(), CliError> {
    let id = resolve_site_id(args.site, store)?;
    let fetched = deployer
        .client()
        .fetch_site(&id)
        .await
        .map_err(|err| CliError::Api(err.to_string()))?;

    let current = if args.wait {
        deployer.wait_until_live(&fetched).await?
    } else {
        fetched
    };
    print_site(&current);
    Ok(())
}

async fn update(
    deployer: &Deployer<HttpTransport>,
    store: &ConfigStore,
    args: UpdateCommand,
) -> Result<(), CliError> {
    let id = resolve_site_id(args.site.clone(), store)?;
    let attributes = attributes_from(args);
    if attributes.is_empty() {
        return Err(CliError::EmptyUpdate);
    }

    let site = deployer
        .update(&id, SiteUpdate::Attributes(attributes))
        .await?;
    print_site(&site);
    Ok(())
}

async fn destroy(
    deployer: &Deployer<HttpTransport>,
    store: &ConfigStore,
    args: DestroyCommand,
) -> Result<(), CliError> {
    let id = resolve_site_id(args.site, store)?;
    let site = deployer
        .client()
        .fetch_site(&id)
        .await
        .map_err(|err| CliError::Api(err.to_string()))?;
    deployer.destroy(site).await?;

    writeln!(io::stdout(), "site {id} destroyed").ok();
    Ok(())
}

fn attributes_from(args: UpdateCommand) -> AttributeUpdate {
    AttributeUpdate {
        name: args.name,
        custom_domain: args.custom_domain,
        notification_email: args.notification_email,
        password: args.password,
    }
}

fn resolve_site_id(flag: Option<String>, store: &ConfigStore) -> Result<SiteId, CliError> {
    flag.map(SiteId::from)
        .or_else(|| stored_site_id(store))
        .ok_or(CliError::MissingSiteId)
}

fn stored_site_id(store: &ConfigStore) -> Option<SiteId> {
    match store.current_site_id() {
        Ok(found) => found.map(SiteId::from),
        Err(err) => {
            tracing::warn!(%err, "could not read linked site from configuration");
            None
        }
    }
}

fn link_site(store: &ConfigStore, site: &Site) {
    match store.write_site_id(site.id.as_str(), false) {
        Ok(path) => {
            writeln!(io::stdout(), "linked site {} in {path}", site.id).ok();
        }
        Err(err) => {
            tracing::warn!(%err, "could not link site in configuration");
        }
    }
}

fn print_site(site: &Site) {
    write_site(io::stdout(), site);
}

fn write_site(mut target: impl Write, site: &Site) {
    writeln!(target, "site {}: {}", site.id, site.state).ok();
    if let Some(url) = &site.url {
        writeln!(target, "  url: {url}").ok();
    }
    if let Some(domain) = &site.custom_domain {
        writeln!(target, "  domain: {domain}").ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
