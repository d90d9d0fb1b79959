pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod render;
pub mod repository;
pub mod session;
pub mod stats;
pub mod task;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::session::{
  FileCredentialStore,
  SessionContext
};

#[tracing::instrument(skip_all)]
pub async fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskflow CLI"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli.api_url.as_deref()
  );
  debug!(?cfg, "effective config");

  let credential_path = cfg
    .credential_path()
    .context(
      "failed to resolve credential \
       path"
    )?;
  let store = Arc::new(
    FileCredentialStore::new(
      &credential_path
    )
  );
  let session = SessionContext::load(
    store
  )
  .with_context(|| {
    format!(
      "failed to open credential store \
       at {}",
      credential_path.display()
    )
  })?;

  let client = api::RestClient::new(
    cfg.api_url()?,
    session.clone(),
    &cfg.client_options()
  )
  .context(
    "failed to build HTTP client"
  )?;

  let app = commands::App {
    renderer: render::Renderer::new(
      cfg.color
    ),
    client: Arc::new(client),
    session,
    cfg
  };

  commands::dispatch(&app, cli.command)
    .await?;

  info!("done");
  Ok(())
}
