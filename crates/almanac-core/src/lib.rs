pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod my_issues;
pub mod placement;
pub mod range;
pub mod render;
pub mod service;
pub mod session;

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
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
    "starting almanac"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  let overrides = cli
    .rc_overrides
    .into_iter()
    .map(|kv| (kv.key, kv.value))
    .collect::<Vec<_>>();
  debug!(?overrides, "config overrides");
  cfg.apply_overrides(overrides)?;

  let service = Arc::new(
    service::HttpIssueService::new(&cfg)?
  );
  let renderer =
    render::Renderer::new(&cfg);
  let today = datetime::today_in_timezone(
    cfg.timezone()
  );

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  let mut out = io::stdout().lock();
  runtime.block_on(commands::dispatch(
    service,
    &cfg,
    &renderer,
    cli.command,
    today,
    &mut out
  ))?;

  info!("done");
  Ok(())
}
