pub mod calendar;
pub mod cli;
pub mod click;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod drag;
pub mod render;
pub mod schedule;
pub mod session;
pub mod sim;
pub mod store;
pub mod suggest;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

/// Everything a host needs to drive one board.
#[derive(Debug)]
pub struct Board {
  pub cli:      cli::GlobalCli,
  pub settings: config::Settings,
  pub session:  session::Session,
  pub renderer: render::Renderer
}

/// Parses arguments, sets up logging and config, and starts a session.
#[tracing::instrument(skip_all)]
pub fn bootstrap(
  raw_args: Vec<OsString>
) -> anyhow::Result<Board> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting bubbleboard"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.boardrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .iter()
        .map(|kv| {
          (kv.key.clone(), kv.value.clone())
        })
    )
  );

  let settings =
    config::Settings::from_config(&cfg)
      .context(
        "invalid board configuration"
      )?;
  let renderer =
    render::Renderer::new(settings.color);

  let mut session =
    session::Session::new(
      &settings,
      cli.today,
      cli.seed
    );
  session.start();

  Ok(Board {
    cli,
    settings,
    session,
    renderer
  })
}
