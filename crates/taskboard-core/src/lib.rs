pub mod agenda;
pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod document;
pub mod draft;
pub mod error;
pub mod filter;
pub mod render;
pub mod slot;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::io::Write;

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
  let pre =
    cli::preprocess_args(&raw_args);
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
    "starting board CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.taskrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let slot = slot::FileSlot::open(
    &data_dir,
    &cfg.slot_name()
  )
  .with_context(|| {
    format!(
      "failed to open storage slot in \
       {}",
      data_dir.display()
    )
  })?;
  let mut store =
    store::TaskStore::open(slot);

  let command = match cli.command {
    | Some(command) => command,
    | None => {
      commands::default_command(&cfg)?
    }
  };

  let renderer =
    render::Renderer::new(&cfg);
  let stdout = std::io::stdout();
  let mut out = stdout.lock();

  commands::dispatch(
    &mut store, &cfg, &renderer,
    command, &mut out
  )?;
  out.flush()?;

  info!("done");
  Ok(())
}
