mod api;
mod app;
mod auth;
mod cache;
mod cli;
mod config;
mod domain;
mod event;
mod logging;
mod notice;
mod sync;
mod ui;

use clap::Parser;
use color_eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = cli::Args::parse();

  let _guard = logging::init()?;
  tracing::info!("Starting sitedash");

  cli::run(args).await
}
