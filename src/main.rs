mod app;
mod cache;
mod commands;
mod config;
mod db;
mod event;
mod github;
mod query;
mod ui;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::cache::Selection;
use crate::github::cached_client::resources;
use crate::github::types::RepositoryFilter;
use crate::github::CachedDashboardClient;

#[derive(Parser, Debug)]
#[command(name = "ghdash")]
#[command(about = "A terminal dashboard for GitHub repositories, webhooks and AI review comments")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./ghdash.yaml, then $XDG_CONFIG_HOME/ghdash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Repository filter to open (all, starred, active, private, public, archived, forked)
  #[arg(short, long)]
  filter: Option<RepositoryFilter>,

  /// Repositories per page
  #[arg(short, long)]
  limit: Option<u32>,

  /// Backend session token; stored for later runs
  #[arg(long)]
  token: Option<String>,

  /// End the stored session and exit
  #[arg(long)]
  logout: bool,
}

/// Log to a file so tracing output does not garble the terminal UI.
fn init_tracing() -> Result<WorkerGuard> {
  let dir = db::Database::data_dir()?;
  std::fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::never(&dir, "ghdash.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_env("GHDASH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_tracing()?;

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;
  let database = db::Database::open()?;

  // --token wins and is remembered; otherwise env, then the stored session
  if let Some(token) = &args.token {
    database.set_session_token(token)?;
  }
  let token = match args.token.clone() {
    Some(token) => Some(token),
    None => config::Config::get_user_token().or(database.session_token()?),
  };

  let client = CachedDashboardClient::new(&config, token.clone())?;

  if args.logout {
    if token.is_some() {
      if let Err(e) = client.logout().await {
        eprintln!("Backend logout failed ({}); clearing local session anyway.", e);
      }
    }
    database.clear_session()?;
    println!("Logged out.");
    return Ok(());
  }

  if token.is_none() {
    return Err(eyre!(
      "No authentication token found. Set GHDASH_TOKEN or pass --token."
    ));
  }

  let prefs = database.preferences()?;
  let filter = match args.filter {
    Some(filter) => filter,
    None => config
      .repositories
      .default_filter
      .parse()
      .map_err(|e: String| eyre!("Invalid repositories.default_filter: {}", e))?,
  };
  let limit = args
    .limit
    .or(prefs.page_size)
    .unwrap_or(config.repositories.page_size)
    .max(1);
  let selection = Selection::new(resources::REPOSITORIES, filter.as_str(), 1, limit);
  info!(filter = %filter, limit, "starting");

  let mut app = app::App::new(&config, database, client, selection)?;
  if app.run().await? == app::Exit::LoggedOut {
    println!("Logged out.");
  }

  Ok(())
}
