//! swiperank server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the JSON API over HTTP.
//!
//! # Loading a catalog
//!
//! ```text
//! swiperank --import items.json
//! ```
//!
//! where `items.json` is an array of
//! `{"deck":"films","title":"Alien","family_tag":"alien","is_parent":true,"has_children":true}`.

mod settings;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use swiperank_core::item::NewItem;
use swiperank_engine::{Engine, Error};
use swiperank_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, time::MissedTickBehavior};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "swiperank ranking server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Load items from a JSON array file into the catalog and exit.
  #[arg(long, value_name = "ITEMS_JSON")]
  import: Option<PathBuf>,

  /// Rebuild global ratings once, print the summary and exit.
  #[arg(long, conflicts_with = "import")]
  recompute: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let server_cfg = ServerConfig::load(&cli.config)?;

  let store_path = server_cfg.resolved_store_path();
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(path) = cli.import {
    return import_items(&store, path).await;
  }

  let engine = Engine::new(Arc::new(store), server_cfg.engine_config());

  if cli.recompute {
    let summary = engine
      .recompute_ratings()
      .await
      .context("rating recompute failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    return Ok(());
  }

  if server_cfg.rating_interval_secs > 0 {
    spawn_rating_job(
      engine.clone(),
      Duration::from_secs(server_cfg.rating_interval_secs),
    );
  }

  let app = swiperank_api::api_router(engine).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn import_items(store: &SqliteStore, path: PathBuf) -> anyhow::Result<()> {
  let raw = tokio::fs::read_to_string(&path)
    .await
    .with_context(|| format!("failed to read {path:?}"))?;
  let items: Vec<NewItem> = serde_json::from_str(&raw)
    .with_context(|| format!("failed to parse {path:?}"))?;
  let inserted = store
    .insert_items(items)
    .await
    .context("failed to insert items")?;
  tracing::info!(count = inserted.len(), "imported items");
  Ok(())
}

/// Rebuild ratings every `period`. A tick that finds a rebuild already
/// running is skipped; a failed rebuild is retried on the next tick.
fn spawn_rating_job(engine: Engine<SqliteStore>, period: Duration) {
  tracing::info!(?period, "periodic rating recompute enabled");
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match engine.recompute_ratings().await {
        Ok(_) => {}
        Err(Error::RecomputeInProgress) => {
          tracing::debug!("rating recompute already running; tick skipped");
        }
        Err(e) => tracing::error!(error = %e, "periodic rating recompute failed"),
      }
    }
  });
}
