//! mastery-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), validates the
//! module catalogue, opens the SQLite store and serves the JSON API over HTTP.
//!
//! ```
//! cargo run -p mastery-server -- --config config.toml --check
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use mastery_core::{MasteryEngine, module::ModuleGraph};
use mastery_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use settings::{ServerConfig, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "Mastery progression server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Validate the configuration and module graph, then exit.
  #[arg(long)]
  check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = ServerConfig::load(&cli.config).context("failed to read configuration")?;

  let graph = ModuleGraph::new(server_cfg.modules.clone()).context("invalid module catalogue")?;
  if graph.modules().is_empty() {
    tracing::warn!("no modules configured");
  }

  if cli.check {
    println!(
      "configuration ok: {} modules, store at {}",
      graph.modules().len(),
      server_cfg.store_path.display()
    );
    return Ok(());
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let engine = MasteryEngine::new(store, graph).with_rewards(server_cfg.rewards.clone());
  let app = mastery_api::api_router(Arc::new(engine)).layer(TraceLayer::new_for_http());

  let address = server_cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
