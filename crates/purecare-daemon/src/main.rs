//! `purecared`, the PureCare consumable lifecycle daemon.
//!
//! Reads `purecare.toml` (or the path given with `--config`), opens the SQLite
//! store, and either serves the HTTP API with the sweep scheduler running in
//! the background (`run`) or performs a single maintenance command.
//!
//! ```text
//! purecared run
//! purecared sweep
//! purecared status --owner <uuid>
//! purecared replace <purifier-id> filterRO --notes "annual service"
//! ```

mod settings;

use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use purecare_api::AppState;
use purecare_core::{
  clock::{Clock, SystemClock},
  lifecycle::days_until_due,
  purifier::NewPurifier,
  slot::Slot,
};
use purecare_engine::{
  DeliveryWorker, Dispatcher, Fleet, LogCourier, QueueChannel, Scheduler,
};
use purecare_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::settings::DaemonConfig;

#[derive(Parser)]
#[command(author, version, about = "PureCare consumable lifecycle daemon")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "purecare.toml")]
  config: std::path::PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API and run scheduled sweeps until interrupted.
  Run,
  /// Run one sweep now and print its report as JSON.
  Sweep,
  /// Print every purifier with the status of each consumable.
  Status {
    /// Only show this owner's purifiers.
    #[arg(long)]
    owner: Option<Uuid>,
  },
  /// Record the replacement of one consumable.
  Replace {
    purifier_id: Uuid,
    /// filter1..filter7 or filterRO.
    slot: Slot,
    /// When the new part went in (RFC 3339). Defaults to now.
    #[arg(long)]
    installed_at: Option<DateTime<Utc>>,
    #[arg(long)]
    notes: Option<String>,
  },
  /// Register a purifier with the configured lifespans.
  AddPurifier {
    #[arg(long)]
    owner: Uuid,
    #[arg(long)]
    model: String,
    #[arg(long)]
    serial: String,
    #[arg(long, default_value = "")]
    location: String,
    /// Defaults to now.
    #[arg(long)]
    installed_at: Option<DateTime<Utc>>,
  },
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
  let cfg = DaemonConfig::load(&cli.config)?;

  let store_path = cfg.store_path();
  if let Some(parent) = store_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let fleet = Arc::new(
    Fleet::load(Arc::new(store))
      .await
      .context("failed to load purifiers")?,
  );

  match cli.command {
    Command::Run => serve(cfg, fleet).await,
    Command::Sweep => sweep_once(&cfg, &fleet).await,
    Command::Status { owner } => {
      print_status(&fleet, owner).await;
      Ok(())
    }
    Command::Replace { purifier_id, slot, installed_at, notes } => {
      let now = SystemClock.now();
      let r = fleet
        .replace(purifier_id, slot, installed_at.unwrap_or(now), now, notes)
        .await
        .context("replacement failed")?;
      println!(
        "{} replaced (was {}); next due {}",
        slot.label(),
        r.previous.resolve(now),
        r.current.due_at().format("%Y-%m-%d")
      );
      Ok(())
    }
    Command::AddPurifier { owner, model, serial, location, installed_at } => {
      let input = NewPurifier::new(
        owner,
        model,
        serial,
        location,
        installed_at.unwrap_or_else(|| SystemClock.now()),
        &cfg.lifespans,
      )?;
      let purifier = fleet.add_purifier(input).await?;
      println!("{}", purifier.purifier_id);
      Ok(())
    }
  }
}

/// Spawn a delivery worker draining a fresh queue into the log courier.
fn spawn_delivery(
  cfg: &DaemonConfig,
  shutdown: &CancellationToken,
) -> (Dispatcher<QueueChannel>, JoinHandle<u64>) {
  let (channel, rx) = QueueChannel::bounded(cfg.queue_capacity);
  let worker = tokio::spawn(DeliveryWorker::new(rx, LogCourier).run(shutdown.clone()));
  let dispatcher = Dispatcher::new(channel).with_send_timeout(cfg.send_timeout());
  (dispatcher, worker)
}

async fn serve(cfg: DaemonConfig, fleet: Arc<Fleet<SqliteStore>>) -> anyhow::Result<()> {
  let shutdown = CancellationToken::new();
  let (dispatcher, worker) = spawn_delivery(&cfg, &shutdown);

  let scheduler = Scheduler::new(fleet, dispatcher, Arc::new(SystemClock))
    .with_interval(cfg.sweep_interval());
  let state = AppState::new(scheduler.handle(), cfg.lifespans);
  let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));

  let app = purecare_api::api_router(state).layer(TraceLayer::new_for_http());
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await
    .context("server error")?;

  shutdown.cancel();
  scheduler_task.await.context("scheduler task failed")?;
  let delivered = worker.await.context("delivery worker failed")?;
  tracing::info!(delivered, "shut down");
  Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
  tokio::select! {
    res = tokio::signal::ctrl_c() => {
      if let Err(e) = res {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
      }
    }
    _ = shutdown.cancelled() => {}
  }
  tracing::info!("shutting down");
  shutdown.cancel();
}

async fn sweep_once(cfg: &DaemonConfig, fleet: &Fleet<SqliteStore>) -> anyhow::Result<()> {
  let shutdown = CancellationToken::new();
  let (dispatcher, worker) = spawn_delivery(cfg, &shutdown);

  let report = dispatcher.sweep(fleet, SystemClock.now()).await;
  drop(dispatcher);
  shutdown.cancel();
  worker.await.context("delivery worker failed")?;

  println!("{}", serde_json::to_string_pretty(&report)?);
  Ok(())
}

async fn print_status(fleet: &Fleet<SqliteStore>, owner: Option<Uuid>) {
  let now = SystemClock.now();
  for p in fleet.purifiers(owner).await {
    println!(
      "{}  {} {}  {}",
      p.purifier_id, p.model, p.serial_number, p.location
    );
    for (slot, c) in p.consumables.iter() {
      let days = days_until_due(c.due_at(), now);
      let when = if days >= 0 {
        format!("in {days} days")
      } else {
        format!("{} days ago", -days)
      };
      println!(
        "  {:<12} {:<18} due {} ({when})",
        slot.label(),
        c.resolve(now).as_str(),
        c.due_at().format("%Y-%m-%d"),
      );
    }
  }
}
