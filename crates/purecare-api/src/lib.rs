//! JSON REST API for PureCare.
//!
//! Exposes an axum [`Router`] over a [`Fleet`] and its [`SchedulerHandle`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", purecare_api::api_router(state))
//! ```

pub mod consumables;
pub mod error;
pub mod purifiers;
pub mod sweep;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post},
};
use chrono::{DateTime, Utc};
use purecare_core::{catalog::LifespanCatalog, clock::Clock, store::PurifierStore};
use purecare_engine::{Fleet, NotificationChannel, SchedulerHandle};
use serde_json::{Value, json};

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, C> {
  pub fleet:     Arc<Fleet<S>>,
  pub scheduler: SchedulerHandle<S, C>,
  pub clock:     Arc<dyn Clock>,
  /// Lifespans given to new purifiers unless the request overrides them.
  pub catalog:   Arc<LifespanCatalog>,
}

impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self {
      fleet:     Arc::clone(&self.fleet),
      scheduler: self.scheduler.clone(),
      clock:     Arc::clone(&self.clock),
      catalog:   Arc::clone(&self.catalog),
    }
  }
}

impl<S, C> AppState<S, C>
where
  S: PurifierStore + 'static,
  C: NotificationChannel + 'static,
{
  /// State sharing the scheduler's fleet and clock.
  pub fn new(scheduler: SchedulerHandle<S, C>, catalog: LifespanCatalog) -> Self {
    Self {
      fleet: Arc::clone(scheduler.fleet()),
      clock: Arc::clone(scheduler.clock()),
      scheduler,
      catalog: Arc::new(catalog),
    }
  }
}

impl<S, C> AppState<S, C> {
  pub fn now(&self) -> DateTime<Utc> { self.clock.now() }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, C>(state: AppState<S, C>) -> Router<()>
where
  S: PurifierStore + 'static,
  C: NotificationChannel + 'static,
{
  Router::new()
    .route("/ping", get(ping))
    // Purifiers
    .route("/purifiers", get(purifiers::list::<S, C>).post(purifiers::create::<S, C>))
    .route("/purifiers/{id}", get(purifiers::get_one::<S, C>))
    // Consumables
    .route(
      "/purifiers/{id}/consumables/{slot}/replace",
      post(consumables::replace::<S, C>),
    )
    .route("/purifiers/{id}/maintenance", get(consumables::history::<S, C>))
    // Sweeps
    .route("/sweep", post(sweep::handler::<S, C>))
    .with_state(state)
}

/// `GET /ping`
async fn ping() -> Json<Value> { Json(json!({ "message": "pong" })) }

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use chrono::TimeZone;
  use purecare_core::clock::FixedClock;
  use purecare_engine::{Dispatcher, QueueChannel, Scheduler};
  use purecare_store_sqlite::SqliteStore;
  use tokio::sync::mpsc;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  struct Harness {
    state: AppState<SqliteStore, QueueChannel>,
    clock: Arc<FixedClock>,
    _rx:   mpsc::Receiver<purecare_core::notification::Notification>,
  }

  fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
  }

  async fn harness() -> Harness {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let fleet = Arc::new(Fleet::load(Arc::new(store)).await.unwrap());
    let (channel, rx) = QueueChannel::bounded(64);
    let clock = Arc::new(FixedClock::new(at(2024, 3, 1)));
    let scheduler = Scheduler::new(fleet, Dispatcher::new(channel), clock.clone());
    Harness {
      state: AppState::new(scheduler.handle(), LifespanCatalog::default()),
      clock,
      _rx: rx,
    }
  }

  async fn call(h: &Harness, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        builder = builder.header("content-type", "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = api_router(h.state.clone())
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
  }

  async fn create(h: &Harness, owner_id: Uuid) -> Value {
    let (status, body) = call(
      h,
      "POST",
      "/purifiers",
      Some(json!({
        "owner_id": owner_id,
        "model": "WP-300",
        "serial_number": "SN-001",
        "location": "Kitchen",
        "installed_at": "2024-01-15T00:00:00Z",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
  }

  fn slot<'a>(purifier: &'a Value, name: &str) -> &'a Value {
    purifier["consumables"]
      .as_array()
      .unwrap()
      .iter()
      .find(|c| c["slot"] == name)
      .unwrap()
  }

  // ── Ping ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn ping_returns_pong() {
    let h = harness().await;
    let (status, body) = call(&h, "GET", "/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "pong" }));
  }

  // ── Purifiers ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_then_get_shows_all_slots() {
    let h = harness().await;
    let created = create(&h, Uuid::new_v4()).await;
    let id = created["purifier_id"].as_str().unwrap();

    let (status, body) = call(&h, "GET", &format!("/purifiers/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consumables"].as_array().unwrap().len(), 8);

    let ro = slot(&body, "filterRO");
    assert_eq!(ro["label"], "RO membrane");
    assert_eq!(ro["due_at"], "2026-01-15T00:00:00Z");
    assert_eq!(ro["status"], "active");
    assert_eq!(ro["lifespan"], json!({ "value": 2.0, "unit": "year" }));
  }

  #[tokio::test]
  async fn status_is_resolved_at_request_time() {
    let h = harness().await;
    let created = create(&h, Uuid::new_v4()).await;
    let id = created["purifier_id"].as_str().unwrap();

    h.clock.set(at(2024, 7, 20));
    let (_, body) = call(&h, "GET", &format!("/purifiers/{id}"), None).await;
    let f1 = slot(&body, "filter1");
    assert_eq!(f1["status"], "needs_replacement");
    assert_eq!(f1["due_in_days"], -5);
    assert_eq!(slot(&body, "filterRO")["status"], "active");
  }

  #[tokio::test]
  async fn list_filters_by_owner() {
    let h = harness().await;
    let alice = Uuid::new_v4();
    create(&h, alice).await;
    create(&h, Uuid::new_v4()).await;

    let (_, all) = call(&h, "GET", "/purifiers", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, mine) = call(&h, "GET", &format!("/purifiers?owner_id={alice}"), None).await;
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["owner_id"], alice.to_string());
  }

  #[tokio::test]
  async fn create_rejects_invalid_lifespan_override() {
    let h = harness().await;
    let (status, _) = call(
      &h,
      "POST",
      "/purifiers",
      Some(json!({
        "owner_id": Uuid::new_v4(),
        "model": "WP-300",
        "serial_number": "SN-002",
        "lifespans": { "filter1": { "value": 0, "unit": "month" } },
      })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn get_unknown_purifier_is_404() {
    let h = harness().await;
    let (status, body) = call(&h, "GET", &format!("/purifiers/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
  }

  // ── Replace ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn replace_resets_slot_and_records_history() {
    let h = harness().await;
    let created = create(&h, Uuid::new_v4()).await;
    let id = created["purifier_id"].as_str().unwrap();
    h.clock.set(at(2024, 7, 20));

    let (status, body) = call(
      &h,
      "POST",
      &format!("/purifiers/{id}/consumables/filter1/replace"),
      Some(json!({ "notes": "routine visit" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["previous"]["status"], "needs_replacement");
    assert_eq!(body["consumable"]["status"], "active");
    assert_eq!(body["consumable"]["installed_at"], "2024-07-20T00:00:00Z");
    assert_eq!(body["consumable"]["due_at"], "2025-01-20T00:00:00Z");

    let (status, history) = call(&h, "GET", &format!("/purifiers/{id}/maintenance"), None).await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["slot"], "filter1");
    assert_eq!(history[0]["notes"], "routine visit");
  }

  #[tokio::test]
  async fn replace_with_future_date_is_rejected() {
    let h = harness().await;
    let created = create(&h, Uuid::new_v4()).await;
    let id = created["purifier_id"].as_str().unwrap();
    h.clock.set(at(2025, 5, 1));

    let (status, body) = call(
      &h,
      "POST",
      &format!("/purifiers/{id}/consumables/filter1/replace"),
      Some(json!({ "installed_at": "2025-06-01T00:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("later than now"));

    let (_, history) = call(&h, "GET", &format!("/purifiers/{id}/maintenance"), None).await;
    assert!(history.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn replace_unknown_slot_is_400() {
    let h = harness().await;
    let created = create(&h, Uuid::new_v4()).await;
    let id = created["purifier_id"].as_str().unwrap();

    let (status, _) = call(
      &h,
      "POST",
      &format!("/purifiers/{id}/consumables/filter9/replace"),
      Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Sweep ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn sweep_reports_crossings_once() {
    let h = harness().await;
    create(&h, Uuid::new_v4()).await;
    h.clock.set(at(2026, 1, 15));

    let (status, report) = call(&h, "POST", "/sweep", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["emitted"], 5);
    assert_eq!(report["evaluated"], 8);
    assert_eq!(report["notifications"].as_array().unwrap().len(), 5);

    h.clock.set(at(2026, 1, 16));
    let (_, again) = call(&h, "POST", "/sweep", None).await;
    assert_eq!(again["emitted"], 0);
  }
}
