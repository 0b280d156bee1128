//! Handlers for `/purifiers` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/purifiers` | Optional `?owner_id=<uuid>` |
//! | `POST` | `/purifiers` | Body: [`CreateBody`]; 201 |
//! | `GET`  | `/purifiers/{id}` | Per-slot status resolved at request time; 404 if not found |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use purecare_core::{
  catalog::LifespanCatalog,
  consumable::Consumable,
  lifecycle::{ConsumableStatus, days_until_due},
  lifespan::Lifespan,
  purifier::{NewPurifier, Purifier},
  slot::Slot,
  store::PurifierStore,
};
use purecare_engine::NotificationChannel;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Views ────────────────────────────────────────────────────────────────────

/// One slot as seen at `now`.
#[derive(Debug, Serialize)]
pub struct ConsumableView {
  pub slot:         Slot,
  pub label:        &'static str,
  #[serde(rename = "type")]
  pub kind:         String,
  pub lifespan:     Lifespan,
  pub installed_at: DateTime<Utc>,
  pub due_at:       DateTime<Utc>,
  pub status:       ConsumableStatus,
  /// Whole days until due; negative once overdue.
  pub due_in_days:  i64,
}

impl ConsumableView {
  pub fn new(slot: Slot, c: &Consumable, now: DateTime<Utc>) -> Self {
    Self {
      slot,
      label: slot.label(),
      kind: c.kind().to_owned(),
      lifespan: c.lifespan(),
      installed_at: c.installed_at(),
      due_at: c.due_at(),
      status: c.resolve(now),
      due_in_days: days_until_due(c.due_at(), now),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct PurifierView {
  pub purifier_id:   Uuid,
  pub owner_id:      Uuid,
  pub model:         String,
  pub serial_number: String,
  pub location:      String,
  pub installed_at:  DateTime<Utc>,
  pub consumables:   Vec<ConsumableView>,
}

impl PurifierView {
  pub fn new(p: Purifier, now: DateTime<Utc>) -> Self {
    let consumables = p
      .consumables
      .iter()
      .map(|(slot, c)| ConsumableView::new(slot, c, now))
      .collect();
    Self {
      purifier_id: p.purifier_id,
      owner_id: p.owner_id,
      model: p.model,
      serial_number: p.serial_number,
      location: p.location,
      installed_at: p.installed_at,
      consumables,
    }
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub owner_id: Option<Uuid>,
}

/// `GET /purifiers[?owner_id=<uuid>]`
pub async fn list<S, C>(
  State(state): State<AppState<S, C>>,
  Query(params): Query<ListParams>,
) -> Json<Vec<PurifierView>>
where
  S: PurifierStore + 'static,
  C: NotificationChannel + 'static,
{
  let now = state.now();
  let purifiers = state.fleet.purifiers(params.owner_id).await;
  Json(purifiers.into_iter().map(|p| PurifierView::new(p, now)).collect())
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub owner_id:      Uuid,
  pub model:         String,
  pub serial_number: String,
  #[serde(default)]
  pub location:      String,
  /// Defaults to now.
  pub installed_at:  Option<DateTime<Utc>>,
  /// Per-slot overrides of the configured lifespans.
  pub lifespans:     Option<LifespanCatalog>,
}

/// `POST /purifiers`
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PurifierStore + 'static,
  C: NotificationChannel + 'static,
{
  let now = state.now();
  let installed_at = body.installed_at.unwrap_or(now);
  if installed_at > now {
    return Err(purecare_core::Error::FutureInstallDate { installed_at, now }.into());
  }

  let catalog = body.lifespans.unwrap_or(*state.catalog);
  let input = NewPurifier::new(
    body.owner_id,
    body.model,
    body.serial_number,
    body.location,
    installed_at,
    &catalog,
  )?;
  let purifier = state.fleet.add_purifier(input).await?;
  Ok((StatusCode::CREATED, Json(PurifierView::new(purifier, now))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /purifiers/{id}`
pub async fn get_one<S, C>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<Uuid>,
) -> Result<Json<PurifierView>, ApiError>
where
  S: PurifierStore + 'static,
  C: NotificationChannel + 'static,
{
  let purifier = state.fleet.purifier(id).await?;
  Ok(Json(PurifierView::new(purifier, state.now())))
}
