//! Handlers for per-slot endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/purifiers/{id}/consumables/{slot}/replace` | Body: `{"installed_at"?, "notes"?}` |
//! | `GET`  | `/purifiers/{id}/maintenance` | Replacement history, oldest first |

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::{DateTime, Utc};
use purecare_core::{purifier::MaintenanceRecord, slot::Slot, store::PurifierStore};
use purecare_engine::NotificationChannel;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError, purifiers::ConsumableView};

// ─── Replace ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ReplaceBody {
  /// Defaults to now.
  pub installed_at: Option<DateTime<Utc>>,
  pub notes:        Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplaceResponse {
  pub previous:   ConsumableView,
  pub consumable: ConsumableView,
}

/// `POST /purifiers/{id}/consumables/{slot}/replace`
pub async fn replace<S, C>(
  State(state): State<AppState<S, C>>,
  Path((id, slot)): Path<(Uuid, String)>,
  Json(body): Json<ReplaceBody>,
) -> Result<Json<ReplaceResponse>, ApiError>
where
  S: PurifierStore + 'static,
  C: NotificationChannel + 'static,
{
  let slot: Slot = slot.parse()?;
  let now = state.now();
  let installed_at = body.installed_at.unwrap_or(now);

  let r = state.fleet.replace(id, slot, installed_at, now, body.notes).await?;
  Ok(Json(ReplaceResponse {
    previous:   ConsumableView::new(slot, &r.previous, now),
    consumable: ConsumableView::new(slot, &r.current, now),
  }))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /purifiers/{id}/maintenance`
pub async fn history<S, C>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<MaintenanceRecord>>, ApiError>
where
  S: PurifierStore + 'static,
  C: NotificationChannel + 'static,
{
  Ok(Json(state.fleet.maintenance_history(id).await?))
}
