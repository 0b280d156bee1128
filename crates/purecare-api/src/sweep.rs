//! `POST /sweep`: run a sweep now. 409 if one is already running.

use axum::{Json, extract::State};
use purecare_core::store::PurifierStore;
use purecare_engine::{NotificationChannel, SweepOutcome, SweepReport};

use crate::{AppState, error::ApiError};

pub async fn handler<S, C>(
  State(state): State<AppState<S, C>>,
) -> Result<Json<SweepReport>, ApiError>
where
  S: PurifierStore + 'static,
  C: NotificationChannel + 'static,
{
  match state.scheduler.sweep_now().await {
    SweepOutcome::Completed(report) => Ok(Json(report)),
    SweepOutcome::Skipped => Err(ApiError::Conflict("a sweep is already in progress".into())),
  }
}
