//! Handlers for `/sessions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sessions` | Body: `{"deck":"films","mode":"rank","hierarchical":false}` |
//! | `GET`  | `/sessions/{id}` | Phase, current prompt and counts |
//! | `POST` | `/sessions/{id}/swipe` | Body: `{"item_id":"..","direction":"right"}` |
//! | `POST` | `/sessions/{id}/vote` | Body: `{"winner":"..","loser":".."}` |
//! | `GET`  | `/sessions/{id}/results` | Flattened for hierarchical roots |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use swiperank_core::session::{Direction, SessionMode};
use swiperank_engine::{
  Engine, SessionReport, SessionStep, SessionView, StartOptions, Store,
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub deck:         String,
  #[serde(default)]
  pub mode:         SessionMode,
  #[serde(default)]
  pub hierarchical: bool,
}

/// `POST /sessions`
pub async fn create<S: Store>(
  State(engine): State<Engine<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let options = StartOptions { mode: body.mode, hierarchical: body.hierarchical };
  let started = engine.start_session(&body.deck, options).await?;
  Ok((StatusCode::CREATED, Json(started)))
}

// ─── Read ─────────────────────────────────────────────────────────────────────

/// `GET /sessions/{id}`
pub async fn get_one<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
  Ok(Json(engine.session(id).await?))
}

/// `GET /sessions/{id}/results`
pub async fn results<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionReport>, ApiError> {
  Ok(Json(engine.results(id).await?))
}

// ─── Actions ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SwipeBody {
  pub item_id:   Uuid,
  pub direction: Direction,
}

/// `POST /sessions/{id}/swipe`
pub async fn swipe<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<SwipeBody>,
) -> Result<Json<SessionStep>, ApiError> {
  Ok(Json(engine.swipe(id, body.item_id, body.direction).await?))
}

#[derive(Debug, Deserialize)]
pub struct VoteBody {
  pub winner: Uuid,
  pub loser:  Uuid,
}

/// `POST /sessions/{id}/vote`
pub async fn vote<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<VoteBody>,
) -> Result<Json<SessionStep>, ApiError> {
  Ok(Json(engine.vote(id, body.winner, body.loser).await?))
}
