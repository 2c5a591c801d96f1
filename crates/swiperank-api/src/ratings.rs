//! Handlers for `/ratings` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/ratings` | Optional `?limit=N`; best first |
//! | `GET`  | `/ratings/{item_id}` | 404 until the item has been rated |
//! | `POST` | `/ratings/recompute` | 409 while another rebuild runs |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use swiperank_core::rating::RatingRecord;
use swiperank_engine::{Engine, RecomputeSummary, Store};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
}

/// `GET /ratings[?limit=N]`
pub async fn list<S: Store>(
  State(engine): State<Engine<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<RatingRecord>>, ApiError> {
  Ok(Json(engine.ratings(params.limit).await?))
}

/// `GET /ratings/{item_id}`
pub async fn get_one<S: Store>(
  State(engine): State<Engine<S>>,
  Path(item_id): Path<Uuid>,
) -> Result<Json<RatingRecord>, ApiError> {
  Ok(Json(engine.rating(item_id).await?))
}

/// `POST /ratings/recompute`
pub async fn recompute<S: Store>(
  State(engine): State<Engine<S>>,
) -> Result<Json<RecomputeSummary>, ApiError> {
  Ok(Json(engine.recompute_ratings().await?))
}
