//! Read-only lookups: `/items/{id}` and `/hierarchies/{id}`.

use axum::{
  Json,
  extract::{Path, State},
};
use swiperank_core::item::Item;
use swiperank_engine::{Engine, HierarchyReport, Store};
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /items/{id}`
pub async fn item<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Item>, ApiError> {
  Ok(Json(engine.item(id).await?))
}

/// `GET /hierarchies/{id}`
pub async fn hierarchy<S: Store>(
  State(engine): State<Engine<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<HierarchyReport>, ApiError> {
  Ok(Json(engine.hierarchy(id).await?))
}
