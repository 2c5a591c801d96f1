//! JSON REST API for swiperank.
//!
//! Exposes an axum [`Router`] over an [`Engine`] backed by any
//! [`swiperank_engine::Store`]. Auth, TLS, and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", swiperank_api::api_router(engine.clone()))
//! ```

pub mod catalog;
pub mod error;
pub mod ratings;
pub mod sessions;

use axum::{
  Router,
  routing::{get, post},
};
use swiperank_engine::{Engine, Store};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: Store>(engine: Engine<S>) -> Router<()> {
  Router::new()
    // Sessions
    .route("/sessions", post(sessions::create::<S>))
    .route("/sessions/{id}", get(sessions::get_one::<S>))
    .route("/sessions/{id}/swipe", post(sessions::swipe::<S>))
    .route("/sessions/{id}/vote", post(sessions::vote::<S>))
    .route("/sessions/{id}/results", get(sessions::results::<S>))
    // Catalog
    .route("/hierarchies/{id}", get(catalog::hierarchy::<S>))
    .route("/items/{id}", get(catalog::item::<S>))
    // Ratings
    .route("/ratings", get(ratings::list::<S>))
    .route("/ratings/recompute", post(ratings::recompute::<S>))
    .route("/ratings/{item_id}", get(ratings::get_one::<S>))
    .with_state(engine)
}

// ─── Router tests ─────────────────────────────────────────────────────────────
