//! Store traits consumed by the engine.
//!
//! The traits are implemented by storage backends (e.g.
//! `swiperank-store-sqlite`). The engine depends on these abstractions, not on
//! any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use uuid::Uuid;

use crate::{
  family::Hierarchy,
  item::Item,
  rating::RatingRecord,
  session::Session,
};

/// Result of a versioned write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
  Written,
  /// The stored version no longer matched; nothing was written.
  Stale,
}

/// Shared error type for a backend implementing several store traits.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Read-only view of the item catalog. Every method sees active items only.
pub trait ItemCatalog: Backend {
  /// Retrieve an item by id. Returns `None` if it is unknown or inactive.
  fn get_item(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Item>, Self::Error>> + Send + '_;

  /// Items whose `parent_tag` equals `family_tag`.
  fn get_children<'a>(
    &'a self,
    family_tag: &'a str,
  ) -> impl Future<Output = Result<Vec<Item>, Self::Error>> + Send + 'a;

  /// Top-level items (no `parent_tag`) dealt from `deck`.
  fn get_deck<'a>(
    &'a self,
    deck: &'a str,
  ) -> impl Future<Output = Result<Vec<Item>, Self::Error>> + Send + 'a;
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// Persistence for sessions and hierarchies.
///
/// Saves are optimistic: `session.version` must equal the stored version,
/// which the store then increments. A mismatch yields
/// [`WriteOutcome::Stale`] and leaves the stored record untouched, so two
/// writers can never silently overwrite each other.
pub trait SessionStore: Backend {
  /// Persist a brand-new session at version 0.
  fn insert_session<'a>(
    &'a self,
    session: &'a Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Load a session, with `version` set from the store.
  fn load_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  fn save_session<'a>(
    &'a self,
    session: &'a Session,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + 'a;

  /// Every completed session, in completion order.
  fn completed_sessions(
    &self,
  ) -> impl Future<Output = Result<Vec<Session>, Self::Error>> + Send + '_;

  fn insert_hierarchy<'a>(
    &'a self,
    hierarchy: &'a Hierarchy,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn load_hierarchy(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Hierarchy>, Self::Error>> + Send + '_;

  /// Versioned like [`SessionStore::save_session`].
  fn save_hierarchy<'a>(
    &'a self,
    hierarchy: &'a Hierarchy,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + 'a;
}

// ─── Ratings ─────────────────────────────────────────────────────────────────

pub trait RatingStore: Backend {
  /// Write all `records` atomically: either every record lands or none do.
  /// Returns the number written.
  fn upsert_many<'a>(
    &'a self,
    records: &'a [RatingRecord],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Ratings ordered best first.
  fn list_ratings(
    &self,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<RatingRecord>, Self::Error>> + Send + '_;

  fn get_rating(
    &self,
    item_id: Uuid,
  ) -> impl Future<Output = Result<Option<RatingRecord>, Self::Error>> + Send + '_;
}
