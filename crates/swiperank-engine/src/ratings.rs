//! The global rating aggregator and rating lookups.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use swiperank_core::{
  Error, Result,
  rating::{self, RatingRecord},
  store::{RatingStore, SessionStore},
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::engine::{Engine, Store};

#[derive(Debug, Clone, Serialize)]
pub struct RecomputeSummary {
  /// Completed sessions replayed.
  pub sessions:    usize,
  pub bouts:       usize,
  /// Rating records written.
  pub items:       usize,
  pub elapsed_ms:  u64,
  pub finished_at: DateTime<Utc>,
}

impl<S: Store> Engine<S> {
  /// Rebuild every rating from scratch.
  ///
  /// Only one rebuild runs at a time; a call made while another is in
  /// flight fails with [`Error::RecomputeInProgress`] instead of waiting.
  pub async fn recompute_ratings(&self) -> Result<RecomputeSummary> {
    let Ok(_guard) = self.recompute_lock.try_lock() else {
      debug!("rating recompute already running");
      return Err(Error::RecomputeInProgress);
    };
    let started = Instant::now();

    let sessions = self.call(self.store.completed_sessions()).await?;
    let now = Utc::now();
    let rebuilt = rating::rebuild(&sessions, now);
    let items = self.call(self.store.upsert_many(&rebuilt.records)).await?;

    let summary = RecomputeSummary {
      sessions: rebuilt.sessions,
      bouts: rebuilt.bouts,
      items,
      elapsed_ms: started.elapsed().as_millis() as u64,
      finished_at: now,
    };
    info!(
      sessions = summary.sessions,
      bouts = summary.bouts,
      items = summary.items,
      elapsed_ms = summary.elapsed_ms,
      "ratings recomputed"
    );
    Ok(summary)
  }

  /// Fire-and-forget rebuild; the caller never waits on it.
  pub(crate) fn spawn_recompute(&self) {
    let engine = self.clone();
    tokio::spawn(async move {
      match engine.recompute_ratings().await {
        Ok(_) | Err(Error::RecomputeInProgress) => {}
        Err(e) => error!(error = %e, "background rating recompute failed"),
      }
    });
  }

  /// Ratings, best first.
  pub async fn ratings(&self, limit: Option<usize>) -> Result<Vec<RatingRecord>> {
    self.call(self.store.list_ratings(limit)).await
  }

  pub async fn rating(&self, item_id: Uuid) -> Result<RatingRecord> {
    self
      .call(self.store.get_rating(item_id))
      .await?
      .ok_or(Error::ItemNotFound(item_id))
  }
}
