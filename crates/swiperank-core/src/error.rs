//! Error types for `swiperank-core`.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// The action is not allowed in the session's current phase.
  #[error("invalid state: {0}")]
  InvalidState(String),

  /// The declared winner and loser are not the pair currently being compared.
  #[error("invalid vote: {winner} over {loser} is not the active comparison")]
  InvalidVote { winner: Uuid, loser: Uuid },

  #[error("session not found: {0}")]
  SessionNotFound(Uuid),

  #[error("item not found: {0}")]
  ItemNotFound(Uuid),

  #[error("hierarchy not found: {0}")]
  HierarchyNotFound(Uuid),

  #[error("family task not found: {0}")]
  TaskNotFound(u32),

  #[error("not enough items to rank: {found} found, at least 2 required")]
  InsufficientItems { found: usize },

  /// Another writer saved the record between our load and our save.
  #[error("{0} was modified concurrently; retry the request")]
  ConcurrentModification(Uuid),

  #[error("a rating recomputation is already in progress")]
  RecomputeInProgress,

  #[error("store call timed out after {0:?}")]
  StoreTimeout(Duration),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// `true` for the variants that report an unknown identifier.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::SessionNotFound(_)
        | Self::ItemNotFound(_)
        | Self::HierarchyNotFound(_)
        | Self::TaskNotFound(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
