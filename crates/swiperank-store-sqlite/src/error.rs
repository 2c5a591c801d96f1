//! Error type for `swiperank-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// Attempted to save a session that was never inserted.
  #[error("session not found: {0}")]
  SessionNotFound(uuid::Uuid),

  #[error("hierarchy not found: {0}")]
  HierarchyNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
