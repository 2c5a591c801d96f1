//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings and UUIDs as hyphenated
//! lowercase strings. Sessions and hierarchies are stored as JSON documents;
//! their `version` lives in its own column.

use chrono::{DateTime, Utc};
use swiperank_core::{
  family::Hierarchy,
  item::Item,
  rating::RatingRecord,
  session::Session,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Documents ───────────────────────────────────────────────────────────────

pub fn encode_session(session: &Session) -> Result<String> {
  Ok(serde_json::to_string(session)?)
}

pub fn decode_session(json: &str, version: i64) -> Result<Session> {
  let mut session: Session = serde_json::from_str(json)?;
  session.version = version as u64;
  Ok(session)
}

pub fn encode_hierarchy(hierarchy: &Hierarchy) -> Result<String> {
  Ok(serde_json::to_string(hierarchy)?)
}

pub fn decode_hierarchy(json: &str, version: i64) -> Result<Hierarchy> {
  let mut hierarchy: Hierarchy = serde_json::from_str(json)?;
  hierarchy.version = version as u64;
  Ok(hierarchy)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `items` row.
pub struct RawItem {
  pub item_id:      String,
  pub deck:         String,
  pub title:        String,
  pub payload:      String,
  pub is_parent:    bool,
  pub family_tag:   Option<String>,
  pub parent_tag:   Option<String>,
  pub has_children: bool,
  pub active:       bool,
  pub created_at:   String,
}

pub const ITEM_COLUMNS: &str = "item_id, deck, title, payload, is_parent, \
                                family_tag, parent_tag, has_children, active, created_at";

impl RawItem {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      item_id:      row.get(0)?,
      deck:         row.get(1)?,
      title:        row.get(2)?,
      payload:      row.get(3)?,
      is_parent:    row.get(4)?,
      family_tag:   row.get(5)?,
      parent_tag:   row.get(6)?,
      has_children: row.get(7)?,
      active:       row.get(8)?,
      created_at:   row.get(9)?,
    })
  }

  pub fn into_item(self) -> Result<Item> {
    Ok(Item {
      item_id:      decode_uuid(&self.item_id)?,
      deck:         self.deck,
      title:        self.title,
      payload:      serde_json::from_str(&self.payload)?,
      is_parent:    self.is_parent,
      family_tag:   self.family_tag,
      parent_tag:   self.parent_tag,
      has_children: self.has_children,
      active:       self.active,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `ratings` row.
pub struct RawRating {
  pub item_id:     String,
  pub rating:      i64,
  pub wins:        u32,
  pub losses:      u32,
  pub draws:       u32,
  pub total_games: u32,
  pub likes:       u32,
  pub dislikes:    u32,
  pub confidence:  f64,
  pub updated_at:  String,
}

pub const RATING_COLUMNS: &str = "item_id, rating, wins, losses, draws, \
                                  total_games, likes, dislikes, confidence, updated_at";

impl RawRating {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      item_id:     row.get(0)?,
      rating:      row.get(1)?,
      wins:        row.get(2)?,
      losses:      row.get(3)?,
      draws:       row.get(4)?,
      total_games: row.get(5)?,
      likes:       row.get(6)?,
      dislikes:    row.get(7)?,
      confidence:  row.get(8)?,
      updated_at:  row.get(9)?,
    })
  }

  pub fn into_record(self) -> Result<RatingRecord> {
    Ok(RatingRecord {
      item_id:     decode_uuid(&self.item_id)?,
      rating:      self.rating,
      wins:        self.wins,
      losses:      self.losses,
      draws:       self.draws,
      total_games: self.total_games,
      likes:       self.likes,
      dislikes:    self.dislikes,
      confidence:  self.confidence,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}
