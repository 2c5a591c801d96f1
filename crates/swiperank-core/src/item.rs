//! Items ("cards") as seen by the engine.
//!
//! The catalog owns items; the engine only reads identity and hierarchy
//! metadata. The display payload is opaque JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rankable card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
  pub item_id:      Uuid,
  /// The deck a top-level card is dealt from.
  pub deck:         String,
  pub title:        String,
  /// Presentation data; never interpreted by the engine.
  pub payload:      serde_json::Value,
  pub is_parent:    bool,
  /// The tag carried as `parent_tag` by this item's children.
  pub family_tag:   Option<String>,
  /// The family this item belongs to, or `None` for top-level items.
  pub parent_tag:   Option<String>,
  pub has_children: bool,
  pub active:       bool,
  pub created_at:   DateTime<Utc>,
}

impl Item {
  /// The family tag to expand, if this item heads a family.
  pub fn family(&self) -> Option<&str> {
    if self.is_parent && self.has_children {
      self.family_tag.as_deref()
    } else {
      None
    }
  }
}

/// Input for adding an item to a catalog. `created_at` is set by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
  /// Caller-supplied identifier; generated when absent.
  pub item_id:      Option<Uuid>,
  pub deck:         String,
  pub title:        String,
  #[serde(default)]
  pub payload:      serde_json::Value,
  #[serde(default)]
  pub is_parent:    bool,
  pub family_tag:   Option<String>,
  pub parent_tag:   Option<String>,
  #[serde(default)]
  pub has_children: bool,
}

impl NewItem {
  /// A top-level card with no family.
  pub fn new(deck: impl Into<String>, title: impl Into<String>) -> Self {
    Self {
      item_id:      None,
      deck:         deck.into(),
      title:        title.into(),
      payload:      serde_json::Value::Null,
      is_parent:    false,
      family_tag:   None,
      parent_tag:   None,
      has_children: false,
    }
  }

  /// Mark this card as the head of `family_tag`.
  pub fn heading(mut self, family_tag: impl Into<String>) -> Self {
    self.is_parent = true;
    self.has_children = true;
    self.family_tag = Some(family_tag.into());
    self
  }

  /// Place this card inside the family `parent_tag`.
  pub fn within(mut self, parent_tag: impl Into<String>) -> Self {
    self.parent_tag = Some(parent_tag.into());
    self
  }
}
