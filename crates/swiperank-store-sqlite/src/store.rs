//! [`SqliteStore`]: the SQLite implementation of the swiperank store traits.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use swiperank_core::{
  family::Hierarchy,
  item::{Item, NewItem},
  rating::RatingRecord,
  session::{Phase, Session},
  store::{Backend, ItemCatalog, RatingStore, SessionStore, WriteOutcome},
};

use crate::{
  encode::{
    decode_hierarchy, decode_session, encode_dt, encode_hierarchy, encode_session,
    encode_uuid, RawItem, RawRating, ITEM_COLUMNS, RATING_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A swiperank store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Add one item to the catalog.
  pub async fn insert_item(&self, input: NewItem) -> Result<Item> {
    let mut items = self.insert_items(vec![input]).await?;
    Ok(items.remove(0))
  }

  /// Add several items in one transaction.
  pub async fn insert_items(&self, inputs: Vec<NewItem>) -> Result<Vec<Item>> {
    let now = Utc::now();
    let items: Vec<Item> = inputs
      .into_iter()
      .map(|input| Item {
        item_id:      input.item_id.unwrap_or_else(Uuid::new_v4),
        deck:         input.deck,
        title:        input.title,
        payload:      input.payload,
        is_parent:    input.is_parent,
        family_tag:   input.family_tag,
        parent_tag:   input.parent_tag,
        has_children: input.has_children,
        active:       true,
        created_at:   now,
      })
      .collect();

    let rows = items
      .iter()
      .map(|item| -> Result<_> {
        Ok((
          encode_uuid(item.item_id),
          item.deck.clone(),
          item.title.clone(),
          serde_json::to_string(&item.payload)?,
          item.is_parent,
          item.family_tag.clone(),
          item.parent_tag.clone(),
          item.has_children,
          encode_dt(item.created_at),
        ))
      })
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO items
               (item_id, deck, title, payload, is_parent, family_tag,
                parent_tag, has_children, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7, row.8
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(items)
  }

  /// Activate or retire an item. Returns `false` if the id is unknown.
  pub async fn set_item_active(&self, id: Uuid, active: bool) -> Result<bool> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE items SET active = ?1 WHERE item_id = ?2",
          rusqlite::params![active, id_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn query_items(&self, sql: String, param: String) -> Result<Vec<Item>> {
    let raws: Vec<RawItem> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![param], RawItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawItem::into_item).collect()
  }

  async fn session_exists(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM sessions WHERE session_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn hierarchy_exists(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM hierarchies WHERE hierarchy_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }
}

impl Backend for SqliteStore {
  type Error = Error;
}

// ─── ItemCatalog impl ────────────────────────────────────────────────────────

impl ItemCatalog for SqliteStore {
  async fn get_item(&self, id: Uuid) -> Result<Option<Item>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE item_id = ?1 AND active = 1");
    let id_str = encode_uuid(id);
    let raw: Option<RawItem> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawItem::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawItem::into_item).transpose()
  }

  async fn get_children(&self, family_tag: &str) -> Result<Vec<Item>> {
    let sql = format!(
      "SELECT {ITEM_COLUMNS} FROM items
       WHERE parent_tag = ?1 AND active = 1
       ORDER BY created_at, item_id"
    );
    self.query_items(sql, family_tag.to_owned()).await
  }

  async fn get_deck(&self, deck: &str) -> Result<Vec<Item>> {
    let sql = format!(
      "SELECT {ITEM_COLUMNS} FROM items
       WHERE deck = ?1 AND parent_tag IS NULL AND active = 1
       ORDER BY created_at, item_id"
    );
    self.query_items(sql, deck.to_owned()).await
  }
}

// ─── SessionStore impl ───────────────────────────────────────────────────────

impl SessionStore for SqliteStore {
  async fn insert_session(&self, session: &Session) -> Result<()> {
    let id_str        = encode_uuid(session.session_id);
    let deck_tag      = session.deck_tag.clone();
    let mode          = session.mode.as_ref().to_owned();
    let phase         = session.phase.as_ref().to_owned();
    let state_json    = encode_session(session)?;
    let created_str   = encode_dt(session.created_at);
    let updated_str   = encode_dt(session.updated_at);
    let completed_str = session.completed_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions
             (session_id, deck_tag, mode, phase, state_json, version,
              created_at, updated_at, completed_at)
           VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            deck_tag,
            mode,
            phase,
            state_json,
            created_str,
            updated_str,
            completed_str
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn load_session(&self, id: Uuid) -> Result<Option<Session>> {
    let id_str = encode_uuid(id);
    let row: Option<(String, i64)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT state_json, version FROM sessions WHERE session_id = ?1",
              rusqlite::params![id_str],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;
    row
      .map(|(json, version)| decode_session(&json, version))
      .transpose()
  }

  async fn save_session(&self, session: &Session) -> Result<WriteOutcome> {
    let session_id    = session.session_id;
    let id_str        = encode_uuid(session_id);
    let phase         = session.phase.as_ref().to_owned();
    let state_json    = encode_session(session)?;
    let updated_str   = encode_dt(session.updated_at);
    let completed_str = session.completed_at.map(encode_dt);
    let version       = session.version as i64;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE sessions
           SET phase = ?1, state_json = ?2, version = version + 1,
               updated_at = ?3, completed_at = ?4
           WHERE session_id = ?5 AND version = ?6",
          rusqlite::params![phase, state_json, updated_str, completed_str, id_str, version],
        )?)
      })
      .await?;

    if changed > 0 {
      return Ok(WriteOutcome::Written);
    }
    if self.session_exists(session_id).await? {
      Ok(WriteOutcome::Stale)
    } else {
      Err(Error::SessionNotFound(session_id))
    }
  }

  async fn completed_sessions(&self) -> Result<Vec<Session>> {
    let phase = Phase::Completed.as_ref().to_owned();
    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT state_json, version FROM sessions
           WHERE phase = ?1
           ORDER BY completed_at, session_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![phase], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    rows
      .iter()
      .map(|(json, version)| decode_session(json, *version))
      .collect()
  }

  async fn insert_hierarchy(&self, hierarchy: &Hierarchy) -> Result<()> {
    let id_str        = encode_uuid(hierarchy.hierarchy_id);
    let root_str      = encode_uuid(hierarchy.root_session_id);
    let status        = hierarchy.status.as_ref().to_owned();
    let state_json    = encode_hierarchy(hierarchy)?;
    let created_str   = encode_dt(hierarchy.created_at);
    let completed_str = hierarchy.completed_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO hierarchies
             (hierarchy_id, root_session_id, status, state_json, version,
              created_at, completed_at)
           VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
          rusqlite::params![id_str, root_str, status, state_json, created_str, completed_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn load_hierarchy(&self, id: Uuid) -> Result<Option<Hierarchy>> {
    let id_str = encode_uuid(id);
    let row: Option<(String, i64)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT state_json, version FROM hierarchies WHERE hierarchy_id = ?1",
              rusqlite::params![id_str],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;
    row
      .map(|(json, version)| decode_hierarchy(&json, version))
      .transpose()
  }

  async fn save_hierarchy(&self, hierarchy: &Hierarchy) -> Result<WriteOutcome> {
    let hierarchy_id  = hierarchy.hierarchy_id;
    let id_str        = encode_uuid(hierarchy_id);
    let status        = hierarchy.status.as_ref().to_owned();
    let state_json    = encode_hierarchy(hierarchy)?;
    let completed_str = hierarchy.completed_at.map(encode_dt);
    let version       = hierarchy.version as i64;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE hierarchies
           SET status = ?1, state_json = ?2, version = version + 1, completed_at = ?3
           WHERE hierarchy_id = ?4 AND version = ?5",
          rusqlite::params![status, state_json, completed_str, id_str, version],
        )?)
      })
      .await?;

    if changed > 0 {
      return Ok(WriteOutcome::Written);
    }
    if self.hierarchy_exists(hierarchy_id).await? {
      Ok(WriteOutcome::Stale)
    } else {
      Err(Error::HierarchyNotFound(hierarchy_id))
    }
  }
}

// ─── RatingStore impl ────────────────────────────────────────────────────────

impl RatingStore for SqliteStore {
  async fn upsert_many(&self, records: &[RatingRecord]) -> Result<usize> {
    let rows: Vec<_> = records
      .iter()
      .map(|r| {
        (
          encode_uuid(r.item_id),
          r.rating,
          r.wins,
          r.losses,
          r.draws,
          r.total_games,
          r.likes,
          r.dislikes,
          r.confidence,
          encode_dt(r.updated_at),
        )
      })
      .collect();

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO ratings
               (item_id, rating, wins, losses, draws, total_games,
                likes, dislikes, confidence, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(item_id) DO UPDATE SET
               rating      = excluded.rating,
               wins        = excluded.wins,
               losses      = excluded.losses,
               draws       = excluded.draws,
               total_games = excluded.total_games,
               likes       = excluded.likes,
               dislikes    = excluded.dislikes,
               confidence  = excluded.confidence,
               updated_at  = excluded.updated_at",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7, row.8, row.9
            ])?;
          }
        }
        tx.commit()?;
        Ok(rows.len())
      })
      .await?;
    Ok(written)
  }

  async fn list_ratings(&self, limit: Option<usize>) -> Result<Vec<RatingRecord>> {
    // SQLite treats a negative LIMIT as "no limit".
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let sql = format!(
      "SELECT {RATING_COLUMNS} FROM ratings
       ORDER BY rating DESC, item_id
       LIMIT ?1"
    );
    let raws: Vec<RawRating> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![limit], RawRating::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawRating::into_record).collect()
  }

  async fn get_rating(&self, item_id: Uuid) -> Result<Option<RatingRecord>> {
    let sql = format!("SELECT {RATING_COLUMNS} FROM ratings WHERE item_id = ?1");
    let id_str = encode_uuid(item_id);
    let raw: Option<RawRating> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawRating::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawRating::into_record).transpose()
  }
}
