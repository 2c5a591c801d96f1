//! [`Engine`]: session lifecycle on top of the store traits.

use std::{
  future::Future,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use rand::{RngCore as _, SeedableRng as _, rngs::StdRng};
use serde::{Deserialize, Serialize};
use swiperank_core::{
  Error, Result,
  family::{Hierarchy, HierarchyProgress, HierarchyStatus},
  item::Item,
  session::{
    Direction, HierarchyLink, Input, Phase, Prompt, Session, SessionMode, SessionResults,
    SessionStatistics,
  },
  store::{ItemCatalog, RatingStore, SessionStore, WriteOutcome},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{EngineConfig, hierarchy::Advance};

/// A backend implementing every store trait the engine needs.
pub trait Store: ItemCatalog + SessionStore + RatingStore + 'static {}

impl<T> Store for T where T: ItemCatalog + SessionStore + RatingStore + 'static {}

// ─── Request / response types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StartOptions {
  #[serde(default)]
  pub mode:         SessionMode,
  /// Expand ranked parents into nested family sessions once the root
  /// session completes.
  #[serde(default)]
  pub hierarchical: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStarted {
  pub session_id:   Uuid,
  pub hierarchy_id: Option<Uuid>,
  pub mode:         SessionMode,
  pub deck_size:    usize,
  pub prompt:       Prompt,
}

/// Announces the nested session opened for the next family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildSessionStarted {
  pub session_id:   Uuid,
  pub hierarchy_id: Uuid,
  /// The ranked card whose family is being ranked.
  pub parent_id:    Uuid,
  pub family_tag:   String,
  pub prompt:       Prompt,
}

/// Outcome of a swipe or a vote.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStep {
  pub prompt:                Prompt,
  pub duplicate:             bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub child_session_started: Option<ChildSessionStarted>,
  pub hierarchy_completed:   bool,
}

impl SessionStep {
  fn new(prompt: Prompt, duplicate: bool, advance: Option<Advance>) -> Self {
    let (child_session_started, hierarchy_completed) = match advance {
      Some(advance) => (advance.child, advance.completed),
      None => (None, false),
    };
    Self { prompt, duplicate, child_session_started, hierarchy_completed }
  }
}

/// A session's current state, without its ranking.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
  pub session_id:   Uuid,
  pub mode:         SessionMode,
  pub deck_tag:     String,
  pub phase:        Phase,
  pub prompt:       Prompt,
  pub statistics:   SessionStatistics,
  pub hierarchy:    Option<HierarchyLink>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

/// Final (or so-far) results. For the root of an expanding or completed
/// hierarchy, `personal_ranking` is the flattened cross-family order.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
  #[serde(flatten)]
  pub results:   SessionResults,
  pub hierarchy: Option<HierarchyProgress>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The ranking engine. Cheap to clone; clones share the store, the seed
/// generator and the aggregator lock.
pub struct Engine<S> {
  pub(crate) store:          Arc<S>,
  pub(crate) config:         EngineConfig,
  seeds:                     Arc<Mutex<StdRng>>,
  pub(crate) recompute_lock: Arc<tokio::sync::Mutex<()>>,
}

impl<S> Clone for Engine<S> {
  fn clone(&self) -> Self {
    Self {
      store:          Arc::clone(&self.store),
      config:         self.config.clone(),
      seeds:          Arc::clone(&self.seeds),
      recompute_lock: Arc::clone(&self.recompute_lock),
    }
  }
}

impl<S: Store> Engine<S> {
  pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
    let rng = match config.rng_seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    Self {
      store,
      config,
      seeds: Arc::new(Mutex::new(rng)),
      recompute_lock: Arc::new(tokio::sync::Mutex::new(())),
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Deal a new session over the active top-level cards of `deck_tag`.
  pub async fn start_session(
    &self,
    deck_tag: &str,
    options: StartOptions,
  ) -> Result<SessionStarted> {
    let items = self.call(self.store.get_deck(deck_tag)).await?;
    let now = Utc::now();
    let mut session = Session::start(
      deck_tag,
      options.mode,
      items.iter().map(|i| i.item_id),
      self.next_seed(),
      now,
    )?;

    let hierarchy = options
      .hierarchical
      .then(|| Hierarchy::new(session.session_id, self.next_seed(), now));
    if let Some(hierarchy) = &hierarchy {
      session = session.with_hierarchy(HierarchyLink {
        hierarchy_id: hierarchy.hierarchy_id,
        task_id:      None,
      });
    }

    self.call(self.store.insert_session(&session)).await?;
    if let Some(hierarchy) = &hierarchy {
      self.call(self.store.insert_hierarchy(hierarchy)).await?;
    }

    info!(
      session_id = %session.session_id,
      deck = deck_tag,
      mode = %session.mode,
      deck_size = session.deck.len(),
      hierarchical = options.hierarchical,
      "session started"
    );

    Ok(SessionStarted {
      session_id:   session.session_id,
      hierarchy_id: hierarchy.map(|h| h.hierarchy_id),
      mode:         session.mode,
      deck_size:    session.deck.len(),
      prompt:       session.next(),
    })
  }

  pub async fn swipe(
    &self,
    session_id: Uuid,
    item_id: Uuid,
    direction: Direction,
  ) -> Result<SessionStep> {
    self.apply(session_id, Input::Swipe { item_id, direction }).await
  }

  pub async fn vote(&self, session_id: Uuid, winner: Uuid, loser: Uuid) -> Result<SessionStep> {
    self.apply(session_id, Input::Vote { winner, loser }).await
  }

  /// The prompt the caller should present now.
  pub async fn next(&self, session_id: Uuid) -> Result<Prompt> {
    let session = self.load_session(session_id).await?;
    self.resume_hierarchy(&session).await?;
    Ok(session.next())
  }

  pub async fn session(&self, session_id: Uuid) -> Result<SessionView> {
    let session = self.load_session(session_id).await?;
    self.resume_hierarchy(&session).await?;
    Ok(SessionView {
      session_id:   session.session_id,
      mode:         session.mode,
      deck_tag:     session.deck_tag.clone(),
      phase:        session.phase,
      prompt:       session.next(),
      statistics:   session.statistics(),
      hierarchy:    session.hierarchy,
      created_at:   session.created_at,
      updated_at:   session.updated_at,
      completed_at: session.completed_at,
    })
  }

  pub async fn results(&self, session_id: Uuid) -> Result<SessionReport> {
    let session = self.load_session(session_id).await?;
    self.resume_hierarchy(&session).await?;
    let mut results = session.results();

    let hierarchy = match session.hierarchy {
      Some(link) => {
        let hierarchy = self.load_hierarchy(link.hierarchy_id).await?;
        if link.task_id.is_none() && hierarchy.status != HierarchyStatus::AwaitingRoot {
          results.personal_ranking = hierarchy.flatten();
        }
        Some(hierarchy.progress())
      }
      None => None,
    };

    Ok(SessionReport { results, hierarchy })
  }

  /// Catalog lookup; inactive items are reported as not found.
  pub async fn item(&self, item_id: Uuid) -> Result<Item> {
    self
      .call(self.store.get_item(item_id))
      .await?
      .ok_or(Error::ItemNotFound(item_id))
  }

  /// Apply one input. A session that already completed is first folded into
  /// its hierarchy, so retrying after a failed hierarchy step picks up where
  /// it stopped; a duplicate of the completing input reports the same
  /// outcome as the original.
  async fn apply(&self, session_id: Uuid, input: Input) -> Result<SessionStep> {
    let mut session = self.load_session(session_id).await?;
    let resumed = self.resume_hierarchy(&session).await?;
    let now = Utc::now();
    let step = session.handle_input(input, now, self.config.dedup_window)?;
    if step.duplicate {
      debug!(%session_id, ?input, "duplicate action ignored");
      return Ok(SessionStep::new(step.prompt, true, resumed));
    }

    self.save_session(&mut session).await?;
    match input {
      Input::Swipe { item_id, direction } => {
        debug!(%session_id, %item_id, ?direction, "swipe recorded");
      }
      Input::Vote { winner, loser } => {
        debug!(%session_id, %winner, %loser, "vote recorded");
      }
    }
    if !session.is_completed() {
      return Ok(SessionStep::new(step.prompt, false, None));
    }

    let stats = session.statistics();
    info!(
      %session_id,
      ranked = stats.ranked,
      votes = stats.votes,
      "session completed"
    );
    if self.config.recompute_on_completion {
      self.spawn_recompute();
    }
    let advance = self.resume_hierarchy(&session).await?;
    Ok(SessionStep::new(step.prompt, false, advance))
  }

  // ── Store plumbing ────────────────────────────────────────────────────

  /// Draw a seed for a new session or hierarchy.
  pub(crate) fn next_seed(&self) -> u64 {
    self
      .seeds
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .next_u64()
  }

  /// Await a store call under the configured timeout.
  pub(crate) async fn call<T, E>(&self, fut: impl Future<Output = Result<T, E>>) -> Result<T>
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let timeout = self.config.store_timeout;
    let result = if timeout.is_zero() {
      fut.await
    } else {
      match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
          warn!(?timeout, "store call timed out");
          return Err(Error::StoreTimeout(timeout));
        }
      }
    };
    result.map_err(|e| Error::Store(Box::new(e)))
  }

  pub(crate) async fn load_session(&self, session_id: Uuid) -> Result<Session> {
    self
      .call(self.store.load_session(session_id))
      .await?
      .ok_or(Error::SessionNotFound(session_id))
  }

  pub(crate) async fn save_session(&self, session: &mut Session) -> Result<()> {
    match self.call(self.store.save_session(session)).await? {
      WriteOutcome::Written => {
        session.version += 1;
        Ok(())
      }
      WriteOutcome::Stale => {
        warn!(session_id = %session.session_id, "stale session write rejected");
        Err(Error::ConcurrentModification(session.session_id))
      }
    }
  }

  pub(crate) async fn load_hierarchy(&self, hierarchy_id: Uuid) -> Result<Hierarchy> {
    self
      .call(self.store.load_hierarchy(hierarchy_id))
      .await?
      .ok_or(Error::HierarchyNotFound(hierarchy_id))
  }

  pub(crate) async fn save_hierarchy(&self, hierarchy: &mut Hierarchy) -> Result<()> {
    match self.call(self.store.save_hierarchy(hierarchy)).await? {
      WriteOutcome::Written => {
        hierarchy.version += 1;
        Ok(())
      }
      WriteOutcome::Stale => {
        warn!(hierarchy_id = %hierarchy.hierarchy_id, "stale hierarchy write rejected");
        Err(Error::ConcurrentModification(hierarchy.hierarchy_id))
      }
    }
  }
}
