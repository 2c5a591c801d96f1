//! Engine tests against an in-memory SQLite store.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use swiperank_core::{
  family::{Hierarchy, HierarchyStatus, TaskStatus},
  item::{Item, NewItem},
  rating::RatingRecord,
  session::{Direction, Phase, Prompt, Session, SessionMode},
  store::{Backend, ItemCatalog, RatingStore, SessionStore, WriteOutcome},
};
use swiperank_store_sqlite::{Error as StoreError, SqliteStore};
use uuid::Uuid;

use crate::{Engine, EngineConfig, Error, SessionStep, StartOptions, Store};

async fn engine_with(config: EngineConfig) -> Engine<SqliteStore> {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  Engine::new(Arc::new(store), config)
}

async fn engine() -> Engine<SqliteStore> {
  engine_with(EngineConfig { rng_seed: Some(42), ..Default::default() }).await
}

async fn add(engine: &Engine<SqliteStore>, items: Vec<NewItem>) -> Vec<Item> {
  engine.store().insert_items(items).await.unwrap()
}

fn hierarchical() -> StartOptions {
  StartOptions { mode: SessionMode::Rank, hierarchical: true }
}

/// Accept every card and answer every vote according to `truth` (best
/// first). Returns the step that completed the session.
async fn drive<S: Store>(engine: &Engine<S>, session_id: Uuid, truth: &[Uuid]) -> SessionStep {
  let rank = |id: Uuid| truth.iter().position(|t| *t == id).unwrap_or(usize::MAX);
  let mut prompt = engine.next(session_id).await.unwrap();
  loop {
    let step = match prompt {
      Prompt::Swipe { item_id } => {
        engine.swipe(session_id, item_id, Direction::Right).await.unwrap()
      }
      Prompt::Vote { challenger, opponent } => {
        let (winner, loser) = if rank(challenger) < rank(opponent) {
          (challenger, opponent)
        } else {
          (opponent, challenger)
        };
        engine.vote(session_id, winner, loser).await.unwrap()
      }
      Prompt::Completed => panic!("session {session_id} is already completed"),
    };
    if step.prompt == Prompt::Completed {
      return step;
    }
    prompt = step.prompt;
  }
}

/// Swipe every card right and return the first vote pair offered.
async fn swipe_all<S: Store>(engine: &Engine<S>, session_id: Uuid) -> (Uuid, Uuid) {
  let mut prompt = engine.next(session_id).await.unwrap();
  while let Prompt::Swipe { item_id } = prompt {
    prompt = engine.swipe(session_id, item_id, Direction::Right).await.unwrap().prompt;
  }
  match prompt {
    Prompt::Vote { challenger, opponent } => (challenger, opponent),
    other => panic!("expected a vote prompt, got {other:?}"),
  }
}

fn ids(items: &[Item]) -> Vec<Uuid> { items.iter().map(|i| i.item_id).collect() }

// ─── Flat sessions ───────────────────────────────────────────────────────────

#[tokio::test]
async fn flat_session_ranks_by_votes() {
  let e = engine().await;
  let items = add(&e, vec![
    NewItem::new("films", "Alien"),
    NewItem::new("films", "Heat"),
    NewItem::new("films", "Ran"),
    NewItem::new("films", "Tron"),
  ])
  .await;
  let truth = vec![items[2].item_id, items[0].item_id, items[3].item_id, items[1].item_id];

  let started = e.start_session("films", StartOptions::default()).await.unwrap();
  assert_eq!(started.deck_size, 4);
  assert!(started.hierarchy_id.is_none());
  assert!(matches!(started.prompt, Prompt::Swipe { .. }));

  let last = drive(&e, started.session_id, &truth).await;
  assert!(last.child_session_started.is_none());
  assert!(!last.hierarchy_completed);

  let report = e.results(started.session_id).await.unwrap();
  assert_eq!(report.results.phase, Phase::Completed);
  assert_eq!(report.results.personal_ranking, truth);
  assert!(report.hierarchy.is_none());
  assert!(report.results.statistics.votes >= 3);
  assert!(report.results.statistics.votes <= 6);
}

#[tokio::test]
async fn start_requires_two_items() {
  let e = engine().await;
  add(&e, vec![NewItem::new("films", "Alien")]).await;

  let result = e.start_session("films", StartOptions::default()).await;
  assert!(matches!(result, Err(Error::InsufficientItems { found: 1 })));

  let result = e.start_session("empty", StartOptions::default()).await;
  assert!(matches!(result, Err(Error::InsufficientItems { found: 0 })));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
  let e = engine().await;
  let id = Uuid::new_v4();
  assert!(matches!(e.next(id).await, Err(Error::SessionNotFound(x)) if x == id));
  assert!(matches!(
    e.swipe(id, Uuid::new_v4(), Direction::Left).await,
    Err(Error::SessionNotFound(_))
  ));
  assert!(matches!(e.results(id).await, Err(Error::SessionNotFound(_))));
}

#[tokio::test]
async fn voting_while_swiping_is_invalid_state() {
  let e = engine().await;
  let items = add(&e, vec![NewItem::new("films", "Alien"), NewItem::new("films", "Heat")]).await;
  let started = e.start_session("films", StartOptions::default()).await.unwrap();

  let result = e.vote(started.session_id, items[0].item_id, items[1].item_id).await;
  assert!(matches!(result, Err(Error::InvalidState(_))));
}

#[tokio::test]
async fn vote_outside_active_pair_is_rejected() {
  let e = engine().await;
  let items = add(&e, vec![
    NewItem::new("films", "Alien"),
    NewItem::new("films", "Heat"),
    NewItem::new("films", "Ran"),
  ])
  .await;
  let started = e.start_session("films", StartOptions::default()).await.unwrap();
  let sid = started.session_id;

  let mut prompt = started.prompt;
  while let Prompt::Swipe { item_id } = prompt {
    prompt = e.swipe(sid, item_id, Direction::Right).await.unwrap().prompt;
  }
  let Prompt::Vote { challenger, opponent } = prompt else {
    panic!("expected a vote prompt, got {prompt:?}");
  };
  let outsider = ids(&items)
    .into_iter()
    .find(|id| *id != challenger && *id != opponent)
    .unwrap();

  let result = e.vote(sid, outsider, opponent).await;
  assert!(matches!(result, Err(Error::InvalidVote { .. })));
  let result = e.vote(sid, challenger, challenger).await;
  assert!(matches!(result, Err(Error::InvalidVote { .. })));
}

#[tokio::test]
async fn duplicate_vote_is_a_no_op() {
  let e = engine().await;
  add(&e, vec![
    NewItem::new("films", "Alien"),
    NewItem::new("films", "Heat"),
    NewItem::new("films", "Ran"),
  ])
  .await;
  let started = e.start_session("films", StartOptions::default()).await.unwrap();
  let sid = started.session_id;

  let mut prompt = started.prompt;
  while let Prompt::Swipe { item_id } = prompt {
    prompt = e.swipe(sid, item_id, Direction::Right).await.unwrap().prompt;
  }
  let Prompt::Vote { challenger, opponent } = prompt else {
    panic!("expected a vote prompt, got {prompt:?}");
  };

  let first = e.vote(sid, challenger, opponent).await.unwrap();
  let second = e.vote(sid, challenger, opponent).await.unwrap();
  assert!(!first.duplicate);
  assert!(second.duplicate);
  assert_eq!(first.prompt, second.prompt);

  let stored = e.store().load_session(sid).await.unwrap().unwrap();
  assert_eq!(stored.ledger.len(), 1);
}

#[tokio::test]
async fn duplicate_swipe_is_a_no_op() {
  let e = engine().await;
  add(&e, vec![
    NewItem::new("films", "Alien"),
    NewItem::new("films", "Heat"),
    NewItem::new("films", "Ran"),
  ])
  .await;
  let started = e.start_session("films", StartOptions::default()).await.unwrap();
  let Prompt::Swipe { item_id } = started.prompt else {
    panic!("expected a swipe prompt");
  };

  let first = e.swipe(started.session_id, item_id, Direction::Left).await.unwrap();
  let second = e.swipe(started.session_id, item_id, Direction::Left).await.unwrap();
  assert!(second.duplicate);
  assert_eq!(first.prompt, second.prompt);

  let view = e.session(started.session_id).await.unwrap();
  assert_eq!(view.statistics.swiped, 1);
  assert_eq!(view.statistics.rejected, 1);
}

#[tokio::test]
async fn racing_writers_surface_concurrent_modification() {
  let e = engine().await;
  add(&e, vec![
    NewItem::new("films", "Alien"),
    NewItem::new("films", "Heat"),
    NewItem::new("films", "Ran"),
  ])
  .await;
  let started = e.start_session("films", StartOptions::default()).await.unwrap();
  let sid = started.session_id;
  let deck = e.store().load_session(sid).await.unwrap().unwrap().deck;

  // Both calls load version 0 before either saves.
  let (a, b) = tokio::join!(
    e.swipe(sid, deck[0], Direction::Left),
    e.swipe(sid, deck[1], Direction::Left),
  );
  let outcomes = [a, b];
  assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
  assert!(
    outcomes
      .iter()
      .any(|r| matches!(r, Err(Error::ConcurrentModification(id)) if *id == sid))
  );

  let view = e.session(sid).await.unwrap();
  assert_eq!(view.statistics.swiped, 1);
}

#[tokio::test]
async fn vote_only_session_never_prompts_swipes() {
  let e = engine().await;
  let items = add(&e, vec![
    NewItem::new("films", "Alien"),
    NewItem::new("films", "Heat"),
    NewItem::new("films", "Ran"),
  ])
  .await;
  let options = StartOptions { mode: SessionMode::VoteOnly, hierarchical: false };
  let started = e.start_session("films", options).await.unwrap();
  assert!(matches!(started.prompt, Prompt::Vote { .. }));

  let truth = ids(&items);
  drive(&e, started.session_id, &truth).await;
  let report = e.results(started.session_id).await.unwrap();
  assert_eq!(report.results.personal_ranking, truth);
}

// ─── Hierarchies ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn hierarchy_flattens_parent_before_children() {
  let e = engine().await;
  let items = add(&e, vec![
    NewItem::new("films", "A").heading("a"),
    NewItem::new("films", "B"),
    NewItem::new("films", "A1").within("a"),
    NewItem::new("films", "A2").within("a"),
  ])
  .await;
  let [a, b, a1, a2] = [0, 1, 2, 3].map(|i| items[i].item_id);

  let started = e.start_session("films", hierarchical()).await.unwrap();
  assert_eq!(started.deck_size, 2);
  let hierarchy_id = started.hierarchy_id.unwrap();

  let root_done = drive(&e, started.session_id, &[a, b]).await;
  let child = root_done.child_session_started.expect("family session");
  assert_eq!(child.parent_id, a);
  assert_eq!(child.family_tag, "a");
  assert_eq!(child.hierarchy_id, hierarchy_id);
  assert!(!root_done.hierarchy_completed);

  // Mid-way, results already show what is known.
  let partial = e.results(started.session_id).await.unwrap();
  assert_eq!(partial.results.personal_ranking, vec![a, b]);

  let child_done = drive(&e, child.session_id, &[a1, a2]).await;
  assert!(child_done.child_session_started.is_none());
  assert!(child_done.hierarchy_completed);

  let report = e.results(started.session_id).await.unwrap();
  assert_eq!(report.results.personal_ranking, vec![a, a1, a2, b]);
  let progress = report.hierarchy.unwrap();
  assert_eq!(progress.status, HierarchyStatus::Completed);
  assert_eq!(progress.completed, 1);

  let child_report = e.results(child.session_id).await.unwrap();
  assert_eq!(child_report.results.personal_ranking, vec![a1, a2]);
}

#[tokio::test]
async fn single_child_family_is_skipped() {
  let e = engine().await;
  let items = add(&e, vec![
    NewItem::new("films", "A").heading("a"),
    NewItem::new("films", "B"),
    NewItem::new("films", "A1").within("a"),
  ])
  .await;
  let [a, b] = [0, 1].map(|i| items[i].item_id);

  let started = e.start_session("films", hierarchical()).await.unwrap();
  let done = drive(&e, started.session_id, &[b, a]).await;
  assert!(done.child_session_started.is_none());
  assert!(done.hierarchy_completed);

  let report = e.results(started.session_id).await.unwrap();
  assert_eq!(report.results.personal_ranking, vec![b, a]);

  let hierarchy = e.hierarchy(started.hierarchy_id.unwrap()).await.unwrap();
  assert_eq!(hierarchy.progress.skipped, 1);
  assert_eq!(hierarchy.tasks[0].status, TaskStatus::Skipped);
}

#[tokio::test]
async fn grandchildren_are_ranked_one_level_deeper() {
  let e = engine().await;
  let items = add(&e, vec![
    NewItem::new("films", "A").heading("a"),
    NewItem::new("films", "B"),
    NewItem::new("films", "A1").within("a").heading("a1"),
    NewItem::new("films", "A2").within("a"),
    NewItem::new("films", "A1x").within("a1"),
    NewItem::new("films", "A1y").within("a1"),
  ])
  .await;
  let [a, b, a1, a2, a1x, a1y] = [0, 1, 2, 3, 4, 5].map(|i| items[i].item_id);

  let started = e.start_session("films", hierarchical()).await.unwrap();
  let step = drive(&e, started.session_id, &[a, b]).await;
  let family_a = step.child_session_started.unwrap();

  let step = drive(&e, family_a.session_id, &[a1, a2]).await;
  let family_a1 = step.child_session_started.unwrap();
  assert_eq!(family_a1.parent_id, a1);

  let step = drive(&e, family_a1.session_id, &[a1x, a1y]).await;
  assert!(step.hierarchy_completed);

  let report = e.hierarchy(started.hierarchy_id.unwrap()).await.unwrap();
  assert_eq!(report.ranking, vec![a, a1, a1x, a1y, a2, b]);
  assert_eq!(report.progress.deepest_level, 2);
}

#[tokio::test]
async fn repeated_final_vote_reports_the_same_family_session() {
  let e = engine().await;
  let items = add(&e, vec![
    NewItem::new("films", "A").heading("a"),
    NewItem::new("films", "B"),
    NewItem::new("films", "A1").within("a"),
    NewItem::new("films", "A2").within("a"),
  ])
  .await;

  let started = e.start_session("films", hierarchical()).await.unwrap();
  let (winner, loser) = swipe_all(&e, started.session_id).await;

  let first = e.vote(started.session_id, winner, loser).await.unwrap();
  let second = e.vote(started.session_id, winner, loser).await.unwrap();
  assert!(!first.duplicate);
  assert!(second.duplicate);
  assert_eq!(second.prompt, Prompt::Completed);

  let child = first.child_session_started.clone().expect("family session");
  assert_eq!(child.parent_id, items[0].item_id);
  assert_eq!(second.child_session_started, first.child_session_started);
  assert_eq!(second.hierarchy_completed, first.hierarchy_completed);

  // The repeat must not open a second family session.
  let report = e.hierarchy(started.hierarchy_id.unwrap()).await.unwrap();
  assert_eq!(report.tasks.len(), 1);
  assert_eq!(report.progress.active_session, Some(child.session_id));
}

#[tokio::test]
async fn unknown_hierarchy_is_not_found() {
  let e = engine().await;
  assert!(matches!(
    e.hierarchy(Uuid::new_v4()).await,
    Err(Error::HierarchyNotFound(_))
  ));
}

// ─── Ratings ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn recompute_replays_completed_sessions() {
  let e = engine().await;
  let items = add(&e, vec![NewItem::new("films", "Alien"), NewItem::new("films", "Heat")]).await;
  let [a, b] = [0, 1].map(|i| items[i].item_id);

  let started = e.start_session("films", StartOptions::default()).await.unwrap();
  drive(&e, started.session_id, &[a, b]).await;

  let summary = e.recompute_ratings().await.unwrap();
  assert_eq!(summary.sessions, 1);
  assert_eq!(summary.bouts, 1);
  assert_eq!(summary.items, 2);

  let ratings = e.ratings(None).await.unwrap();
  assert_eq!(ratings[0].item_id, a);
  assert_eq!(ratings[0].rating, 1016);
  assert_eq!(ratings[1].rating, 984);

  let rb = e.rating(b).await.unwrap();
  assert_eq!(rb.losses, 1);
  assert_eq!(rb.likes, 1);
  assert!(matches!(e.rating(Uuid::new_v4()).await, Err(Error::ItemNotFound(_))));
}

#[tokio::test]
async fn recompute_is_single_flight() {
  let e = engine().await;
  let guard = e.recompute_lock.lock().await;
  assert!(matches!(e.recompute_ratings().await, Err(Error::RecomputeInProgress)));
  drop(guard);
  assert!(e.recompute_ratings().await.is_ok());
}

#[tokio::test]
async fn completion_can_trigger_background_recompute() {
  let e = engine_with(EngineConfig {
    rng_seed: Some(7),
    recompute_on_completion: true,
    ..Default::default()
  })
  .await;
  let items = add(&e, vec![NewItem::new("films", "Alien"), NewItem::new("films", "Heat")]).await;
  let [a, b] = [0, 1].map(|i| items[i].item_id);

  let started = e.start_session("films", StartOptions::default()).await.unwrap();
  drive(&e, started.session_id, &[b, a]).await;

  let mut rating = None;
  for _ in 0..100 {
    if let Ok(r) = e.rating(b).await {
      rating = Some(r);
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert_eq!(rating.expect("background recompute ran").rating, 1016);
}

#[tokio::test]
async fn item_lookup_hides_inactive_items() {
  let e = engine().await;
  let items = add(&e, vec![NewItem::new("films", "Alien")]).await;
  let id = items[0].item_id;

  assert_eq!(e.item(id).await.unwrap().title, "Alien");
  e.store().set_item_active(id, false).await.unwrap();
  assert!(matches!(e.item(id).await, Err(Error::ItemNotFound(_))));
}

// ─── Store failures ──────────────────────────────────────────────────────────

/// SQLite store whose `get_children` fails while `fail_children` is set.
struct FlakyStore {
  inner:         SqliteStore,
  fail_children: AtomicBool,
}

impl Backend for FlakyStore {
  type Error = StoreError;
}

impl ItemCatalog for FlakyStore {
  async fn get_item(&self, id: Uuid) -> Result<Option<Item>, StoreError> {
    self.inner.get_item(id).await
  }

  async fn get_children(&self, family_tag: &str) -> Result<Vec<Item>, StoreError> {
    if self.fail_children.load(Ordering::SeqCst) {
      return Err(StoreError::DateParse("connection reset".into()));
    }
    self.inner.get_children(family_tag).await
  }

  async fn get_deck(&self, deck: &str) -> Result<Vec<Item>, StoreError> {
    self.inner.get_deck(deck).await
  }
}

impl SessionStore for FlakyStore {
  async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
    self.inner.insert_session(session).await
  }

  async fn load_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
    self.inner.load_session(id).await
  }

  async fn save_session(&self, session: &Session) -> Result<WriteOutcome, StoreError> {
    self.inner.save_session(session).await
  }

  async fn completed_sessions(&self) -> Result<Vec<Session>, StoreError> {
    self.inner.completed_sessions().await
  }

  async fn insert_hierarchy(&self, hierarchy: &Hierarchy) -> Result<(), StoreError> {
    self.inner.insert_hierarchy(hierarchy).await
  }

  async fn load_hierarchy(&self, id: Uuid) -> Result<Option<Hierarchy>, StoreError> {
    self.inner.load_hierarchy(id).await
  }

  async fn save_hierarchy(&self, hierarchy: &Hierarchy) -> Result<WriteOutcome, StoreError> {
    self.inner.save_hierarchy(hierarchy).await
  }
}

impl RatingStore for FlakyStore {
  async fn upsert_many(&self, records: &[RatingRecord]) -> Result<usize, StoreError> {
    self.inner.upsert_many(records).await
  }

  async fn list_ratings(&self, limit: Option<usize>) -> Result<Vec<RatingRecord>, StoreError> {
    self.inner.list_ratings(limit).await
  }

  async fn get_rating(&self, item_id: Uuid) -> Result<Option<RatingRecord>, StoreError> {
    self.inner.get_rating(item_id).await
  }
}

/// A family deck `a` (A1, A2) under top-level A, next to a plain B.
async fn flaky_engine(config: EngineConfig) -> (Engine<FlakyStore>, Arc<FlakyStore>, Vec<Item>) {
  let inner = SqliteStore::open_in_memory().await.unwrap();
  let items = inner
    .insert_items(vec![
      NewItem::new("films", "A").heading("a"),
      NewItem::new("films", "B"),
      NewItem::new("films", "A1").within("a"),
      NewItem::new("films", "A2").within("a"),
    ])
    .await
    .unwrap();
  let store = Arc::new(FlakyStore { inner, fail_children: AtomicBool::new(false) });
  (Engine::new(Arc::clone(&store), config), store, items)
}

async fn stored_hierarchy(store: &FlakyStore, id: Uuid) -> Hierarchy {
  store.inner.load_hierarchy(id).await.unwrap().unwrap()
}

#[tokio::test]
async fn retried_final_vote_resumes_a_failed_hierarchy_step() {
  let (e, store, items) =
    flaky_engine(EngineConfig { rng_seed: Some(42), ..Default::default() }).await;
  let started = e.start_session("films", hierarchical()).await.unwrap();
  let hierarchy_id = started.hierarchy_id.unwrap();
  let (winner, loser) = swipe_all(&e, started.session_id).await;

  store.fail_children.store(true, Ordering::SeqCst);
  let failed = e.vote(started.session_id, winner, loser).await;
  assert!(matches!(failed, Err(Error::Store(_))));
  let root = store.inner.load_session(started.session_id).await.unwrap().unwrap();
  assert_eq!(root.phase, Phase::Completed);
  assert_eq!(
    stored_hierarchy(&store, hierarchy_id).await.status,
    HierarchyStatus::AwaitingRoot
  );

  store.fail_children.store(false, Ordering::SeqCst);
  let retry = e.vote(started.session_id, winner, loser).await.unwrap();
  assert!(retry.duplicate);
  assert_eq!(retry.prompt, Prompt::Completed);
  let child = retry.child_session_started.clone().expect("family session");
  assert_eq!(child.parent_id, items[0].item_id);
  assert!(!retry.hierarchy_completed);

  let hierarchy = stored_hierarchy(&store, hierarchy_id).await;
  assert_eq!(hierarchy.status, HierarchyStatus::Expanding);
  assert_eq!(hierarchy.current_session(), Some(child.session_id));

  // Further repeats report the same handoff without advancing again.
  let again = e.vote(started.session_id, winner, loser).await.unwrap();
  assert_eq!(again.child_session_started, retry.child_session_started);
  assert_eq!(stored_hierarchy(&store, hierarchy_id).await.tasks.len(), 1);

  let [a, b, a1, a2] = [0, 1, 2, 3].map(|i| items[i].item_id);
  let done = drive(&e, child.session_id, &[a2, a1]).await;
  assert!(done.hierarchy_completed);
  let ranking = e.results(started.session_id).await.unwrap().results.personal_ranking;
  let expected = if winner == a { vec![a, a2, a1, b] } else { vec![b, a, a2, a1] };
  assert_eq!(ranking, expected);
}

#[tokio::test]
async fn reads_catch_up_a_hierarchy_after_the_dedup_window() {
  let (e, store, _) = flaky_engine(EngineConfig {
    rng_seed: Some(9),
    dedup_window: Duration::ZERO,
    ..Default::default()
  })
  .await;
  let started = e.start_session("films", hierarchical()).await.unwrap();
  let hierarchy_id = started.hierarchy_id.unwrap();
  let (winner, loser) = swipe_all(&e, started.session_id).await;

  store.fail_children.store(true, Ordering::SeqCst);
  assert!(e.vote(started.session_id, winner, loser).await.is_err());
  assert!(matches!(e.hierarchy(hierarchy_id).await, Err(Error::Store(_))));

  store.fail_children.store(false, Ordering::SeqCst);
  let report = e.hierarchy(hierarchy_id).await.unwrap();
  assert_eq!(report.progress.status, HierarchyStatus::Expanding);
  assert_eq!(report.progress.active, 1);
  assert!(report.progress.active_session.is_some());

  // Outside the window the repeat is rejected, but nothing is left behind.
  let late = e.vote(started.session_id, winner, loser).await;
  assert!(matches!(late, Err(Error::InvalidState(_))));
  assert_eq!(stored_hierarchy(&store, hierarchy_id).await.tasks.len(), 1);
}

#[tokio::test]
async fn failed_hierarchy_step_still_triggers_recompute() {
  let (e, store, items) = flaky_engine(EngineConfig {
    rng_seed: Some(3),
    recompute_on_completion: true,
    ..Default::default()
  })
  .await;
  let started = e.start_session("films", hierarchical()).await.unwrap();
  let (winner, loser) = swipe_all(&e, started.session_id).await;

  store.fail_children.store(true, Ordering::SeqCst);
  assert!(e.vote(started.session_id, winner, loser).await.is_err());

  let mut rating = None;
  for _ in 0..100 {
    if let Ok(r) = e.rating(winner).await {
      rating = Some(r);
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert_eq!(rating.expect("background recompute ran").rating, 1016);
  assert!(e.rating(items[2].item_id).await.is_err());
}
