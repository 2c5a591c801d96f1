//! Ranking sessions: the swipe/vote phase state machine.
//!
//! A session deals a shuffled deck one card at a time. Left swipes discard;
//! right swipes accept. Every accepted card after the first is positioned in
//! the personal ranking by a run of pairwise votes (see
//! [`insertion`](crate::insertion)). While a vote is pending the session is in
//! [`Phase::Voting`] and refuses swipes.
//!
//! Sessions are plain data. The engine loads one, applies a single
//! [`Input`], and writes it back with an optimistic version check; nothing
//! here performs I/O.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::seq::SliceRandom as _;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  draw::DrawSource,
  family::TaskId,
  insertion::{self, Narrowing},
  ledger::{Comparison, Ledger},
};

// ─── Enumerations ────────────────────────────────────────────────────────────

/// How a session turns input into a ranking. Fixed when the session starts.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionMode {
  /// Swipe to accept, vote to position.
  #[default]
  Rank,
  /// Swipe to accept; accepted cards are ranked in the order they were liked.
  SwipeOnly,
  /// Every card is accepted and positioned by votes; swipes are refused.
  VoteOnly,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
  Swiping,
  Voting,
  Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Left,
  Right,
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeRecord {
  pub item_id:   Uuid,
  pub direction: Direction,
  pub at:        DateTime<Utc>,
  /// Set for cards a vote-only session accepted without asking.
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub implicit:  bool,
}

/// What the caller should present next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prompt {
  Swipe { item_id: Uuid },
  Vote { challenger: Uuid, opponent: Uuid },
  Completed,
}

/// A single mutating action against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Input {
  Swipe { item_id: Uuid, direction: Direction },
  Vote { winner: Uuid, loser: Uuid },
}

/// The last applied input and the prompt it produced; replayed verbatim for
/// a repeated submission inside the dedup window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
  pub input:  Input,
  pub prompt: Prompt,
  pub at:     DateTime<Utc>,
}

/// Result of [`Session::handle_input`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
  pub prompt:    Prompt,
  /// `true` when the input repeated the previous one and nothing changed.
  pub duplicate: bool,
}

/// Ties a session to a hierarchical run. `task_id` is `None` for the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyLink {
  pub hierarchy_id: Uuid,
  pub task_id:      Option<TaskId>,
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  pub session_id:        Uuid,
  pub mode:              SessionMode,
  /// Deck or family tag the cards were dealt from.
  pub deck_tag:          String,
  /// Shuffled card order.
  pub deck:              Vec<Uuid>,
  pub swipes:            Vec<SwipeRecord>,
  /// Accepted cards, best first. Append/splice only.
  pub personal_ranking:  Vec<Uuid>,
  /// Opponents still eligible against the active challenger.
  pub active_set:        Vec<Uuid>,
  pub ledger:            Ledger,
  pub phase:             Phase,
  pub active_challenger: Option<Uuid>,
  pub active_opponent:   Option<Uuid>,
  pub draw:              DrawSource,
  pub last_action:       Option<Receipt>,
  pub hierarchy:         Option<HierarchyLink>,
  /// Store-assigned write counter; not part of the serialised state.
  #[serde(skip)]
  pub version:           u64,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
  pub completed_at:      Option<DateTime<Utc>>,
}

impl Session {
  /// Shuffle `deck` and deal the first prompt.
  ///
  /// Duplicate identifiers in `deck` are dropped. Fails with
  /// [`Error::InsufficientItems`] for fewer than two distinct cards.
  pub fn start(
    deck_tag: impl Into<String>,
    mode: SessionMode,
    deck: impl IntoIterator<Item = Uuid>,
    seed: u64,
    now: DateTime<Utc>,
  ) -> Result<Self> {
    let mut cards: Vec<Uuid> = Vec::new();
    for id in deck {
      if !cards.contains(&id) {
        cards.push(id);
      }
    }
    if cards.len() < 2 {
      return Err(Error::InsufficientItems { found: cards.len() });
    }

    let mut draw = DrawSource::new(seed);
    cards.shuffle(&mut draw.next_rng());

    let mut session = Self {
      session_id: Uuid::new_v4(),
      mode,
      deck_tag: deck_tag.into(),
      deck: cards,
      swipes: Vec::new(),
      personal_ranking: Vec::new(),
      active_set: Vec::new(),
      ledger: Ledger::default(),
      phase: Phase::Swiping,
      active_challenger: None,
      active_opponent: None,
      draw,
      last_action: None,
      hierarchy: None,
      version: 0,
      created_at: now,
      updated_at: now,
      completed_at: None,
    };
    session.advance(now);
    Ok(session)
  }

  pub fn with_hierarchy(mut self, link: HierarchyLink) -> Self {
    self.hierarchy = Some(link);
    self
  }

  pub fn is_completed(&self) -> bool { self.phase == Phase::Completed }

  /// The prompt the caller should present now.
  pub fn next(&self) -> Prompt {
    match (self.phase, self.active_challenger, self.active_opponent) {
      (Phase::Voting, Some(challenger), Some(opponent)) => {
        Prompt::Vote { challenger, opponent }
      }
      (Phase::Swiping, ..) => match self.next_unswiped() {
        Some(item_id) => Prompt::Swipe { item_id },
        None => Prompt::Completed,
      },
      _ => Prompt::Completed,
    }
  }

  /// Apply one input.
  ///
  /// Repeating the last input within `dedup_window` returns the prompt it
  /// produced and leaves the session untouched. A zero window disables
  /// duplicate suppression.
  pub fn handle_input(
    &mut self,
    input: Input,
    now: DateTime<Utc>,
    dedup_window: Duration,
  ) -> Result<Step> {
    if let Some(prompt) = self.replayed(&input, now, dedup_window) {
      return Ok(Step { prompt, duplicate: true });
    }

    match input {
      Input::Swipe { item_id, direction } => {
        self.apply_swipe(item_id, direction, now)?
      }
      Input::Vote { winner, loser } => self.apply_vote(winner, loser, now)?,
    }

    let prompt = self.next();
    self.last_action = Some(Receipt { input, prompt, at: now });
    self.updated_at = now;
    Ok(Step { prompt, duplicate: false })
  }

  /// Swipe without duplicate suppression.
  pub fn swipe(
    &mut self,
    item_id: Uuid,
    direction: Direction,
    now: DateTime<Utc>,
  ) -> Result<Prompt> {
    self
      .handle_input(Input::Swipe { item_id, direction }, now, Duration::ZERO)
      .map(|s| s.prompt)
  }

  /// Vote without duplicate suppression.
  pub fn vote(
    &mut self,
    winner: Uuid,
    loser: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Prompt> {
    self
      .handle_input(Input::Vote { winner, loser }, now, Duration::ZERO)
      .map(|s| s.prompt)
  }

  /// Mark the session completed. A no-op if it already is.
  pub fn complete(&mut self, now: DateTime<Utc>) {
    if self.phase == Phase::Completed {
      return;
    }
    self.phase = Phase::Completed;
    self.active_challenger = None;
    self.active_opponent = None;
    self.active_set.clear();
    self.completed_at = Some(now);
    self.updated_at = now;
  }

  pub fn has_swiped(&self, item_id: Uuid) -> bool {
    self.swipes.iter().any(|s| s.item_id == item_id)
  }

  // ── Transitions ───────────────────────────────────────────────────────

  fn replayed(
    &self,
    input: &Input,
    now: DateTime<Utc>,
    window: Duration,
  ) -> Option<Prompt> {
    if window.is_zero() {
      return None;
    }
    let receipt = self.last_action.as_ref()?;
    let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
    (receipt.input == *input && now.signed_duration_since(receipt.at) <= window)
      .then_some(receipt.prompt)
  }

  fn apply_swipe(
    &mut self,
    item_id: Uuid,
    direction: Direction,
    now: DateTime<Utc>,
  ) -> Result<()> {
    match self.phase {
      Phase::Completed => {
        return Err(Error::InvalidState("session is already completed".into()));
      }
      Phase::Voting => {
        return Err(Error::InvalidState(
          "a vote is pending; swipes are not accepted".into(),
        ));
      }
      Phase::Swiping => {}
    }
    if self.mode == SessionMode::VoteOnly {
      return Err(Error::InvalidState(
        "vote-only sessions do not accept swipes".into(),
      ));
    }
    if !self.deck.contains(&item_id) {
      return Err(Error::ItemNotFound(item_id));
    }
    if self.has_swiped(item_id) {
      return Err(Error::InvalidState(format!("{item_id} was already swiped")));
    }

    self.swipes.push(SwipeRecord {
      item_id,
      direction,
      at: now,
      implicit: false,
    });
    if direction == Direction::Right {
      self.accept(item_id);
    }
    if self.phase == Phase::Swiping {
      self.advance(now);
    }
    Ok(())
  }

  fn apply_vote(
    &mut self,
    winner: Uuid,
    loser: Uuid,
    now: DateTime<Utc>,
  ) -> Result<()> {
    let (Phase::Voting, Some(challenger), Some(opponent)) =
      (self.phase, self.active_challenger, self.active_opponent)
    else {
      return Err(Error::InvalidState("no comparison is pending".into()));
    };

    let pair = [challenger, opponent];
    if winner == loser || !pair.contains(&winner) || !pair.contains(&loser) {
      return Err(Error::InvalidVote { winner, loser });
    }

    let narrowing = insertion::apply(
      &mut self.personal_ranking,
      &mut self.active_set,
      challenger,
      opponent,
      winner == challenger,
    )?;
    self.ledger.record(Comparison { challenger, opponent, winner, at: now });

    match narrowing {
      Narrowing::Pending { .. } => self.draw_opponent(),
      Narrowing::Settled { .. } => {
        self.active_challenger = None;
        self.active_opponent = None;
        self.active_set.clear();
        self.phase = Phase::Swiping;
        self.advance(now);
      }
    }
    Ok(())
  }

  /// Take an accepted card into the ranking, opening an insertion episode
  /// when there is something to compare against.
  fn accept(&mut self, item_id: Uuid) {
    if self.personal_ranking.is_empty() || self.mode == SessionMode::SwipeOnly {
      self.personal_ranking.push(item_id);
      return;
    }
    self.active_set = insertion::open(&self.personal_ranking, item_id);
    self.active_challenger = Some(item_id);
    self.draw_opponent();
  }

  fn draw_opponent(&mut self) {
    let mut rng = self.draw.next_rng();
    self.active_opponent = insertion::pick_opponent(&self.active_set, &mut rng);
    self.phase = Phase::Voting;
  }

  /// Move to the next card, completing the session when the deck is spent.
  /// Vote-only sessions accept cards here without prompting.
  fn advance(&mut self, now: DateTime<Utc>) {
    while let Some(next) = self.next_unswiped() {
      if self.mode != SessionMode::VoteOnly {
        self.phase = Phase::Swiping;
        return;
      }
      self.swipes.push(SwipeRecord {
        item_id:   next,
        direction: Direction::Right,
        at:        now,
        implicit:  true,
      });
      self.accept(next);
      if self.phase == Phase::Voting {
        return;
      }
    }
    self.complete(now);
  }

  fn next_unswiped(&self) -> Option<Uuid> {
    self.deck.iter().copied().find(|id| !self.has_swiped(*id))
  }

  // ── Reporting ─────────────────────────────────────────────────────────

  pub fn statistics(&self) -> SessionStatistics {
    let accepted = self
      .swipes
      .iter()
      .filter(|s| s.direction == Direction::Right)
      .count();
    let rejected = self.swipes.len() - accepted;
    let votes = self.ledger.len();
    let insertions = self
      .personal_ranking
      .iter()
      .filter(|id| self.ledger.votes_for(**id) > 0)
      .count();
    let most_votes_for_one_item = self
      .personal_ranking
      .iter()
      .map(|id| self.ledger.votes_for(*id))
      .max()
      .unwrap_or(0);
    let until = self.completed_at.unwrap_or(self.updated_at);

    SessionStatistics {
      deck_size: self.deck.len(),
      swiped: self.swipes.len(),
      accepted,
      rejected,
      remaining: self.deck.len() - self.swipes.len(),
      ranked: self.personal_ranking.len(),
      votes,
      votes_per_insertion: if insertions == 0 {
        0.0
      } else {
        votes as f64 / insertions as f64
      },
      most_votes_for_one_item,
      elapsed_secs: until.signed_duration_since(self.created_at).num_seconds(),
    }
  }

  pub fn results(&self) -> SessionResults {
    SessionResults {
      session_id:       self.session_id,
      mode:             self.mode,
      phase:            self.phase,
      personal_ranking: self.personal_ranking.clone(),
      statistics:       self.statistics(),
    }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
  pub deck_size:               usize,
  pub swiped:                  usize,
  pub accepted:                usize,
  pub rejected:                usize,
  /// Cards not yet swiped.
  pub remaining:               usize,
  pub ranked:                  usize,
  pub votes:                   usize,
  /// Mean number of votes per card that needed positioning.
  pub votes_per_insertion:     f64,
  pub most_votes_for_one_item: usize,
  pub elapsed_secs:            i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResults {
  pub session_id:       Uuid,
  pub mode:             SessionMode,
  pub phase:            Phase,
  pub personal_ranking: Vec<Uuid>,
  pub statistics:       SessionStatistics,
}
