//! Global ratings: an Elo replay over every completed session.
//!
//! Ratings are never updated incrementally. [`rebuild`] starts every item at
//! [`DEFAULT_RATING`] and replays all recorded bouts in timestamp order, so
//! the result depends only on the raw ledgers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{Direction, Phase, Session};

pub const DEFAULT_RATING: i64 = 1000;
pub const K_FACTOR: f64 = 32.0;

/// Games after which a rating is considered fully settled.
const CONFIDENT_AFTER_GAMES: f64 = 100.0;

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
  pub item_id:     Uuid,
  pub rating:      i64,
  pub wins:        u32,
  pub losses:      u32,
  pub draws:       u32,
  pub total_games: u32,
  /// Explicit right swipes across completed sessions.
  pub likes:       u32,
  /// Left swipes across completed sessions.
  pub dislikes:    u32,
  /// `0.0..=1.0`, growing with the number of games played.
  pub confidence:  f64,
  pub updated_at:  DateTime<Utc>,
}

impl RatingRecord {
  pub fn new(item_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      item_id,
      rating: DEFAULT_RATING,
      wins: 0,
      losses: 0,
      draws: 0,
      total_games: 0,
      likes: 0,
      dislikes: 0,
      confidence: 0.0,
      updated_at: now,
    }
  }
}

/// The result of one pairwise comparison, as fed to the replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoutOutcome {
  Decisive { winner: Uuid, loser: Uuid },
  /// Never produced by sessions, but tolerated.
  Draw { a: Uuid, b: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bout {
  pub outcome:    BoutOutcome,
  pub at:         DateTime<Utc>,
  pub session_id: Uuid,
  /// Position inside the session's ledger; breaks timestamp ties.
  pub index:      usize,
}

// ─── Elo ─────────────────────────────────────────────────────────────────────

/// Probability that a player rated `rating` beats one rated `opponent`.
pub fn expected_score(rating: i64, opponent: i64) -> f64 {
  1.0 / (1.0 + 10f64.powf((opponent - rating) as f64 / 400.0))
}

/// The rounded rating change for a player whose actual score was `actual`.
///
/// Rounding the delta rather than the new rating keeps every update exactly
/// zero-sum: the two players' deltas are negations of each other and
/// `f64::round` is symmetric about zero.
pub fn rating_delta(rating: i64, opponent: i64, actual: f64) -> i64 {
  (K_FACTOR * (actual - expected_score(rating, opponent))).round() as i64
}

// ─── Replay ──────────────────────────────────────────────────────────────────

/// Output of [`rebuild`].
#[derive(Debug, Clone, Default)]
pub struct Rebuild {
  /// One record per item that appeared in any replayed ledger or swipe.
  pub records:  Vec<RatingRecord>,
  pub sessions: usize,
  pub bouts:    usize,
}

/// Every bout recorded by completed sessions, oldest first.
pub fn collect_bouts(sessions: &[Session]) -> Vec<Bout> {
  let mut bouts: Vec<Bout> = sessions
    .iter()
    .filter(|s| s.phase == Phase::Completed)
    .flat_map(|s| {
      s.ledger.iter().enumerate().map(move |(index, c)| Bout {
        outcome: BoutOutcome::Decisive { winner: c.winner, loser: c.loser() },
        at: c.at,
        session_id: s.session_id,
        index,
      })
    })
    .collect();
  bouts.sort_by_key(|b| (b.at, b.session_id, b.index));
  bouts
}

/// Replay `bouts` (already ordered) from a clean slate.
pub fn replay(bouts: &[Bout], now: DateTime<Utc>) -> HashMap<Uuid, RatingRecord> {
  let mut table: HashMap<Uuid, RatingRecord> = HashMap::new();

  for bout in bouts {
    let (a, b, score_a) = match bout.outcome {
      BoutOutcome::Decisive { winner, loser } => (winner, loser, 1.0),
      BoutOutcome::Draw { a, b } => (a, b, 0.5),
    };
    if a == b {
      continue;
    }
    let rating_a = table.entry(a).or_insert_with(|| RatingRecord::new(a, now)).rating;
    let rating_b = table.entry(b).or_insert_with(|| RatingRecord::new(b, now)).rating;
    let delta = rating_delta(rating_a, rating_b, score_a);

    for (id, change, score) in [(a, delta, score_a), (b, -delta, 1.0 - score_a)] {
      if let Some(record) = table.get_mut(&id) {
        record.rating += change;
        record.total_games += 1;
        if score > 0.5 {
          record.wins += 1;
        } else if score < 0.5 {
          record.losses += 1;
        } else {
          record.draws += 1;
        }
      }
    }
  }
  table
}

/// Recompute every rating from the completed `sessions`.
pub fn rebuild(sessions: &[Session], now: DateTime<Utc>) -> Rebuild {
  let bouts = collect_bouts(sessions);
  let mut table = replay(&bouts, now);

  let completed = sessions.iter().filter(|s| s.phase == Phase::Completed);
  let mut session_count = 0;
  for session in completed {
    session_count += 1;
    for swipe in session.swipes.iter().filter(|s| !s.implicit) {
      let record = table
        .entry(swipe.item_id)
        .or_insert_with(|| RatingRecord::new(swipe.item_id, now));
      match swipe.direction {
        Direction::Right => record.likes += 1,
        Direction::Left => record.dislikes += 1,
      }
    }
  }

  let mut records: Vec<RatingRecord> = table
    .into_values()
    .map(|mut r| {
      r.confidence = (r.total_games as f64 / CONFIDENT_AFTER_GAMES).min(1.0);
      r.updated_at = now;
      r
    })
    .collect();
  records.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.item_id.cmp(&b.item_id)));

  Rebuild { records, sessions: session_count, bouts: bouts.len() }
}
