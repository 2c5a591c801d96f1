//! The comparison ledger, an append-only record of pairwise outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded vote. The winner is always either the challenger or the
/// opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
  pub challenger: Uuid,
  pub opponent:   Uuid,
  pub winner:     Uuid,
  pub at:         DateTime<Utc>,
}

impl Comparison {
  pub fn loser(&self) -> Uuid {
    if self.winner == self.challenger {
      self.opponent
    } else {
      self.challenger
    }
  }

  pub fn challenger_won(&self) -> bool { self.winner == self.challenger }
}

/// Append-only sequence of [`Comparison`]s for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger(Vec<Comparison>);

impl Ledger {
  pub fn record(&mut self, comparison: Comparison) { self.0.push(comparison); }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> std::slice::Iter<'_, Comparison> { self.0.iter() }

  /// Number of votes spent positioning `challenger`.
  pub fn votes_for(&self, challenger: Uuid) -> usize {
    self.0.iter().filter(|c| c.challenger == challenger).count()
  }

  /// `true` if `a` and `b` were already compared, in either role.
  pub fn contains_pair(&self, a: Uuid, b: Uuid) -> bool {
    self.0.iter().any(|c| {
      (c.challenger == a && c.opponent == b)
        || (c.challenger == b && c.opponent == a)
    })
  }
}

impl<'a> IntoIterator for &'a Ledger {
  type IntoIter = std::slice::Iter<'a, Comparison>;
  type Item = &'a Comparison;

  fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}
