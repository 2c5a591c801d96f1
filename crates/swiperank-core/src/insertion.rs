//! Insertion ranking: positioning one challenger inside a personal ranking.
//!
//! An insertion episode starts with every ranked item eligible as an
//! opponent. Each vote removes the opponent together with everything on the
//! far side of it:
//!
//! - challenger wins at position *p*: *p* and everything ranked worse is
//!   known to be inferior, and the challenger moves up to *p*;
//! - challenger loses: *p* and everything ranked better is known to be
//!   superior, and the challenger keeps its tentative place (the end of the
//!   ranking on its first comparison).
//!
//! Opponents are drawn uniformly from the surviving eligible set rather than
//! the midpoint. The episode settles when no eligible opponent remains; the
//! challenger then sits directly below the worst item it lost to and directly
//! above the best item it beat.

use std::collections::HashMap;

use rand::{Rng, seq::SliceRandom as _};
use uuid::Uuid;

use crate::{Error, Result};

/// What an applied vote did to the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Narrowing {
  /// Eligible opponents remain; another comparison is needed.
  Pending { remaining: usize },
  /// The challenger's position is final.
  Settled { position: usize },
}

/// The eligible opponents for a fresh episode: every ranked item except the
/// challenger itself.
pub fn open(ranking: &[Uuid], challenger: Uuid) -> Vec<Uuid> {
  ranking.iter().copied().filter(|id| *id != challenger).collect()
}

/// Draw the next opponent uniformly at random from `active`.
pub fn pick_opponent<R: Rng + ?Sized>(active: &[Uuid], rng: &mut R) -> Option<Uuid> {
  active.choose(rng).copied()
}

/// Apply one vote between `challenger` and `opponent` to the ranking and the
/// active set.
///
/// `ranking` may or may not already hold the challenger; it never holds it
/// twice. Fails with [`Error::InvalidState`] if the opponent is not ranked or
/// not eligible.
pub fn apply(
  ranking: &mut Vec<Uuid>,
  active: &mut Vec<Uuid>,
  challenger: Uuid,
  opponent: Uuid,
  challenger_won: bool,
) -> Result<Narrowing> {
  if !active.contains(&opponent) {
    return Err(Error::InvalidState(format!(
      "{opponent} is not an eligible opponent for {challenger}"
    )));
  }

  let positions: HashMap<Uuid, usize> =
    ranking.iter().enumerate().map(|(i, id)| (*id, i)).collect();
  let pivot = *positions.get(&opponent).ok_or_else(|| {
    Error::InvalidState(format!("opponent {opponent} is not ranked"))
  })?;

  if challenger_won {
    active.retain(|id| positions.get(id).is_some_and(|p| *p < pivot));
    ranking.retain(|id| *id != challenger);
    // Removing the challenger only shifts items that were ranked below it,
    // and the opponent is always above its tentative place.
    let at = ranking.iter().position(|id| *id == opponent).unwrap_or(pivot);
    ranking.insert(at, challenger);
  } else {
    active.retain(|id| positions.get(id).is_some_and(|p| *p > pivot));
    if !ranking.contains(&challenger) {
      ranking.push(challenger);
    }
  }

  if active.is_empty() {
    let position = ranking
      .iter()
      .position(|id| *id == challenger)
      .unwrap_or(ranking.len());
    Ok(Narrowing::Settled { position })
  } else {
    Ok(Narrowing::Pending { remaining: active.len() })
  }
}
