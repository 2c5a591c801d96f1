//! Engine tuning knobs.

use std::time::Duration;

/// Runtime options for an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Seed for the engine's generator. `None` seeds from entropy.
  pub rng_seed:                Option<u64>,
  /// Repeating the last action inside this window is a no-op. Zero disables
  /// duplicate suppression.
  pub dedup_window:            Duration,
  /// Upper bound on each store call. Zero disables the timeout.
  pub store_timeout:           Duration,
  /// Spawn a background rating rebuild whenever a session completes.
  pub recompute_on_completion: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      rng_seed:                None,
      dedup_window:            Duration::from_secs(5),
      store_timeout:           Duration::from_secs(5),
      recompute_on_completion: false,
    }
  }
}
