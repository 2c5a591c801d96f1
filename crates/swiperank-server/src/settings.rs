//! Server configuration: a TOML file layered under `SWIPERANK_*` variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;
use swiperank_engine::EngineConfig;

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  pub store_path:              PathBuf,
  /// Fixed seed for reproducible shuffles and draws.
  pub rng_seed:                Option<u64>,
  pub dedup_window_ms:         u64,
  pub store_timeout_ms:        u64,
  pub recompute_on_completion: bool,
  /// Period of the background rating rebuild; `0` disables it.
  pub rating_interval_secs:    u64,
}

impl ServerConfig {
  /// Read `path` (optional) and the environment on top of the defaults.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("store_path", "~/.local/share/swiperank/swiperank.db")?
      .set_default("dedup_window_ms", 5_000)?
      .set_default("store_timeout_ms", 5_000)?
      .set_default("recompute_on_completion", false)?
      .set_default("rating_interval_secs", 0)?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("SWIPERANK"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      rng_seed:                self.rng_seed,
      dedup_window:            Duration::from_millis(self.dedup_window_ms),
      store_timeout:           Duration::from_millis(self.store_timeout_ms),
      recompute_on_completion: self.recompute_on_completion,
    }
  }

  /// `store_path` with a leading `~` expanded.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/swiperank.toml")).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.rating_interval_secs, 0);
    assert!(cfg.rng_seed.is_none());

    let engine = cfg.engine_config();
    assert_eq!(engine.dedup_window, Duration::from_secs(5));
    assert!(!engine.recompute_on_completion);
  }

  #[test]
  fn file_values_override_defaults() {
    let path = std::env::temp_dir().join(format!("swiperank-{}.toml", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "port = 9000\nrng_seed = 42\ndedup_window_ms = 0").unwrap();
    drop(file);

    let cfg = ServerConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.rng_seed, Some(42));
    assert!(cfg.engine_config().dedup_window.is_zero());
  }

  #[test]
  fn tilde_is_expanded_against_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    let expanded = expand_tilde(Path::new("~/data/swiperank.db"));
    assert_eq!(expanded, PathBuf::from(home).join("data/swiperank.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
  }
}
