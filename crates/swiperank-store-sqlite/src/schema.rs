//! SQL schema for the swiperank SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS items (
    item_id      TEXT PRIMARY KEY,
    deck         TEXT NOT NULL,
    title        TEXT NOT NULL,
    payload      TEXT NOT NULL DEFAULT 'null',  -- opaque JSON
    is_parent    INTEGER NOT NULL DEFAULT 0,
    family_tag   TEXT,                          -- tag carried by children
    parent_tag   TEXT,                          -- NULL for top-level items
    has_children INTEGER NOT NULL DEFAULT 0,
    active       INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL
);

-- Sessions are stored whole as JSON; the scalar columns exist for filtering.
-- Every write bumps `version` and is conditional on the previous value.
CREATE TABLE IF NOT EXISTS sessions (
    session_id   TEXT PRIMARY KEY,
    deck_tag     TEXT NOT NULL,
    mode         TEXT NOT NULL,     -- 'rank' | 'swipe_only' | 'vote_only'
    phase        TEXT NOT NULL,     -- 'swiping' | 'voting' | 'completed'
    state_json   TEXT NOT NULL,
    version      INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS hierarchies (
    hierarchy_id    TEXT PRIMARY KEY,
    root_session_id TEXT NOT NULL,
    status          TEXT NOT NULL,  -- 'awaiting_root' | 'expanding' | 'completed'
    state_json      TEXT NOT NULL,
    version         INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    completed_at    TEXT
);

-- Rebuilt wholesale by the rating aggregator.
CREATE TABLE IF NOT EXISTS ratings (
    item_id     TEXT PRIMARY KEY,
    rating      INTEGER NOT NULL,
    wins        INTEGER NOT NULL,
    losses      INTEGER NOT NULL,
    draws       INTEGER NOT NULL,
    total_games INTEGER NOT NULL,
    likes       INTEGER NOT NULL,
    dislikes    INTEGER NOT NULL,
    confidence  REAL NOT NULL CHECK (confidence BETWEEN 0.0 AND 1.0),
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS items_deck_idx       ON items(deck);
CREATE INDEX IF NOT EXISTS items_parent_idx     ON items(parent_tag);
CREATE INDEX IF NOT EXISTS sessions_phase_idx   ON sessions(phase, completed_at);
CREATE INDEX IF NOT EXISTS hierarchies_root_idx ON hierarchies(root_session_id);
CREATE INDEX IF NOT EXISTS ratings_rating_idx   ON ratings(rating DESC);

PRAGMA user_version = 1;
";
