//! SQL DDL for the session store.
//! WAL mode + foreign keys enabled at connection time.

/// Bumped whenever the DDL changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Sessions and their samples.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    name TEXT,
    scenario TEXT,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    duration_secs INTEGER,
    is_active INTEGER NOT NULL DEFAULT 1,
    sample_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS samples (
    session_id TEXT NOT NULL REFERENCES sessions(id),
    sequence INTEGER NOT NULL,
    recorded_at TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (session_id, sequence)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_single_active
    ON sessions(is_active) WHERE is_active = 1;

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

/// Applied on every open.
pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
