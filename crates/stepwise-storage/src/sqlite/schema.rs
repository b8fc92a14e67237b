//! DDL statements and migrations for the SQLite schema.
//!
//! Timestamps are stored as TEXT in ISO 8601 format. Block lists, variable
//! values, template snapshots and source rows are JSON TEXT columns.

/// Current schema version. Bumped whenever DDL or migrations change.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Core DDL statements executed during `init_schema`.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // -- Agents --------------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS agents (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        owner       TEXT NOT NULL DEFAULT '',
        blocks      TEXT NOT NULL DEFAULT '[]',
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_agents_owner ON agents(owner)",
    "CREATE INDEX IF NOT EXISTS idx_agents_updated_at ON agents(updated_at)",
    // -- Variables -----------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS variables (
        id          TEXT PRIMARY KEY,
        agent_id    TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
        name        TEXT NOT NULL,
        kind        TEXT NOT NULL DEFAULT 'intermediate',
        value       TEXT,
        description TEXT NOT NULL DEFAULT '',
        updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        UNIQUE (agent_id, name)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_variables_agent ON variables(agent_id)",
    // -- Templates -----------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS templates (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_by  TEXT NOT NULL DEFAULT '',
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        blocks      TEXT NOT NULL DEFAULT '[]',
        variables   TEXT NOT NULL DEFAULT '[]'
    )
    "#,
    // -- Sources -------------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS sources (
        name         TEXT PRIMARY KEY,
        data         TEXT NOT NULL,
        nickname     TEXT,
        download_url TEXT NOT NULL DEFAULT '',
        updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    )
    "#,
    // -- Config / metadata ---------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS config (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS metadata (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

/// Config keys seeded on first open.
pub const DEFAULT_CONFIG: &[(&str, &str)] = &[("active_agent", "")];

/// Named migrations applied once, in order, after the base schema.
pub const MIGRATIONS: &[(&str, &str)] = &[
    // Future migrations go here, e.g.:
    // ("001_add_foo_column", "ALTER TABLE agents ADD COLUMN foo TEXT DEFAULT ''"),
];
