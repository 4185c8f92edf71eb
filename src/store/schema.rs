//! SQLite DDL for the trace config database.

use rusqlite::{Connection, OptionalExtension};

/// Bumped when the DDL changes shape.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Safe to run on every open.
pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS apps (
    id        TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL
);

-- One row per (app, provider); secret fields of tracing_config are ciphertext.
CREATE TABLE IF NOT EXISTS tracing_app_configs (
    app_id           TEXT NOT NULL,
    tracing_provider TEXT NOT NULL,
    tracing_config   TEXT NOT NULL,      -- JSON object
    created_at       INTEGER NOT NULL DEFAULT 0,
    updated_at       INTEGER NOT NULL DEFAULT 0,
    UNIQUE (app_id, tracing_provider)
);

CREATE TABLE IF NOT EXISTS app_model_configs (
    id           TEXT PRIMARY KEY,
    app_id       TEXT NOT NULL,
    trace_config TEXT,                   -- JSON object or NULL
    updated_at   INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_model_configs_app_updated
    ON app_model_configs(app_id, updated_at);

CREATE TABLE IF NOT EXISTS conversations (
    id                     TEXT PRIMARY KEY,
    app_id                 TEXT NOT NULL,
    app_model_config_id    TEXT,
    override_model_configs TEXT          -- JSON object or NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id)
);
"#;

/// Apply the full schema and seed the version row.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// `None` if the version row is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(|v| v.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        match Connection::open_in_memory() {
            Ok(c) => c,
            Err(_) => unreachable!("in-memory sqlite should open"),
        }
    }

    #[test]
    fn apply_schema_is_idempotent() {
        let conn = open();
        assert!(apply_schema(&conn).is_ok());
        assert!(apply_schema(&conn).is_ok());
        assert_eq!(
            read_schema_version(&conn).ok().flatten(),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }

    #[test]
    fn unique_app_provider_enforced() {
        let conn = open();
        assert!(apply_schema(&conn).is_ok());
        let insert = "INSERT INTO tracing_app_configs (app_id, tracing_provider, tracing_config) \
                      VALUES ('a', 'langfuse', '{}')";
        assert!(conn.execute(insert, []).is_ok());
        assert!(conn.execute(insert, []).is_err());
    }
}
