//! SQLite-backed repository.
//!
//! Implements both [`TraceConfigRepository`] and [`AppDirectory`] on a single
//! database file. Thread-safe via an internal `Mutex<Connection>`; the
//! `UNIQUE (app_id, tracing_provider)` constraint settles concurrent creates.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde_json::Value;

use super::repository::{
    AppDirectory, AppModelConfigRow, ConversationRow, TraceConfigRecord, TraceConfigRepository,
};
use super::schema::{apply_schema, read_schema_version};
use crate::error::{Result, TraceError};
use crate::providers::TracingProvider;

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TraceError::Storage(format!(
                    "failed to create database directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened trace config database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn schema_version(&self) -> Result<Option<u32>> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    /// Register (or re-home) an application under a tenant.
    pub fn upsert_app(&self, app_id: &str, tenant_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO apps (id, tenant_id) VALUES (?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET tenant_id = excluded.tenant_id",
            params![app_id, tenant_id],
        )?;
        Ok(())
    }

    pub fn insert_app_model_config(&self, row: &AppModelConfigRow) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO app_model_configs (id, app_id, trace_config, updated_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                row.id,
                row.app_id,
                row.trace_config.as_ref().map(Value::to_string),
                row.updated_at
            ],
        )?;
        Ok(())
    }

    pub fn insert_conversation(&self, row: &ConversationRow) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO conversations (id, app_id, app_model_config_id, override_model_configs) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                row.id,
                row.app_id,
                row.app_model_config_id,
                row.override_model_configs.as_ref().map(Value::to_string)
            ],
        )?;
        Ok(())
    }

    pub fn insert_message(&self, message_id: &str, conversation_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO messages (id, conversation_id) VALUES (?1, ?2)",
            params![message_id, conversation_id],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TraceError::Storage("database connection lock poisoned".into()))
    }
}

impl TraceConfigRepository for SqliteRepository {
    fn find(&self, app_id: &str, provider: TracingProvider) -> Result<Option<TraceConfigRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT tracing_config, created_at, updated_at FROM tracing_app_configs \
                 WHERE app_id = ?1 AND tracing_provider = ?2",
                params![app_id, provider.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(config, created_at, updated_at)| {
            Ok(TraceConfigRecord {
                app_id: app_id.to_owned(),
                tracing_provider: provider,
                tracing_config: parse_json("tracing_config", &config)?,
                created_at,
                updated_at,
            })
        })
        .transpose()
    }

    fn insert(&self, record: &TraceConfigRecord) -> Result<()> {
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO tracing_app_configs \
             (app_id, tracing_provider, tracing_config, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.app_id,
                record.tracing_provider.as_str(),
                record.tracing_config.to_string(),
                record.created_at,
                record.updated_at
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(TraceError::AlreadyExists {
                    app_id: record.app_id.clone(),
                    provider: record.tracing_provider.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_config(
        &self,
        app_id: &str,
        provider: TracingProvider,
        tracing_config: &Value,
        updated_at: i64,
    ) -> Result<Option<TraceConfigRecord>> {
        {
            let conn = self.lock()?;
            let rows = conn.execute(
                "UPDATE tracing_app_configs SET tracing_config = ?1, updated_at = ?2 \
                 WHERE app_id = ?3 AND tracing_provider = ?4",
                params![tracing_config.to_string(), updated_at, app_id, provider.as_str()],
            )?;
            if rows == 0 {
                return Ok(None);
            }
        }
        self.find(app_id, provider)
    }

    fn delete(&self, app_id: &str, provider: TracingProvider) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM tracing_app_configs WHERE app_id = ?1 AND tracing_provider = ?2",
            params![app_id, provider.as_str()],
        )?;
        Ok(rows > 0)
    }
}

impl AppDirectory for SqliteRepository {
    fn tenant_id(&self, app_id: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT tenant_id FROM apps WHERE id = ?1",
                params![app_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn newest_app_model_configs(&self, app_id: &str) -> Result<Vec<AppModelConfigRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, app_id, trace_config, updated_at FROM app_model_configs \
             WHERE app_id = ?1 AND updated_at = \
                 (SELECT MAX(updated_at) FROM app_model_configs WHERE app_id = ?1) \
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![app_id], raw_model_config)?;

        let mut out = Vec::new();
        for r in rows {
            out.push(model_config_from_raw(r?)?);
        }
        Ok(out)
    }

    fn app_model_config(&self, id: &str) -> Result<Option<AppModelConfigRow>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT id, app_id, trace_config, updated_at FROM app_model_configs WHERE id = ?1",
                params![id],
                raw_model_config,
            )
            .optional()?;
        raw.map(model_config_from_raw).transpose()
    }

    fn conversation_for_message(&self, message_id: &str) -> Result<Option<ConversationRow>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT c.id, c.app_id, c.app_model_config_id, c.override_model_configs \
                 FROM messages m JOIN conversations c ON c.id = m.conversation_id \
                 WHERE m.id = ?1",
                params![message_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        raw.map(|(id, app_id, app_model_config_id, overrides)| {
            Ok(ConversationRow {
                id,
                app_id,
                app_model_config_id,
                override_model_configs: overrides
                    .map(|s| parse_json("override_model_configs", &s))
                    .transpose()?,
            })
        })
        .transpose()
    }
}

type RawModelConfig = (String, String, Option<String>, i64);

fn raw_model_config(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawModelConfig> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn model_config_from_raw(raw: RawModelConfig) -> Result<AppModelConfigRow> {
    let (id, app_id, trace_config, updated_at) = raw;
    Ok(AppModelConfigRow {
        id,
        app_id,
        trace_config: trace_config
            .map(|s| parse_json("trace_config", &s))
            .transpose()?,
        updated_at,
    })
}

fn parse_json(column: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| TraceError::Storage(format!("column '{column}' holds invalid JSON: {e}")))
}
