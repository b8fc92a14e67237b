//! Agent persistence: one row per agent, blocks as a JSON document.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use stepwise_core::validation::validate_agent;
use stepwise_core::{Agent, AgentSummary, BlockSequence, VariableRegistry};

use crate::error::{Result, StorageError};
use crate::sqlite::store::SqliteStore;
use crate::sqlite::variables;

// ---------------------------------------------------------------------------
// Datetime helpers
// ---------------------------------------------------------------------------

/// Formats a timestamp as the ISO 8601 TEXT stored in SQLite.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parses an ISO 8601 TEXT string from SQLite into a `DateTime<Utc>`.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|_| {
        chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
            .map(|ndt| ndt.and_utc())
            .unwrap_or_else(|_| Utc::now())
    })
}

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with Transaction)
// ---------------------------------------------------------------------------

pub(crate) fn agent_exists_on_conn(conn: &Connection, id: &str) -> Result<bool> {
    let found: Option<i32> = conn
        .query_row("SELECT 1 FROM agents WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Inserts an agent row and all of its variables.
pub(crate) fn insert_agent_on_conn(conn: &Connection, agent: &Agent) -> Result<()> {
    validate_agent(agent)?;
    if agent_exists_on_conn(conn, &agent.id)? {
        return Err(StorageError::validation(format!(
            "agent {} already exists",
            agent.id
        )));
    }

    conn.execute(
        "INSERT INTO agents (id, name, owner, blocks, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            agent.id,
            agent.name,
            agent.owner,
            serde_json::to_string(&agent.blocks)?,
            format_datetime(&agent.created_at),
            format_datetime(&agent.updated_at),
        ],
    )?;

    for variable in &agent.variables {
        let mut variable = variable.clone();
        variable.agent_id = agent.id.clone();
        variables::put_variable_on_conn(conn, &variable)?;
    }
    debug!(id = %agent.id, blocks = agent.blocks.len(), "inserted agent");
    Ok(())
}

pub(crate) fn load_agent_on_conn(conn: &Connection, id: &str) -> Result<Agent> {
    let row = conn
        .query_row(
            "SELECT id, name, owner, blocks, created_at, updated_at FROM agents WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;
    let Some((id, name, owner, blocks, created_at, updated_at)) = row else {
        return Err(StorageError::not_found("agent", id));
    };

    let blocks: BlockSequence = serde_json::from_str(&blocks)?;
    let variables = variables::list_variables_on_conn(conn, &id)?;

    let mut agent = Agent::with_id(id, name, owner);
    agent.created_at = parse_datetime(&created_at);
    agent.updated_at = parse_datetime(&updated_at);
    agent.replace_blocks(blocks);
    agent.variables = VariableRegistry::try_from(variables)?;
    Ok(agent)
}

/// Replaces the block document of an agent after checking its references.
pub(crate) fn save_agent_on_conn(conn: &Connection, id: &str, blocks: &BlockSequence) -> Result<()> {
    if !agent_exists_on_conn(conn, id)? {
        return Err(StorageError::not_found("agent", id));
    }

    let known: HashSet<String> = variables::list_variables_on_conn(conn, id)?
        .into_iter()
        .map(|v| v.id)
        .collect();
    for block in blocks {
        if !block.agent_id.is_empty() && block.agent_id != id {
            return Err(StorageError::validation(format!(
                "block {} belongs to agent {}",
                block.id, block.agent_id
            )));
        }
        if let Some(missing) = block.variable_refs().into_iter().find(|v| !known.contains(*v)) {
            return Err(StorageError::validation(format!(
                "block {} references unknown variable {missing}",
                block.block_number
            )));
        }
    }

    conn.execute(
        "UPDATE agents SET blocks = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            serde_json::to_string(blocks)?,
            format_datetime(&Utc::now()),
            id
        ],
    )?;
    debug!(id, blocks = blocks.len(), "saved agent blocks");
    Ok(())
}

pub(crate) fn delete_agent_on_conn(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM agents WHERE id = ?1", params![id])?;
    if n == 0 {
        return Err(StorageError::not_found("agent", id));
    }
    debug!(id, "deleted agent");
    Ok(())
}

fn rename_agent_on_conn(conn: &Connection, id: &str, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StorageError::validation("agent name is required"));
    }
    let n = conn.execute(
        "UPDATE agents SET name = ?1, updated_at = ?2 WHERE id = ?3",
        params![name, format_datetime(&Utc::now()), id],
    )?;
    if n == 0 {
        return Err(StorageError::not_found("agent", id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Creates and stores an empty agent.
    pub fn create_agent_impl(&self, name: &str, owner: &str) -> Result<Agent> {
        let agent = Agent::new(name.trim(), owner);
        let conn = self.lock_conn()?;
        insert_agent_on_conn(&conn, &agent)?;
        Ok(agent)
    }

    pub fn insert_agent_impl(&self, agent: &Agent) -> Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StorageError::Transaction(format!("failed to begin: {e}")))?;
        insert_agent_on_conn(&tx, agent)?;
        tx.commit()
            .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))
    }

    pub fn load_agent_impl(&self, id: &str) -> Result<Agent> {
        let conn = self.lock_conn()?;
        load_agent_on_conn(&conn, id)
    }

    pub fn save_agent_impl(&self, id: &str, blocks: &BlockSequence) -> Result<()> {
        let conn = self.lock_conn()?;
        save_agent_on_conn(&conn, id, blocks)
    }

    pub fn delete_agent_impl(&self, id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        delete_agent_on_conn(&conn, id)
    }

    pub fn rename_agent_impl(&self, id: &str, name: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        rename_agent_on_conn(&conn, id, name)
    }

    /// Lists agent summaries, newest first.
    pub fn list_agents_impl(&self, owner: Option<&str>) -> Result<Vec<AgentSummary>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, owner, created_at, updated_at, json_array_length(blocks)
             FROM agents
             WHERE ?1 IS NULL OR owner = ?1
             ORDER BY updated_at DESC, id",
        )?;
        let rows = stmt.query_map(params![owner], |row| {
            Ok(AgentSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                owner: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
                updated_at: parse_datetime(&row.get::<_, String>(4)?),
                block_count: row.get::<_, i64>(5)? as usize,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
