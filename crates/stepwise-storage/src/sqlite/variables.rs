//! Variable rows, scoped to an agent and deleted with it.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use stepwise_core::error::CoreError;
use stepwise_core::{BlockSequence, Variable};
use stepwise_core::enums::VariableKind;
use stepwise_core::variable::VariableValue;

use crate::error::{Result, StorageError};
use crate::sqlite::agents::{agent_exists_on_conn, format_datetime, parse_datetime};
use crate::sqlite::store::SqliteStore;

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with Transaction)
// ---------------------------------------------------------------------------

/// Inserts or updates a variable. The owning agent must exist and the name
/// must be free within that agent.
pub(crate) fn put_variable_on_conn(conn: &Connection, variable: &Variable) -> Result<()> {
    if variable.agent_id.is_empty() {
        return Err(StorageError::validation(format!(
            "variable {} has no agent",
            variable.id
        )));
    }
    if !agent_exists_on_conn(conn, &variable.agent_id)? {
        return Err(StorageError::not_found("agent", &variable.agent_id));
    }

    let owner: Option<String> = conn
        .query_row(
            "SELECT agent_id FROM variables WHERE id = ?1",
            params![variable.id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(owner) = owner {
        if owner != variable.agent_id {
            return Err(StorageError::validation(format!(
                "variable {} belongs to agent {owner}",
                variable.id
            )));
        }
    }

    let clash: Option<String> = conn
        .query_row(
            "SELECT id FROM variables WHERE agent_id = ?1 AND name = ?2 AND id != ?3",
            params![variable.agent_id, variable.name, variable.id],
            |row| row.get(0),
        )
        .optional()?;
    if clash.is_some() {
        return Err(StorageError::validation(format!(
            "a variable named '{}' already exists",
            variable.name
        )));
    }

    let value = variable
        .value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO variables (id, agent_id, name, kind, value, description, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             kind = excluded.kind,
             value = excluded.value,
             description = excluded.description,
             updated_at = excluded.updated_at",
        params![
            variable.id,
            variable.agent_id,
            variable.name,
            variable.kind.as_str(),
            value,
            variable.description,
            format_datetime(&variable.updated_at),
        ],
    )?;
    debug!(id = %variable.id, agent = %variable.agent_id, "stored variable");
    Ok(())
}

/// Deletes a variable unless a stored block of its agent still references it.
pub(crate) fn delete_variable_on_conn(conn: &Connection, agent_id: &str, id: &str) -> Result<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT blocks FROM agents WHERE id = ?1",
            params![agent_id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(blocks) = stored {
        let blocks: BlockSequence = serde_json::from_str(&blocks)?;
        if let Some(block) = blocks.first_referencing(id) {
            return Err(CoreError::VariableInUse {
                id: id.to_owned(),
                block_number: block.block_number,
            }
            .into());
        }
    }

    let n = conn.execute(
        "DELETE FROM variables WHERE id = ?1 AND agent_id = ?2",
        params![id, agent_id],
    )?;
    if n == 0 {
        return Err(StorageError::not_found("variable", id));
    }
    conn.execute(
        "UPDATE agents SET updated_at = ?1 WHERE id = ?2",
        params![format_datetime(&Utc::now()), agent_id],
    )?;
    Ok(())
}

/// Returns an agent's variables in insertion order.
pub(crate) fn list_variables_on_conn(conn: &Connection, agent_id: &str) -> Result<Vec<Variable>> {
    let mut stmt = conn.prepare(
        "SELECT id, agent_id, name, kind, value, description, updated_at
         FROM variables WHERE agent_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![agent_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, agent_id, name, kind, value, description, updated_at) = row?;
        let kind: VariableKind = kind
            .parse()
            .map_err(|e| StorageError::Internal(format!("variable {id}: {e}")))?;
        let value: Option<VariableValue> = value
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        out.push(Variable {
            id,
            name,
            kind,
            value,
            description,
            agent_id,
            updated_at: parse_datetime(&updated_at),
        });
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    pub fn put_variable_impl(&self, variable: &Variable) -> Result<()> {
        let conn = self.lock_conn()?;
        put_variable_on_conn(&conn, variable)
    }

    pub fn delete_variable_impl(&self, agent_id: &str, id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        delete_variable_on_conn(&conn, agent_id, id)
    }

    pub fn list_variables_impl(&self, agent_id: &str) -> Result<Vec<Variable>> {
        let conn = self.lock_conn()?;
        list_variables_on_conn(&conn, agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use stepwise_core::variable::TableRow;
    use stepwise_core::{Block, BlockKind};

    fn store_with_agent() -> (SqliteStore, String) {
        let store = SqliteStore::open_in_memory().unwrap();
        let agent = store.create_agent_impl("A", "").unwrap();
        (store, agent.id)
    }

    fn var(agent_id: &str, id: &str, name: &str) -> Variable {
        let mut v = Variable::new(id, name, VariableKind::Input);
        v.agent_id = agent_id.into();
        v
    }

    #[test]
    fn put_and_list_in_order() {
        let (store, agent) = store_with_agent();
        store.put_variable_impl(&var(&agent, "var-b", "b")).unwrap();
        store.put_variable_impl(&var(&agent, "var-a", "a")).unwrap();
        let names: Vec<String> = store
            .list_variables_impl(&agent)
            .unwrap()
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn upsert_keeps_position_and_updates_value() {
        let (store, agent) = store_with_agent();
        store.put_variable_impl(&var(&agent, "var-1", "one")).unwrap();
        store.put_variable_impl(&var(&agent, "var-2", "two")).unwrap();

        let mut table = Variable::new("var-1", "one", VariableKind::Table);
        table.agent_id = agent.clone();
        let mut row = TableRow::new();
        row.insert("name".into(), json!("Ada"));
        table.value = Some(VariableValue::Table(vec![row]));
        store.put_variable_impl(&table).unwrap();

        let vars = store.list_variables_impl(&agent).unwrap();
        assert_eq!(vars[0].id, "var-1");
        assert_eq!(vars[0].kind, VariableKind::Table);
        assert_eq!(vars[0].value, table.value);
    }

    #[test]
    fn duplicate_name_rejected() {
        let (store, agent) = store_with_agent();
        store.put_variable_impl(&var(&agent, "var-1", "x")).unwrap();
        let err = store.put_variable_impl(&var(&agent, "var-2", "x")).unwrap_err();
        assert!(matches!(err, StorageError::Validation { .. }));
    }

    #[test]
    fn unknown_agent_rejected() {
        let (store, _) = store_with_agent();
        let err = store.put_variable_impl(&var("ag-ghost", "var-1", "x")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn variables_cascade_with_agent() {
        let (store, agent) = store_with_agent();
        store.put_variable_impl(&var(&agent, "var-1", "x")).unwrap();
        store.delete_agent_impl(&agent).unwrap();
        let conn = store.lock_conn().unwrap();
        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM variables", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn delete_variable() {
        let (store, agent) = store_with_agent();
        store.put_variable_impl(&var(&agent, "var-1", "x")).unwrap();
        store.delete_variable_impl(&agent, "var-1").unwrap();
        assert!(store.list_variables_impl(&agent).unwrap().is_empty());
        assert!(store
            .delete_variable_impl(&agent, "var-1")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn delete_refuses_variable_bound_by_stored_block() {
        let (store, agent) = store_with_agent();
        store.put_variable_impl(&var(&agent, "var-1", "x")).unwrap();
        let mut blocks = BlockSequence::new();
        let block = Block::builder(BlockKind::Checkpoint)
            .output_variable("var-1")
            .build();
        blocks.insert(block, None).unwrap();
        store.save_agent_impl(&agent, &blocks).unwrap();

        let err = store.delete_variable_impl(&agent, "var-1").unwrap_err();
        assert!(err.to_string().contains("still referenced by block 1"));
        assert_eq!(store.list_variables_impl(&agent).unwrap().len(), 1);

        store
            .save_agent_impl(&agent, &BlockSequence::new())
            .unwrap();
        store.delete_variable_impl(&agent, "var-1").unwrap();
        assert!(store.list_variables_impl(&agent).unwrap().is_empty());
    }
}
