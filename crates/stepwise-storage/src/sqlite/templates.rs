//! Template snapshots. Blocks and variables are stored as JSON documents.

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use stepwise_core::Template;
use stepwise_core::validation::validate_template;

use crate::error::{Result, StorageError};
use crate::sqlite::agents::{format_datetime, parse_datetime};
use crate::sqlite::store::SqliteStore;

const TEMPLATE_COLUMNS: &str = "id, name, description, created_by, created_at, blocks, variables";

struct TemplateRow {
    id: String,
    name: String,
    description: String,
    created_by: String,
    created_at: String,
    blocks: String,
    variables: String,
}

impl TemplateRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created_by: row.get(3)?,
            created_at: row.get(4)?,
            blocks: row.get(5)?,
            variables: row.get(6)?,
        })
    }

    fn into_template(self) -> Result<Template> {
        Ok(Template {
            id: self.id,
            name: self.name,
            description: self.description,
            created_by: self.created_by,
            created_at: parse_datetime(&self.created_at),
            blocks: serde_json::from_str(&self.blocks)?,
            variables: serde_json::from_str(&self.variables)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with Transaction)
// ---------------------------------------------------------------------------

pub(crate) fn create_template_on_conn(conn: &Connection, template: &Template) -> Result<()> {
    validate_template(template)?;
    conn.execute(
        &format!("INSERT INTO templates ({TEMPLATE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            template.id,
            template.name,
            template.description,
            template.created_by,
            format_datetime(&template.created_at),
            serde_json::to_string(&template.blocks)?,
            serde_json::to_string(&template.variables)?,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StorageError::validation(format!("template {} already exists", template.id))
        }
        other => StorageError::Query(other),
    })?;
    debug!(id = %template.id, "created template");
    Ok(())
}

pub(crate) fn get_template_on_conn(conn: &Connection, id: &str) -> Result<Template> {
    conn.query_row(
        &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?1"),
        params![id],
        TemplateRow::from_row,
    )
    .optional()?
    .ok_or_else(|| StorageError::not_found("template", id))?
    .into_template()
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    pub fn create_template_impl(&self, template: &Template) -> Result<()> {
        let conn = self.lock_conn()?;
        create_template_on_conn(&conn, template)
    }

    pub fn get_template_impl(&self, id: &str) -> Result<Template> {
        let conn = self.lock_conn()?;
        get_template_on_conn(&conn, id)
    }

    /// Returns all templates, newest first.
    pub fn list_templates_impl(&self) -> Result<Vec<Template>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates ORDER BY created_at DESC, id"
        ))?;
        let rows = stmt.query_map([], TemplateRow::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_template()?);
        }
        Ok(out)
    }

    pub fn delete_template_impl(&self, id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        let n = conn.execute("DELETE FROM templates WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(StorageError::not_found("template", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stepwise_core::Agent;
    use stepwise_core::block::{Block, BlockKind};
    use stepwise_core::enums::VariableKind;

    fn sample_template() -> Template {
        let mut agent = Agent::new("Source agent", "ada");
        let v = agent.add_variable("x", VariableKind::Intermediate).unwrap();
        agent
            .add_block(Block::builder(BlockKind::Checkpoint).output_variable(&v.id).build())
            .unwrap();
        Template::snapshot(&agent, "Tpl", "a template", "ada")
    }

    #[test]
    fn create_get_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let template = sample_template();
        store.create_template_impl(&template).unwrap();
        let loaded = store.get_template_impl(&template.id).unwrap();
        assert_eq!(loaded.blocks, template.blocks);
        assert_eq!(loaded.variables.len(), 1);
        assert_eq!(loaded.description, "a template");
    }

    #[test]
    fn duplicate_id_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let template = sample_template();
        store.create_template_impl(&template).unwrap();
        let err = store.create_template_impl(&template).unwrap_err();
        assert!(matches!(err, StorageError::Validation { .. }));
    }

    #[test]
    fn invalid_template_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut template = sample_template();
        template.variables.clear();
        assert!(store.create_template_impl(&template).is_err());
        assert!(store.list_templates_impl().unwrap().is_empty());
    }

    #[test]
    fn list_and_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let template = sample_template();
        store.create_template_impl(&template).unwrap();
        assert_eq!(store.list_templates_impl().unwrap().len(), 1);
        store.delete_template_impl(&template.id).unwrap();
        assert!(store.get_template_impl(&template.id).unwrap_err().is_not_found());
        assert!(store.delete_template_impl(&template.id).unwrap_err().is_not_found());
    }
}
