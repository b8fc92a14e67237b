//! Transaction wrapper for [`SqliteStore`].

use rusqlite::Connection;

use stepwise_core::{Agent, BlockSequence, Template, Variable};

use crate::error::{Result, StorageError};
use crate::sqlite::store::SqliteStore;
use crate::sqlite::{agents, config, templates, variables};
use crate::traits::Transaction;

/// A thin wrapper around a SQLite connection that is inside a transaction.
///
/// Delegates to the same connection-level helpers used by [`SqliteStore`].
pub(crate) struct SqliteTx<'a> {
    pub(crate) conn: &'a Connection,
}

impl Transaction for SqliteTx<'_> {
    fn insert_agent(&self, agent: &Agent) -> Result<()> {
        agents::insert_agent_on_conn(self.conn, agent)
    }

    fn load_agent(&self, id: &str) -> Result<Agent> {
        agents::load_agent_on_conn(self.conn, id)
    }

    fn save_agent(&self, id: &str, blocks: &BlockSequence) -> Result<()> {
        agents::save_agent_on_conn(self.conn, id, blocks)
    }

    fn delete_agent(&self, id: &str) -> Result<()> {
        agents::delete_agent_on_conn(self.conn, id)
    }

    fn put_variable(&self, variable: &Variable) -> Result<()> {
        variables::put_variable_on_conn(self.conn, variable)
    }

    fn delete_variable(&self, agent_id: &str, id: &str) -> Result<()> {
        variables::delete_variable_on_conn(self.conn, agent_id, id)
    }

    fn get_template(&self, id: &str) -> Result<Template> {
        templates::get_template_on_conn(self.conn, id)
    }

    fn set_config(&self, key: &str, value: &str) -> Result<()> {
        config::set_config_on_conn(self.conn, key, value)
    }

    fn get_config(&self, key: &str) -> Result<String> {
        config::get_config_on_conn(self.conn, key)
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        config::set_metadata_on_conn(self.conn, key, value)
    }

    fn get_metadata(&self, key: &str) -> Result<String> {
        config::get_metadata_on_conn(self.conn, key)
    }
}

// ---------------------------------------------------------------------------
// SqliteStore::run_in_transaction
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Runs a closure inside a database transaction.
    pub fn run_in_transaction_impl(
        &self,
        f: &dyn Fn(&dyn Transaction) -> Result<()>,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StorageError::Transaction(format!("failed to begin: {e}")))?;

        let sqlite_tx = SqliteTx { conn: &tx };
        match f(&sqlite_tx) {
            Ok(()) => {
                tx.commit()
                    .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))?;
                Ok(())
            }
            // Rolled back on drop.
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::enums::VariableKind;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn transaction_commit() {
        let store = test_store();
        let mut agent = Agent::with_id("ag-tx1", "In transaction", "ada");
        agent.add_variable("x", VariableKind::Input).unwrap();

        store
            .run_in_transaction_impl(&|tx| {
                tx.insert_agent(&agent)?;
                tx.set_config("active_agent", &agent.id)?;
                Ok(())
            })
            .unwrap();

        let loaded = store.load_agent_impl("ag-tx1").unwrap();
        assert_eq!(loaded.name, "In transaction");
        assert_eq!(loaded.variables.len(), 1);
        assert_eq!(store.get_config_impl("active_agent").unwrap(), "ag-tx1");
    }

    #[test]
    fn transaction_rollback_on_error() {
        let store = test_store();
        let mut agent = Agent::with_id("ag-tx2", "Should rollback", "");
        agent.add_variable("x", VariableKind::Input).unwrap();

        let result = store.run_in_transaction_impl(&|tx| {
            tx.insert_agent(&agent)?;
            Err(StorageError::Internal("test rollback".into()))
        });
        assert!(result.is_err());

        assert!(store.load_agent_impl("ag-tx2").unwrap_err().is_not_found());
        assert!(store.list_agents_impl(None).unwrap().is_empty());
        assert!(store.list_variables_impl("ag-tx2").unwrap().is_empty());
    }

    #[test]
    fn transaction_sees_its_own_writes() {
        let store = test_store();
        store
            .run_in_transaction_impl(&|tx| {
                tx.insert_agent(&Agent::with_id("ag-tx3", "Visible", ""))?;
                let loaded = tx.load_agent("ag-tx3")?;
                assert_eq!(loaded.name, "Visible");
                tx.delete_agent("ag-tx3")
            })
            .unwrap();
        assert!(store.list_agents_impl(None).unwrap().is_empty());
    }
}
