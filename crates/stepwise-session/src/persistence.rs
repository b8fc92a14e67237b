//! The narrow slice of storage the editor session writes through.

use stepwise_core::{Agent, BlockSequence, Variable};
use stepwise_storage::{Storage, StorageError};

type Result<T> = std::result::Result<T, StorageError>;

/// Backend operations used while editing one agent.
///
/// Every [`Storage`] implements this; tests substitute counting fakes.
pub trait AgentPersistence {
    fn create_agent(&self, name: &str, owner: &str) -> Result<Agent>;
    fn load_agent(&self, id: &str) -> Result<Agent>;
    fn save_agent(&self, id: &str, blocks: &BlockSequence) -> Result<()>;
    fn put_variable(&self, variable: &Variable) -> Result<()>;
    /// Writes all of `variables` or none of them.
    fn put_variables(&self, variables: &[Variable]) -> Result<()>;
    fn delete_variable(&self, agent_id: &str, id: &str) -> Result<()>;
}

impl<S: Storage + ?Sized> AgentPersistence for S {
    fn create_agent(&self, name: &str, owner: &str) -> Result<Agent> {
        Storage::create_agent(self, name, owner)
    }

    fn load_agent(&self, id: &str) -> Result<Agent> {
        Storage::load_agent(self, id)
    }

    fn save_agent(&self, id: &str, blocks: &BlockSequence) -> Result<()> {
        Storage::save_agent(self, id, blocks)
    }

    fn put_variable(&self, variable: &Variable) -> Result<()> {
        Storage::put_variable(self, variable)
    }

    fn put_variables(&self, variables: &[Variable]) -> Result<()> {
        self.run_in_transaction(&|tx| {
            for variable in variables {
                tx.put_variable(variable)?;
            }
            Ok(())
        })
    }

    fn delete_variable(&self, agent_id: &str, id: &str) -> Result<()> {
        Storage::delete_variable(self, agent_id, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stepwise_core::enums::VariableKind;
    use stepwise_storage::SqliteStore;

    fn variable(agent_id: &str, id: &str, name: &str) -> Variable {
        let mut v = Variable::new(id, name, VariableKind::Input);
        v.agent_id = agent_id.into();
        v
    }

    #[test]
    fn batch_write_is_all_or_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let agent = Storage::create_agent(&store, "A", "").unwrap();
        Storage::put_variable(&store, &variable(&agent.id, "var-1", "a")).unwrap();

        let batch = [
            variable(&agent.id, "var-2", "b"),
            variable(&agent.id, "var-3", "a"),
        ];
        assert!(store.put_variables(&batch).is_err());
        let names: Vec<String> = store
            .list_variables(&agent.id)
            .unwrap()
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["a"]);

        store.put_variables(&batch[..1]).unwrap();
        assert_eq!(store.list_variables(&agent.id).unwrap().len(), 2);
    }
}
