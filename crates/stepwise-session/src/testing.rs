//! In-memory persistence fake for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use stepwise_core::{Agent, BlockSequence, Variable};
use stepwise_storage::StorageError;

use crate::persistence::AgentPersistence;

type Result<T> = std::result::Result<T, StorageError>;

/// Records every call and can be told to fail.
#[derive(Default)]
pub(crate) struct RecordingPersistence {
    agents: RefCell<BTreeMap<String, Agent>>,
    saves: RefCell<Vec<(String, BlockSequence)>>,
    variable_writes: Cell<usize>,
    fail_saves: Cell<bool>,
    fail_variables: Cell<bool>,
    variable_budget: Cell<Option<usize>>,
}

impl RecordingPersistence {
    pub(crate) fn fail_saves(&self, on: bool) {
        self.fail_saves.set(on);
    }

    pub(crate) fn fail_variables(&self, on: bool) {
        self.fail_variables.set(on);
    }

    /// Lets `n` more variable writes succeed; later ones fail.
    pub(crate) fn fail_variables_after(&self, n: usize) {
        self.variable_budget.set(Some(self.variable_writes.get() + n));
    }

    fn variable_write_allowed(&self, count: usize) -> bool {
        !self.fail_variables.get()
            && self
                .variable_budget
                .get()
                .is_none_or(|budget| self.variable_writes.get() + count <= budget)
    }

    pub(crate) fn save_count(&self) -> usize {
        self.saves.borrow().len()
    }

    pub(crate) fn last_save(&self) -> Option<(String, BlockSequence)> {
        self.saves.borrow().last().cloned()
    }

    pub(crate) fn variable_writes(&self) -> usize {
        self.variable_writes.get()
    }

    pub(crate) fn stored(&self, agent_id: &str) -> Option<Agent> {
        self.agents.borrow().get(agent_id).cloned()
    }

    pub(crate) fn seed(&self, agent: Agent) {
        self.agents.borrow_mut().insert(agent.id.clone(), agent);
    }
}

impl AgentPersistence for RecordingPersistence {
    fn create_agent(&self, name: &str, owner: &str) -> Result<Agent> {
        let agent = Agent::new(name, owner);
        self.seed(agent.clone());
        Ok(agent)
    }

    fn load_agent(&self, id: &str) -> Result<Agent> {
        self.stored(id)
            .ok_or_else(|| StorageError::not_found("agent", id))
    }

    fn save_agent(&self, id: &str, blocks: &BlockSequence) -> Result<()> {
        self.saves.borrow_mut().push((id.to_owned(), blocks.clone()));
        if self.fail_saves.get() {
            return Err(StorageError::Connection("database is locked".into()));
        }
        if let Some(agent) = self.agents.borrow_mut().get_mut(id) {
            agent.blocks = blocks.clone();
        }
        Ok(())
    }

    fn put_variable(&self, variable: &Variable) -> Result<()> {
        self.put_variables(std::slice::from_ref(variable))
    }

    /// Counts successful writes only; a rejected batch writes nothing.
    fn put_variables(&self, variables: &[Variable]) -> Result<()> {
        if !self.variable_write_allowed(variables.len()) {
            return Err(StorageError::Connection("database is locked".into()));
        }
        self.variable_writes
            .set(self.variable_writes.get() + variables.len());
        Ok(())
    }

    fn delete_variable(&self, _agent_id: &str, _id: &str) -> Result<()> {
        if !self.variable_write_allowed(1) {
            return Err(StorageError::Connection("database is locked".into()));
        }
        self.variable_writes.set(self.variable_writes.get() + 1);
        Ok(())
    }
}
