//! Storage backend for stepwise agents.
//!
//! Provides the [`Storage`] trait and a SQLite implementation ([`SqliteStore`]).

pub mod error;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience.
pub use error::StorageError;
pub use sqlite::SqliteStore;
pub use traits::{Storage, Transaction};

// ---------------------------------------------------------------------------
// Storage trait implementation for SqliteStore
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use stepwise_core::{
    Agent, AgentSummary, BlockSequence, Source, SourceNickname, SourceRegistry, Template, Variable,
};

use crate::error::Result;

impl Storage for SqliteStore {
    fn create_agent(&self, name: &str, owner: &str) -> Result<Agent> {
        self.create_agent_impl(name, owner)
    }

    fn insert_agent(&self, agent: &Agent) -> Result<()> {
        self.insert_agent_impl(agent)
    }

    fn load_agent(&self, id: &str) -> Result<Agent> {
        self.load_agent_impl(id)
    }

    fn save_agent(&self, id: &str, blocks: &BlockSequence) -> Result<()> {
        self.save_agent_impl(id, blocks)
    }

    fn delete_agent(&self, id: &str) -> Result<()> {
        self.delete_agent_impl(id)
    }

    fn list_agents(&self, owner: Option<&str>) -> Result<Vec<AgentSummary>> {
        self.list_agents_impl(owner)
    }

    fn rename_agent(&self, id: &str, name: &str) -> Result<()> {
        self.rename_agent_impl(id, name)
    }

    fn put_variable(&self, variable: &Variable) -> Result<()> {
        self.put_variable_impl(variable)
    }

    fn delete_variable(&self, agent_id: &str, id: &str) -> Result<()> {
        self.delete_variable_impl(agent_id, id)
    }

    fn list_variables(&self, agent_id: &str) -> Result<Vec<Variable>> {
        self.list_variables_impl(agent_id)
    }

    fn create_template(&self, template: &Template) -> Result<()> {
        self.create_template_impl(template)
    }

    fn get_template(&self, id: &str) -> Result<Template> {
        self.get_template_impl(id)
    }

    fn list_templates(&self) -> Result<Vec<Template>> {
        self.list_templates_impl()
    }

    fn delete_template(&self, id: &str) -> Result<()> {
        self.delete_template_impl(id)
    }

    fn put_source(&self, name: &str, source: &Source) -> Result<()> {
        self.put_source_impl(name, source)
    }

    fn get_source(&self, name: &str) -> Result<Source> {
        self.get_source_impl(name)
    }

    fn set_source_nickname(&self, name: &str, nickname: &SourceNickname) -> Result<()> {
        self.set_source_nickname_impl(name, nickname)
    }

    fn list_sources(&self) -> Result<SourceRegistry> {
        self.list_sources_impl()
    }

    fn delete_source(&self, name: &str) -> Result<()> {
        self.delete_source_impl(name)
    }

    fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.set_config_impl(key, value)
    }

    fn get_config(&self, key: &str) -> Result<String> {
        self.get_config_impl(key)
    }

    fn get_all_config(&self) -> Result<HashMap<String, String>> {
        self.get_all_config_impl()
    }

    fn run_in_transaction(&self, f: &dyn Fn(&dyn Transaction) -> Result<()>) -> Result<()> {
        self.run_in_transaction_impl(f)
    }

    fn close(&self) -> Result<()> {
        // The connection closes when the store is dropped.
        Ok(())
    }
}
