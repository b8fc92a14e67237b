//! Storage and Transaction traits -- the public API for agent persistence.
//!
//! Consumers depend on these traits rather than on concrete implementations so
//! that alternative backends (fakes in tests, remote stores) can be
//! substituted.

use std::collections::HashMap;

use stepwise_core::{
    Agent, AgentSummary, BlockSequence, Source, SourceNickname, SourceRegistry, Template, Variable,
};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// Primary storage interface for agents, templates and sources.
pub trait Storage: Send + Sync {
    // -- Agents --------------------------------------------------------------

    /// Creates an empty agent and returns it.
    fn create_agent(&self, name: &str, owner: &str) -> Result<Agent>;

    /// Stores a fully built agent together with its variables.
    fn insert_agent(&self, agent: &Agent) -> Result<()>;

    /// Loads an agent with its blocks and variables.
    fn load_agent(&self, id: &str) -> Result<Agent>;

    /// Replaces the stored block list of an agent.
    ///
    /// Every variable reference in `blocks` must name a stored variable of
    /// the same agent.
    fn save_agent(&self, id: &str, blocks: &BlockSequence) -> Result<()>;

    /// Deletes an agent and, by cascade, its variables.
    fn delete_agent(&self, id: &str) -> Result<()>;

    /// Lists agents, optionally restricted to one owner, newest first.
    fn list_agents(&self, owner: Option<&str>) -> Result<Vec<AgentSummary>>;

    /// Renames an agent.
    fn rename_agent(&self, id: &str, name: &str) -> Result<()>;

    // -- Variables -----------------------------------------------------------

    /// Inserts or updates a variable of an existing agent.
    fn put_variable(&self, variable: &Variable) -> Result<()>;

    /// Deletes a variable of the given agent.
    fn delete_variable(&self, agent_id: &str, id: &str) -> Result<()>;

    /// Returns an agent's variables in creation order.
    fn list_variables(&self, agent_id: &str) -> Result<Vec<Variable>>;

    // -- Templates -----------------------------------------------------------

    fn create_template(&self, template: &Template) -> Result<()>;
    fn get_template(&self, id: &str) -> Result<Template>;
    fn list_templates(&self) -> Result<Vec<Template>>;
    fn delete_template(&self, id: &str) -> Result<()>;

    // -- Sources -------------------------------------------------------------

    /// Inserts or replaces a source. An existing nickname is kept.
    fn put_source(&self, name: &str, source: &Source) -> Result<()>;

    fn get_source(&self, name: &str) -> Result<Source>;

    /// Attaches a display nickname to a stored source.
    fn set_source_nickname(&self, name: &str, nickname: &SourceNickname) -> Result<()>;

    /// Returns every source and nickname as a registry.
    fn list_sources(&self) -> Result<SourceRegistry>;

    /// Deletes a source together with its nickname.
    fn delete_source(&self, name: &str) -> Result<()>;

    // -- Configuration -------------------------------------------------------

    /// Sets a configuration key-value pair.
    fn set_config(&self, key: &str, value: &str) -> Result<()>;

    /// Gets a configuration value by key.
    fn get_config(&self, key: &str) -> Result<String>;

    /// Returns all configuration key-value pairs.
    fn get_all_config(&self) -> Result<HashMap<String, String>>;

    // -- Transactions --------------------------------------------------------

    /// Executes a closure within a database transaction.
    ///
    /// If the closure returns `Ok`, the transaction is committed.
    /// If it returns `Err` or panics, the transaction is rolled back.
    fn run_in_transaction(&self, f: &dyn Fn(&dyn Transaction) -> Result<()>) -> Result<()>;

    // -- Lifecycle -----------------------------------------------------------

    /// Closes the database connection and releases resources.
    fn close(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Transaction trait
// ---------------------------------------------------------------------------

/// Subset of [`Storage`] methods available inside a transaction.
///
/// All operations share a single database connection and are committed or
/// rolled back atomically.
pub trait Transaction {
    fn insert_agent(&self, agent: &Agent) -> Result<()>;
    fn load_agent(&self, id: &str) -> Result<Agent>;
    fn save_agent(&self, id: &str, blocks: &BlockSequence) -> Result<()>;
    fn delete_agent(&self, id: &str) -> Result<()>;

    fn put_variable(&self, variable: &Variable) -> Result<()>;
    fn delete_variable(&self, agent_id: &str, id: &str) -> Result<()>;

    fn get_template(&self, id: &str) -> Result<Template>;

    fn set_config(&self, key: &str, value: &str) -> Result<()>;
    fn get_config(&self, key: &str) -> Result<String>;
    fn set_metadata(&self, key: &str, value: &str) -> Result<()>;
    fn get_metadata(&self, key: &str) -> Result<String>;
}
