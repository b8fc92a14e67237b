//! Templates and template instantiation.
//!
//! A template is a frozen copy of an agent's blocks and variables. Its ids
//! form a private namespace: instantiating it builds a fresh agent in which
//! every block and variable gets a new id, and every variable reference in
//! the cloned blocks is rewritten through the old-to-new table.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::block::Block;
use crate::error::{CoreError, Result};
use crate::idgen::{fresh_id, prefixes, unique_id};
use crate::variable::Variable;

/// Name suffix for agents created from a template without an explicit name.
pub const FROM_TEMPLATE_SUFFIX: &str = " (from template)";

/// Immutable snapshot of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl Template {
    /// Captures the agent's current blocks and variables. Variable values are
    /// reset; ids are kept as the template's own namespace.
    pub fn snapshot(
        agent: &Agent,
        name: impl Into<String>,
        description: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let variables = agent
            .variables
            .iter()
            .map(|v| {
                let mut v = v.clone();
                v.reset_value();
                v
            })
            .collect();
        Self {
            id: fresh_id(prefixes::TEMPLATE, &name),
            name,
            description: description.into(),
            created_by: created_by.into(),
            created_at: Utc::now(),
            blocks: agent.blocks.iter().cloned().collect(),
            variables,
        }
    }

    /// Name given to an agent instantiated without an explicit one.
    pub fn default_agent_name(&self) -> String {
        format!("{}{}", self.name, FROM_TEMPLATE_SUFFIX)
    }
}

/// A freshly built agent plus the id tables used to build it.
#[derive(Debug, Clone)]
pub struct InstantiatedAgent {
    pub agent: Agent,
    /// Template variable id -> new variable id.
    pub variable_ids: HashMap<String, String>,
    /// Template block id -> new block id.
    pub block_ids: HashMap<String, String>,
}

/// Builds a new agent from `template`.
///
/// Fails without side effects if the template is internally inconsistent
/// (a block references a variable the template does not carry, or two
/// blocks share a number).
pub fn instantiate(
    template: &Template,
    new_agent_id: &str,
    new_name: Option<&str>,
    owner: &str,
) -> Result<InstantiatedAgent> {
    let name = match new_name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_owned(),
        _ => template.default_agent_name(),
    };
    let mut agent = Agent::with_id(new_agent_id, name, owner);

    // Pass 1: allocate a fresh id for every template variable.
    let old_ids: HashSet<&str> = template.variables.iter().map(|v| v.id.as_str()).collect();
    let mut variable_ids: HashMap<String, String> = HashMap::new();
    for var in &template.variables {
        let new_id = unique_id(prefixes::VARIABLE, &var.name, |c| {
            old_ids.contains(c) || variable_ids.values().any(|issued| issued == c)
        })?;
        variable_ids.insert(var.id.clone(), new_id);
    }

    for var in &template.variables {
        let mut fresh = var.clone();
        fresh.id = variable_ids
            .get(&var.id)
            .cloned()
            .ok_or_else(|| CoreError::VariableNotFound(var.id.clone()))?;
        fresh.agent_id = new_agent_id.to_owned();
        fresh.reset_value();
        agent.variables.insert(fresh)?;
    }

    // Pass 2: clone blocks through the remap table.
    let mut block_ids = HashMap::new();
    for block in &template.blocks {
        if let Some(missing) = block
            .variable_refs()
            .into_iter()
            .find(|id| !variable_ids.contains_key(*id))
        {
            return Err(CoreError::VariableNotFound(missing.to_owned()));
        }
        let mut clone = block.clone();
        clone.id = fresh_id(prefixes::BLOCK, &block.id);
        clone.remap_variable_refs(&variable_ids);
        block_ids.insert(block.id.clone(), clone.id.clone());
        agent.insert_block(clone, Some(block.block_number))?;
    }

    Ok(InstantiatedAgent {
        agent,
        variable_ids,
        block_ids,
    })
}
