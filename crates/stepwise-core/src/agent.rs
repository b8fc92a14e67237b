//! The agent aggregate: identity, blocks and variables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockUpdates};
use crate::enums::VariableKind;
use crate::error::{CoreError, Result};
use crate::idgen::{fresh_id, prefixes};
use crate::registry::VariableRegistry;
use crate::sequence::BlockSequence;
use crate::variable::{Variable, VariableValue};

/// An agent and everything it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub blocks: BlockSequence,
    #[serde(default)]
    pub variables: VariableRegistry,
}

/// Listing row for an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub block_count: usize,
}

impl Agent {
    /// Creates an empty agent with a fresh id.
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_id(fresh_id(prefixes::AGENT, &name), name, owner)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>, owner: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            owner: owner.into(),
            created_at: now,
            updated_at: now,
            blocks: BlockSequence::new(),
            variables: VariableRegistry::new(),
        }
    }

    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            owner: self.owner.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            block_count: self.blocks.len(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn check_refs<'a>(&self, refs: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for id in refs {
            if !self.variables.contains(id) {
                return Err(CoreError::VariableNotFound(id.to_owned()));
            }
        }
        Ok(())
    }

    // -- blocks -------------------------------------------------------------

    /// Appends a block under the next free number.
    pub fn add_block(&mut self, block: Block) -> Result<u32> {
        self.insert_block(block, None)
    }

    /// Inserts a block, scoping it to this agent. Every variable it
    /// references must exist.
    pub fn insert_block(&mut self, mut block: Block, number: Option<u32>) -> Result<u32> {
        self.check_refs(block.variable_refs())?;
        block.agent_id = self.id.clone();
        let n = self.blocks.insert(block, number)?;
        self.touch();
        Ok(n)
    }

    pub fn remove_block(&mut self, number: u32) -> Result<Block> {
        let block = self.blocks.remove(number)?;
        self.touch();
        Ok(block)
    }

    pub fn update_block(&mut self, number: u32, updates: BlockUpdates) -> Result<&Block> {
        self.check_refs(updates.variable_refs())?;
        self.blocks.update(number, updates)?;
        self.touch();
        self.blocks.get(number).ok_or(CoreError::BlockNotFound(number))
    }

    pub fn duplicate_block(&mut self, number: u32) -> Result<u32> {
        let n = self.blocks.duplicate(number)?;
        self.touch();
        Ok(n)
    }

    pub fn reorder_blocks(&mut self, from: usize, to: usize) -> Result<()> {
        self.blocks.reorder(from, to)?;
        self.touch();
        Ok(())
    }

    /// Replaces the whole block list, e.g. with a persisted copy.
    pub fn replace_blocks(&mut self, blocks: BlockSequence) {
        self.blocks = blocks;
        for block in self.blocks.iter_mut() {
            block.agent_id = self.id.clone();
        }
    }

    // -- variables ----------------------------------------------------------

    pub fn add_variable(&mut self, name: &str, kind: VariableKind) -> Result<Variable> {
        let agent_id = self.id.clone();
        let id = self.variables.add_variable(name, kind)?.id.clone();
        self.variables.assign_agent(&agent_id);
        self.touch();
        self.variables
            .get(&id)
            .cloned()
            .ok_or(CoreError::VariableNotFound(id))
    }

    /// Removes a variable that no block references.
    pub fn remove_variable(&mut self, id: &str) -> Result<Variable> {
        if let Some(block) = self.blocks.first_referencing(id) {
            return Err(CoreError::VariableInUse {
                id: id.to_owned(),
                block_number: block.block_number,
            });
        }
        let removed = self.variables.remove_variable(id)?;
        self.touch();
        Ok(removed)
    }

    pub fn set_variable_value(&mut self, id: &str, value: VariableValue) -> Result<Variable> {
        let variable = self.variables.set_value(id, value)?.clone();
        self.touch();
        Ok(variable)
    }

    pub fn rename_variable(&mut self, id: &str, name: &str) -> Result<Variable> {
        let variable = self.variables.rename(id, name)?.clone();
        self.touch();
        Ok(variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockKind, OutputBinding, TableTransformPayload};
    use pretty_assertions::assert_eq;

    #[test]
    fn new_agent_is_empty() {
        let agent = Agent::new("Research", "ada");
        assert!(agent.id.starts_with("ag-"));
        assert!(agent.blocks.is_empty());
        assert_eq!(agent.summary().block_count, 0);
    }

    #[test]
    fn add_block_scopes_to_agent() {
        let mut agent = Agent::new("A", "");
        let n = agent.add_block(Block::builder(BlockKind::Checkpoint).build()).unwrap();
        assert_eq!(n, 1);
        assert_eq!(agent.blocks.get(1).unwrap().agent_id, agent.id);
    }

    #[test]
    fn add_block_requires_known_variables() {
        let mut agent = Agent::new("A", "");
        let block = Block::builder(BlockKind::Checkpoint).output_variable("var-x").build();
        assert_eq!(
            agent.add_block(block).unwrap_err(),
            CoreError::VariableNotFound("var-x".into())
        );
        assert!(agent.blocks.is_empty());
    }

    #[test]
    fn update_block_requires_known_variables() {
        let mut agent = Agent::new("A", "");
        agent.add_block(Block::builder(BlockKind::Checkpoint).build()).unwrap();
        let err = agent
            .update_block(
                1,
                BlockUpdates {
                    output_variable: Some(Some(OutputBinding::new("var-x"))),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(agent.blocks.get(1).unwrap().output_variable.is_none());
    }

    #[test]
    fn referenced_variable_cannot_be_removed() {
        let mut agent = Agent::new("A", "");
        let table = agent.add_variable("rows", VariableKind::Table).unwrap();
        assert_eq!(table.agent_id, agent.id);

        let block = Block::builder(BlockKind::TableTransform(TableTransformPayload {
            table_variable_id: Some(table.id.clone()),
            ..Default::default()
        }))
        .build();
        agent.add_block(block).unwrap();

        assert_eq!(
            agent.remove_variable(&table.id).unwrap_err(),
            CoreError::VariableInUse {
                id: table.id.clone(),
                block_number: 1
            }
        );

        agent.remove_block(1).unwrap();
        agent.remove_variable(&table.id).unwrap();
        assert!(agent.variables.is_empty());
    }

    #[test]
    fn agent_json_round_trip() {
        let mut agent = Agent::new("A", "ada");
        let out = agent.add_variable("out", VariableKind::Intermediate).unwrap();
        agent
            .add_block(
                Block::builder(BlockKind::Checkpoint)
                    .output_variable(out.id)
                    .build(),
            )
            .unwrap();
        let json = serde_json::to_string(&agent).unwrap();
        let back: Agent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.blocks, agent.blocks);
        assert_eq!(back.variables.len(), 1);
    }
}
