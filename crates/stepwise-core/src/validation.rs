//! Agent and template validation rules.

use std::collections::HashSet;

use crate::agent::Agent;
use crate::template::Template;

/// Error type for validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name is required")]
    NameRequired,

    #[error("name must be 200 characters or less (got {0})")]
    NameTooLong(usize),

    #[error("block {0} has number 0")]
    ZeroBlockNumber(String),

    #[error("block number {0} appears more than once")]
    DuplicateBlockNumber(u32),

    #[error("block {block} belongs to agent {found}, expected {expected}")]
    ForeignBlock {
        block: String,
        found: String,
        expected: String,
    },

    #[error("variable name '{0}' appears more than once")]
    DuplicateVariableName(String),

    #[error("block {block} references unknown variable {variable}")]
    DanglingReference { block: String, variable: String },
}

const MAX_NAME_LEN: usize = 200;

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::NameRequired);
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong(len));
    }
    Ok(())
}

/// Validates the invariants of a persisted agent.
pub fn validate_agent(agent: &Agent) -> Result<(), ValidationError> {
    validate_name(&agent.name)?;

    for block in &agent.blocks {
        if !block.agent_id.is_empty() && block.agent_id != agent.id {
            return Err(ValidationError::ForeignBlock {
                block: block.id.clone(),
                found: block.agent_id.clone(),
                expected: agent.id.clone(),
            });
        }
        for var in block.variable_refs() {
            if !agent.variables.contains(var) {
                return Err(ValidationError::DanglingReference {
                    block: block.id.clone(),
                    variable: var.to_owned(),
                });
            }
        }
    }

    let mut names = HashSet::new();
    for var in &agent.variables {
        if !names.insert(var.name.as_str()) {
            return Err(ValidationError::DuplicateVariableName(var.name.clone()));
        }
    }
    Ok(())
}

/// Validates a template before it is stored.
pub fn validate_template(template: &Template) -> Result<(), ValidationError> {
    validate_name(&template.name)?;

    let var_ids: HashSet<&str> = template.variables.iter().map(|v| v.id.as_str()).collect();
    let mut names = HashSet::new();
    for var in &template.variables {
        if !names.insert(var.name.as_str()) {
            return Err(ValidationError::DuplicateVariableName(var.name.clone()));
        }
    }

    let mut numbers = HashSet::new();
    for block in &template.blocks {
        if block.block_number == 0 {
            return Err(ValidationError::ZeroBlockNumber(block.id.clone()));
        }
        if !numbers.insert(block.block_number) {
            return Err(ValidationError::DuplicateBlockNumber(block.block_number));
        }
        for var in block.variable_refs() {
            if !var_ids.contains(var) {
                return Err(ValidationError::DanglingReference {
                    block: block.id.clone(),
                    variable: var.to_owned(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, BlockKind};
    use crate::enums::VariableKind;
    use crate::variable::Variable;
    use chrono::Utc;

    #[test]
    fn valid_agent_passes() {
        let mut agent = Agent::new("Fine", "");
        let v = agent.add_variable("x", VariableKind::Input).unwrap();
        agent
            .add_block(Block::builder(BlockKind::Checkpoint).output_variable(v.id).build())
            .unwrap();
        assert!(validate_agent(&agent).is_ok());
    }

    #[test]
    fn empty_name_fails() {
        let agent = Agent::new("  ", "");
        assert_eq!(validate_agent(&agent), Err(ValidationError::NameRequired));
    }

    #[test]
    fn long_name_fails() {
        let agent = Agent::new("x".repeat(201), "");
        assert_eq!(validate_agent(&agent), Err(ValidationError::NameTooLong(201)));
    }

    #[test]
    fn template_checks() {
        let block = |n: u32, var: &str| {
            Block::builder(BlockKind::Checkpoint)
                .block_number(n)
                .output_variable(var)
                .build()
        };
        let mut template = Template {
            id: "tpl-1".into(),
            name: "T".into(),
            description: String::new(),
            created_by: String::new(),
            created_at: Utc::now(),
            blocks: vec![block(1, "v1"), block(2, "v1")],
            variables: vec![Variable::new("v1", "x", VariableKind::Input)],
        };
        assert!(validate_template(&template).is_ok());

        template.blocks.push(block(2, "v1"));
        assert_eq!(
            validate_template(&template),
            Err(ValidationError::DuplicateBlockNumber(2))
        );

        template.blocks.pop();
        template.blocks.push(block(3, "v9"));
        assert!(matches!(
            validate_template(&template),
            Err(ValidationError::DanglingReference { .. })
        ));
    }
}
