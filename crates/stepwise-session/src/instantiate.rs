//! Creating agents from stored templates.

use stepwise_core::idgen::{prefixes, unique_id};
use stepwise_core::{InstantiatedAgent, instantiate};
use stepwise_storage::Storage;
use tracing::info;

use crate::error::{Result, SessionError};

/// Clones a stored template into a new agent and commits the agent with
/// all of its variables in one transaction.
///
/// On any failure nothing is written and
/// [`SessionError::Instantiation`] is returned.
pub fn instantiate_template<S: Storage + ?Sized>(
    storage: &S,
    template_id: &str,
    new_name: Option<&str>,
    owner: &str,
) -> Result<InstantiatedAgent> {
    let failed = |reason: String| SessionError::Instantiation {
        template_id: template_id.to_owned(),
        reason,
    };

    let template = storage
        .get_template(template_id)
        .map_err(|e| failed(e.to_string()))?;
    let agent_id = unique_id(prefixes::AGENT, &template.name, |candidate| {
        storage.load_agent(candidate).is_ok()
    })
    .map_err(|e| failed(e.to_string()))?;

    let instantiated =
        instantiate(&template, &agent_id, new_name, owner).map_err(|e| failed(e.to_string()))?;
    commit(storage, &instantiated).map_err(|e| failed(e.to_string()))?;

    info!(
        template_id,
        agent_id = %instantiated.agent.id,
        blocks = instantiated.agent.blocks.len(),
        variables = instantiated.agent.variables.len(),
        "instantiated template"
    );
    Ok(instantiated)
}

fn commit<S: Storage + ?Sized>(
    storage: &S,
    instantiated: &InstantiatedAgent,
) -> stepwise_storage::error::Result<()> {
    storage.run_in_transaction(&|tx| tx.insert_agent(&instantiated.agent))
}
