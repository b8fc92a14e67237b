//! The editor session: one agent being edited against a backend.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use stepwise_core::enums::{SourceKind, VariableKind};
use stepwise_core::error::Result as CoreResult;
use stepwise_core::{
    Agent, Block, BlockSequence, BlockUpdates, CoreError, ReferenceParser, ResolvedText,
    SourceRegistry, Variable, VariableValue,
};
use tracing::{debug, info, warn};

use crate::autosave::{DEFAULT_INTERVAL, SaveController, SaveOutcome, SaveState, SaveTrigger, SkipReason};
use crate::clock::Clock;
use crate::error::{Result, SessionError};
use crate::execution::{ExecutionReport, output_value};
use crate::persistence::AgentPersistence;

/// Knobs for a new [`EditorSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Owner recorded on agents created by this session.
    pub owner: String,
    pub autosave_interval: Duration,
    pub edit_mode: bool,
    pub parser: ReferenceParser,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            owner: String::new(),
            autosave_interval: DEFAULT_INTERVAL,
            edit_mode: true,
            parser: ReferenceParser::default(),
        }
    }
}

/// A source token from a block field and what it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundSource {
    pub token: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SourceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

/// Looks up every source token of `resolved` in `sources`. Tokens with no
/// registered source are reported with `found: false`.
pub fn bind_sources(sources: &SourceRegistry, resolved: &ResolvedText) -> Vec<BoundSource> {
    sources
        .bind(resolved)
        .into_iter()
        .map(|binding| BoundSource {
            token: binding.token.to_owned(),
            found: binding.source.is_some(),
            kind: binding.source.map(|s| s.kind.clone()),
            nickname: sources.nickname(binding.token).map(|n| n.nickname.clone()),
        })
        .collect()
}

/// One resolved text field of a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedField {
    pub field: &'static str,
    #[serde(flatten)]
    pub resolved: ResolvedText,
    pub sources: Vec<BoundSource>,
}

/// Edits one agent and keeps the backend in step.
///
/// Until the first manual save the session edits an unsaved draft; variable
/// edits and execution results need a persisted agent.
pub struct EditorSession<P, C> {
    persistence: P,
    agent: Agent,
    persisted: bool,
    sources: SourceRegistry,
    parser: ReferenceParser,
    owner: String,
    saver: SaveController<C>,
}

impl<P: AgentPersistence, C: Clock> EditorSession<P, C> {
    /// Starts a session on an unsaved draft.
    pub fn new(persistence: P, clock: C, options: SessionOptions) -> Self {
        Self {
            persistence,
            agent: Agent::new("", options.owner.clone()),
            persisted: false,
            sources: SourceRegistry::new(),
            parser: options.parser,
            owner: options.owner,
            saver: SaveController::new(clock, options.autosave_interval, options.edit_mode),
        }
    }

    /// Starts a session on a stored agent.
    pub fn open(persistence: P, clock: C, options: SessionOptions, agent_id: &str) -> Result<Self> {
        let agent = persistence.load_agent(agent_id)?;
        let mut session = Self::new(persistence, clock, options);
        session.adopt(agent);
        Ok(session)
    }

    /// Makes a persisted agent the active one. Its blocks become the saved
    /// snapshot.
    pub fn adopt(&mut self, agent: Agent) {
        debug!(agent_id = %agent.id, blocks = agent.blocks.len(), "adopting agent");
        self.saver.reset(agent.blocks.clone());
        self.agent = agent;
        self.persisted = true;
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// The agent, if it has been persisted.
    pub fn active_agent(&self) -> Option<&Agent> {
        self.persisted.then_some(&self.agent)
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn save_state(&self) -> SaveState {
        self.saver.state()
    }

    pub fn controller(&self) -> &SaveController<C> {
        &self.saver
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn set_sources(&mut self, sources: SourceRegistry) {
        self.sources = sources;
    }

    pub fn parser(&self) -> &ReferenceParser {
        &self.parser
    }

    fn require_persisted(&self) -> Result<()> {
        if self.persisted {
            Ok(())
        } else {
            Err(SessionError::NoActiveAgent)
        }
    }

    fn edited<T>(&mut self, result: CoreResult<T>) -> Result<T> {
        let value = result?;
        self.saver.observe(&self.agent.blocks);
        Ok(value)
    }

    // -- blocks -------------------------------------------------------------

    pub fn add_block(&mut self, block: Block) -> Result<u32> {
        let result = self.agent.add_block(block);
        self.edited(result)
    }

    pub fn insert_block(&mut self, block: Block, number: Option<u32>) -> Result<u32> {
        let result = self.agent.insert_block(block, number);
        self.edited(result)
    }

    pub fn remove_block(&mut self, number: u32) -> Result<Block> {
        let result = self.agent.remove_block(number);
        self.edited(result)
    }

    pub fn update_block(&mut self, number: u32, updates: BlockUpdates) -> Result<Block> {
        let result = self.agent.update_block(number, updates).cloned();
        self.edited(result)
    }

    pub fn duplicate_block(&mut self, number: u32) -> Result<u32> {
        let result = self.agent.duplicate_block(number);
        self.edited(result)
    }

    pub fn reorder_blocks(&mut self, from: usize, to: usize) -> Result<()> {
        let result = self.agent.reorder_blocks(from, to);
        self.edited(result)
    }

    // -- variables ----------------------------------------------------------

    /// Applies `edit` to a copy of the agent, writes the returned variable
    /// through, and only then swaps the copy in.
    fn write_variable(
        &mut self,
        edit: impl FnOnce(&mut Agent) -> CoreResult<Variable>,
    ) -> Result<Variable> {
        self.require_persisted()?;
        let mut draft = self.agent.clone();
        let variable = edit(&mut draft)?;
        self.persistence.put_variable(&variable)?;
        debug!(variable_id = %variable.id, name = %variable.name, "variable written");
        self.agent = draft;
        Ok(variable)
    }

    pub fn add_variable(&mut self, name: &str, kind: VariableKind) -> Result<Variable> {
        self.write_variable(|agent| agent.add_variable(name, kind))
    }

    pub fn set_variable_value(&mut self, id: &str, value: VariableValue) -> Result<Variable> {
        self.write_variable(|agent| agent.set_variable_value(id, value))
    }

    pub fn rename_variable(&mut self, id: &str, name: &str) -> Result<Variable> {
        self.write_variable(|agent| agent.rename_variable(id, name))
    }

    /// Deletes a variable no block references, neither in the live blocks
    /// nor in the last saved ones.
    pub fn remove_variable(&mut self, id: &str) -> Result<Variable> {
        self.require_persisted()?;
        if let Some(block) = self.saver.snapshot().first_referencing(id) {
            return Err(CoreError::VariableInUse {
                id: id.to_owned(),
                block_number: block.block_number,
            }
            .into());
        }
        let mut draft = self.agent.clone();
        let removed = draft.remove_variable(id)?;
        self.persistence.delete_variable(&self.agent.id, id)?;
        self.agent = draft;
        Ok(removed)
    }

    // -- execution results --------------------------------------------------

    /// Merges an execution report into the agent. Block status and output
    /// are recorded, outputs flow into bound variables (written through in
    /// one batch), and the controller re-evaluates dirtiness. If the batch
    /// fails nothing is merged.
    ///
    /// Returns how many results matched a block.
    pub fn apply_execution_report(&mut self, report: &ExecutionReport) -> Result<usize> {
        self.require_persisted()?;
        if report.agent_id != self.agent.id {
            return Err(SessionError::ForeignReport {
                expected: self.agent.id.clone(),
                actual: report.agent_id.clone(),
            });
        }

        let mut draft = self.agent.clone();
        let mut written = Vec::new();
        let mut applied = 0;
        for result in &report.results {
            let Some(block) = draft.blocks.get_mut(result.block_number) else {
                warn!(block_number = result.block_number, "result for unknown block ignored");
                continue;
            };
            block.record_result(result.status, result.output.clone());
            applied += 1;

            let (Some(binding), Some(output)) =
                (block.output_variable.clone(), result.output.as_deref())
            else {
                continue;
            };
            let kind = draft
                .variables
                .get(&binding.variable_id)
                .map(|v| v.kind)
                .ok_or_else(|| CoreError::VariableNotFound(binding.variable_id.clone()))?;
            let value = output_value(kind, &binding, output);
            written.push(draft.set_variable_value(&binding.variable_id, value)?);
        }

        if !written.is_empty() {
            self.persistence.put_variables(&written)?;
        }
        self.agent = draft;
        self.saver.observe(&self.agent.blocks);
        info!(agent_id = %self.agent.id, applied, variables = written.len(), "execution report applied");
        Ok(applied)
    }

    // -- saving -------------------------------------------------------------

    fn save(&mut self, trigger: SaveTrigger) -> SaveOutcome {
        self.saver
            .save_now(trigger, &self.agent.id, &self.agent.blocks, &self.persistence)
    }

    /// Explicit save. With no persisted agent, `prompt_name` is asked for a
    /// name and a new agent is created and adopted first.
    pub fn manual_save(
        &mut self,
        prompt_name: impl FnOnce() -> Option<String>,
    ) -> Result<SaveOutcome> {
        if !self.persisted {
            let name = prompt_name()
                .map(|n| n.trim().to_owned())
                .filter(|n| !n.is_empty());
            let Some(name) = name else {
                return Ok(SaveOutcome::Skipped {
                    reason: SkipReason::Cancelled,
                });
            };
            self.create_from_draft(&name)?;
        }
        Ok(self.save(SaveTrigger::Manual))
    }

    /// Keyboard-shortcut save; needs a persisted agent.
    pub fn shortcut_save(&mut self) -> Result<SaveOutcome> {
        self.require_persisted()?;
        Ok(self.save(SaveTrigger::Shortcut))
    }

    /// Runs a timer save if one is due.
    pub fn poll_autosave(&mut self) -> Option<SaveOutcome> {
        if !self.persisted {
            return None;
        }
        let ticket = self.saver.poll(&self.agent.blocks)?;
        Some(
            self.saver
                .persist(ticket, &self.agent.id, &self.agent.blocks, &self.persistence),
        )
    }

    fn create_from_draft(&mut self, name: &str) -> Result<()> {
        let mut created = self.persistence.create_agent(name, &self.owner)?;
        info!(agent_id = %created.id, name, "created agent from draft");
        created.replace_blocks(std::mem::take(&mut self.agent.blocks));
        self.agent = created;
        self.persisted = true;
        self.saver.reset(BlockSequence::new());
        self.saver.observe(&self.agent.blocks);
        Ok(())
    }

    // -- references ---------------------------------------------------------

    /// Resolves `@{...}` markers in a block's non-empty text fields against
    /// today's date and the session's sources.
    pub fn resolve_block(&self, number: u32) -> Result<Vec<ResolvedField>> {
        self.resolve_block_with(number, |parser, text| parser.resolve(text))
    }

    /// Like [`resolve_block`](Self::resolve_block) for a fixed date.
    pub fn resolve_block_on(&self, number: u32, today: NaiveDate) -> Result<Vec<ResolvedField>> {
        self.resolve_block_with(number, |parser, text| parser.resolve_on(text, today))
    }

    fn resolve_block_with(
        &self,
        number: u32,
        resolve: impl Fn(&ReferenceParser, &str) -> ResolvedText,
    ) -> Result<Vec<ResolvedField>> {
        let block = self
            .agent
            .blocks
            .get(number)
            .ok_or(CoreError::BlockNotFound(number))?;

        let fields = block
            .text_fields()
            .into_iter()
            .filter(|(_, text)| !text.is_empty())
            .map(|(field, text)| {
                let resolved = resolve(&self.parser, text);
                let sources = bind_sources(&self.sources, &resolved);
                ResolvedField {
                    field,
                    resolved,
                    sources,
                }
            })
            .collect();
        Ok(fields)
    }
}
