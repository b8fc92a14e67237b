//! Block types: the typed steps an agent executes in order.
//!
//! A [`Block`] carries the fields every step shares plus a kind-specific
//! payload in [`BlockKind`]. The kind set is closed; adding a kind means
//! touching every exhaustive match in the workspace.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::enums::{BlockStatus, CodeApproval, SearchEngine, TableOperation};
use crate::error::{CoreError, Result};
use crate::idgen::{fresh_id, prefixes};
use crate::source::FilterCriteria;

fn is_false(b: &bool) -> bool {
    !b
}

/// Binds a block's output to a variable (optionally a single column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBinding {
    pub variable_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
}

impl OutputBinding {
    pub fn new(variable_id: impl Into<String>) -> Self {
        Self {
            variable_id: variable_id.into(),
            column_name: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPromptPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_nickname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPayload {
    pub query: String,
    pub engine: SearchEngine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebAnalysisPayload {
    pub url: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_variable_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodePayload {
    pub language: String,
    pub code: String,
    pub approval: CodeApproval,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_variable_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactPayload {
    pub channel: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformPayload {
    pub source_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter_criteria: Vec<FilterCriteria>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableTransformPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_variable_id: Option<String>,
    pub operation: TableOperation,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadsheetPayload {
    pub file_url: String,
    pub sheet_name: String,
    pub range: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationPayload {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepResearchPayload {
    pub topic: String,
    pub engine: SearchEngine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookParameter {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookPayload {
    pub webhook_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<WebhookParameter>,
}

/// Kind-specific payload of a block. Serialized inline with a `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BlockKind {
    AgentPrompt(AgentPromptPayload),
    Search(SearchPayload),
    WebAnalysis(WebAnalysisPayload),
    Code(CodePayload),
    Checkpoint,
    Contact(ContactPayload),
    Transform(TransformPayload),
    TableTransform(TableTransformPayload),
    Spreadsheet(SpreadsheetPayload),
    Presentation(PresentationPayload),
    DeepResearch(DeepResearchPayload),
    Webhook(WebhookPayload),
}

impl Default for BlockKind {
    fn default() -> Self {
        Self::AgentPrompt(AgentPromptPayload::default())
    }
}

impl BlockKind {
    /// Serialized tag of every kind.
    pub const NAMES: &'static [&'static str] = &[
        "agent-prompt",
        "search",
        "web-analysis",
        "code",
        "checkpoint",
        "contact",
        "transform",
        "table-transform",
        "spreadsheet",
        "presentation",
        "deep-research",
        "webhook",
    ];

    /// Returns the serialized tag of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AgentPrompt(_) => "agent-prompt",
            Self::Search(_) => "search",
            Self::WebAnalysis(_) => "web-analysis",
            Self::Code(_) => "code",
            Self::Checkpoint => "checkpoint",
            Self::Contact(_) => "contact",
            Self::Transform(_) => "transform",
            Self::TableTransform(_) => "table-transform",
            Self::Spreadsheet(_) => "spreadsheet",
            Self::Presentation(_) => "presentation",
            Self::DeepResearch(_) => "deep-research",
            Self::Webhook(_) => "webhook",
        }
    }

    /// Returns an empty payload for the given tag.
    pub fn empty(name: &str) -> Option<Self> {
        let kind = match name {
            "agent-prompt" => Self::AgentPrompt(AgentPromptPayload::default()),
            "search" => Self::Search(SearchPayload::default()),
            "web-analysis" => Self::WebAnalysis(WebAnalysisPayload::default()),
            "code" => Self::Code(CodePayload::default()),
            "checkpoint" => Self::Checkpoint,
            "contact" => Self::Contact(ContactPayload::default()),
            "transform" => Self::Transform(TransformPayload::default()),
            "table-transform" => Self::TableTransform(TableTransformPayload::default()),
            "spreadsheet" => Self::Spreadsheet(SpreadsheetPayload::default()),
            "presentation" => Self::Presentation(PresentationPayload::default()),
            "deep-research" => Self::DeepResearch(DeepResearchPayload::default()),
            "webhook" => Self::Webhook(WebhookPayload::default()),
            _ => return None,
        };
        Some(kind)
    }

    /// Returns `true` when both payloads are of the same kind.
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Variable ids referenced from the payload.
    pub fn variable_refs(&self) -> Vec<&str> {
        match self {
            Self::WebAnalysis(p) => p.selected_variable_id.as_deref().into_iter().collect(),
            Self::Code(p) => p.selected_variable_id.as_deref().into_iter().collect(),
            Self::TableTransform(p) => p.table_variable_id.as_deref().into_iter().collect(),
            Self::AgentPrompt(_)
            | Self::Search(_)
            | Self::Checkpoint
            | Self::Contact(_)
            | Self::Transform(_)
            | Self::Spreadsheet(_)
            | Self::Presentation(_)
            | Self::DeepResearch(_)
            | Self::Webhook(_) => Vec::new(),
        }
    }

    fn variable_ref_slots(&mut self) -> Vec<&mut String> {
        let slot = match self {
            Self::WebAnalysis(p) => p.selected_variable_id.as_mut(),
            Self::Code(p) => p.selected_variable_id.as_mut(),
            Self::TableTransform(p) => p.table_variable_id.as_mut(),
            Self::AgentPrompt(_)
            | Self::Search(_)
            | Self::Checkpoint
            | Self::Contact(_)
            | Self::Transform(_)
            | Self::Spreadsheet(_)
            | Self::Presentation(_)
            | Self::DeepResearch(_)
            | Self::Webhook(_) => None,
        };
        slot.into_iter().collect()
    }

    /// Payload fields that may contain `@{...}` markers.
    pub fn text_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::Search(p) => vec![("query", p.query.as_str())],
            Self::WebAnalysis(p) => vec![("prompt", p.prompt.as_str())],
            Self::Contact(p) => vec![
                ("subject", p.subject.as_str()),
                ("body", p.body.as_str()),
            ],
            Self::Spreadsheet(p) => vec![("prompt", p.prompt.as_str())],
            Self::Presentation(p) => vec![("prompt", p.prompt.as_str())],
            Self::DeepResearch(p) => vec![("topic", p.topic.as_str())],
            Self::AgentPrompt(_)
            | Self::Code(_)
            | Self::Checkpoint
            | Self::Transform(_)
            | Self::TableTransform(_)
            | Self::Webhook(_) => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A single step of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub block_number: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_prompt: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub save_as_csv: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub contains_primary_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_response: Option<String>,
    #[serde(default, skip_serializing_if = "BlockStatus::is_default")]
    pub status: BlockStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_variable: Option<OutputBinding>,
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl Block {
    /// Starts a builder for a block of the given kind.
    pub fn builder(kind: BlockKind) -> BlockBuilder {
        BlockBuilder::new(kind)
    }

    /// Every variable id this block references, output binding first.
    pub fn variable_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self
            .output_variable
            .as_ref()
            .map(|b| b.variable_id.as_str())
            .into_iter()
            .collect();
        refs.extend(self.kind.variable_refs());
        refs
    }

    /// Returns `true` if any field of this block references `variable_id`.
    pub fn references(&self, variable_id: &str) -> bool {
        self.variable_refs().contains(&variable_id)
    }

    /// Rewrites every variable reference found in `map`; others stay as-is.
    pub fn remap_variable_refs(&mut self, map: &HashMap<String, String>) {
        if let Some(binding) = self.output_variable.as_mut() {
            if let Some(new_id) = map.get(&binding.variable_id) {
                binding.variable_id = new_id.clone();
            }
        }
        for slot in self.kind.variable_ref_slots() {
            if let Some(new_id) = map.get(slot.as_str()) {
                *slot = new_id.clone();
            }
        }
    }

    /// Text fields that may contain `@{...}` markers, as `(field, text)`.
    pub fn text_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![
            ("system_prompt", self.system_prompt.as_str()),
            ("user_prompt", self.user_prompt.as_str()),
        ];
        fields.extend(self.kind.text_fields());
        fields
    }

    /// Stores the outcome of an execution run on this block.
    pub fn record_result(&mut self, status: BlockStatus, output: Option<String>) {
        self.status = status;
        if output.is_some() {
            self.model_response = output;
        }
    }
}

// ---------------------------------------------------------------------------
// Partial updates
// ---------------------------------------------------------------------------

/// Partial update for a block. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockUpdates {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
    pub save_as_csv: Option<bool>,
    pub skip: Option<bool>,
    pub contains_primary_input: Option<bool>,
    pub model_response: Option<Option<String>>,
    pub status: Option<BlockStatus>,
    pub output_variable: Option<Option<OutputBinding>>,
    pub kind: Option<BlockKind>,
}

impl BlockUpdates {
    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Variable ids introduced by this update.
    pub fn variable_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        if let Some(Some(binding)) = &self.output_variable {
            refs.push(binding.variable_id.as_str());
        }
        if let Some(kind) = &self.kind {
            refs.extend(kind.variable_refs());
        }
        refs
    }

    /// Merges the set fields into `block`.
    ///
    /// Nothing is written if the payload would change the block's kind.
    pub fn apply(self, block: &mut Block) -> Result<()> {
        if let Some(kind) = &self.kind {
            if !kind.same_kind(&block.kind) {
                return Err(CoreError::KindMismatch {
                    existing: block.kind.name(),
                    requested: kind.name(),
                });
            }
        }
        if let Some(v) = self.name {
            block.name = v;
        }
        if let Some(v) = self.system_prompt {
            block.system_prompt = v;
        }
        if let Some(v) = self.user_prompt {
            block.user_prompt = v;
        }
        if let Some(v) = self.save_as_csv {
            block.save_as_csv = v;
        }
        if let Some(v) = self.skip {
            block.skip = v;
        }
        if let Some(v) = self.contains_primary_input {
            block.contains_primary_input = v;
        }
        if let Some(v) = self.model_response {
            block.model_response = v;
        }
        if let Some(v) = self.status {
            block.status = v;
        }
        if let Some(v) = self.output_variable {
            block.output_variable = v;
        }
        if let Some(v) = self.kind {
            block.kind = v;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Block`] with a fluent API.
pub struct BlockBuilder {
    block: Block,
}

impl BlockBuilder {
    /// Creates a builder with a fresh block id and an unassigned number.
    pub fn new(kind: BlockKind) -> Self {
        let id = fresh_id(prefixes::BLOCK, kind.name());
        Self {
            block: Block {
                id,
                agent_id: String::new(),
                block_number: 0,
                name: String::new(),
                system_prompt: String::new(),
                user_prompt: String::new(),
                save_as_csv: false,
                skip: false,
                contains_primary_input: false,
                model_response: None,
                status: BlockStatus::default(),
                output_variable: None,
                kind,
            },
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.block.id = id.into();
        self
    }

    pub fn agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.block.agent_id = agent_id.into();
        self
    }

    pub fn block_number(mut self, n: u32) -> Self {
        self.block.block_number = n;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.block.name = name.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.block.system_prompt = prompt.into();
        self
    }

    pub fn user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.block.user_prompt = prompt.into();
        self
    }

    pub fn save_as_csv(mut self, v: bool) -> Self {
        self.block.save_as_csv = v;
        self
    }

    pub fn skip(mut self, v: bool) -> Self {
        self.block.skip = v;
        self
    }

    pub fn contains_primary_input(mut self, v: bool) -> Self {
        self.block.contains_primary_input = v;
        self
    }

    pub fn output_variable(mut self, variable_id: impl Into<String>) -> Self {
        self.block.output_variable = Some(OutputBinding::new(variable_id));
        self
    }

    pub fn output_binding(mut self, binding: OutputBinding) -> Self {
        self.block.output_variable = Some(binding);
        self
    }

    /// Consumes the builder and returns the block.
    pub fn build(self) -> Block {
        self.block
    }
}
