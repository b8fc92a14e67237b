//! Core types for stepwise agents.
//!
//! This crate holds the workflow model: blocks and their ordered sequence,
//! variables and sources, `@{...}` reference resolution, and template
//! instantiation. It does no I/O.

pub mod agent;
pub mod block;
pub mod enums;
pub mod error;
pub mod idgen;
pub mod reference;
pub mod registry;
pub mod sequence;
pub mod source;
pub mod template;
pub mod validation;
pub mod variable;

pub use agent::{Agent, AgentSummary};
pub use block::{Block, BlockBuilder, BlockKind, BlockUpdates, OutputBinding};
pub use error::CoreError;
pub use reference::{Reference, ReferenceParser, ResolvedText};
pub use registry::{SourceRegistry, VariableRegistry};
pub use sequence::BlockSequence;
pub use source::{Source, SourceNickname};
pub use template::{InstantiatedAgent, Template, instantiate};
pub use variable::{Variable, VariableValue};
