//! Error types for the core model.

/// Contract violations raised by the sequencer, the registries and the
/// template cloner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A caller-supplied block number is already held by another block.
    #[error("block number {0} is already in use")]
    DuplicateBlockNumber(u32),

    /// Block numbers are positive; zero is never a valid key.
    #[error("block number must be positive (got {0})")]
    InvalidBlockNumber(u32),

    /// The highest block number is `u32::MAX`, so no next number exists.
    #[error("no block number is left after 4294967295")]
    BlockNumberExhausted,

    /// No block carries the given number.
    #[error("block {0} not found")]
    BlockNotFound(u32),

    /// A position outside the current sequence was given to a reorder.
    #[error("block index {index} is out of range (sequence has {len} blocks)")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Current length of the sequence.
        len: usize,
    },

    /// A payload update tried to change the kind of a block.
    #[error("cannot replace a {existing} payload with a {requested} payload")]
    KindMismatch {
        /// Kind of the stored block.
        existing: &'static str,
        /// Kind carried by the update.
        requested: &'static str,
    },

    /// No variable carries the given id.
    #[error("variable {0} not found")]
    VariableNotFound(String),

    /// Variable names are unique within one agent.
    #[error("a variable named '{0}' already exists")]
    DuplicateVariableName(String),

    /// Variable ids are unique and never recycled.
    #[error("variable id {0} is already in use")]
    DuplicateVariableId(String),

    /// A variable name was empty after trimming.
    #[error("variable name is required")]
    VariableNameRequired,

    /// The variable is still bound by at least one block.
    #[error("variable {id} is still referenced by block {block_number}")]
    VariableInUse {
        /// The variable id.
        id: String,
        /// The first block that references it.
        block_number: u32,
    },

    /// No source is registered under the given name.
    #[error("source '{0}' not found")]
    SourceNotFound(String),

    /// A date format string contained an unknown specifier.
    #[error("invalid date format '{0}'")]
    InvalidDateFormat(String),

    /// The id generator could not find a free identifier.
    #[error("failed to generate a unique {0} id")]
    IdExhausted(&'static str),
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Returns `true` for the "not found" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BlockNotFound(_) | Self::VariableNotFound(_) | Self::SourceNotFound(_)
        )
    }
}
