//! Error types for the session layer.

use stepwise_core::CoreError;
use stepwise_storage::StorageError;

/// Errors raised by [`EditorSession`](crate::EditorSession) and template
/// instantiation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operation needs a persisted agent and the session has none.
    #[error("no active agent")]
    NoActiveAgent,

    /// An execution report addressed a different agent.
    #[error("execution report is for agent {actual}, active agent is {expected}")]
    ForeignReport { expected: String, actual: String },

    /// A model rule was violated. Nothing was changed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The backend failed. The in-memory state is unchanged and the
    /// operation may be retried.
    #[error("persistence failed: {0}")]
    Persistence(#[from] StorageError),

    /// Template instantiation failed and was rolled back.
    #[error("could not instantiate template {template_id}: {reason}")]
    Instantiation { template_id: String, reason: String },
}

impl SessionError {
    /// Returns `true` if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
