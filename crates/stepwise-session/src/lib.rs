//! Editing lifecycle for stepwise agents.
//!
//! [`SaveController`] decides when the live block list is written back and
//! guarantees at most one write in flight. [`EditorSession`] ties an agent,
//! its sources and the controller to a persistence backend.

pub mod autosave;
pub mod clock;
pub mod error;
pub mod execution;
pub mod instantiate;
pub mod persistence;
pub mod session;

#[cfg(test)]
mod testing;

pub use autosave::{SaveController, SaveOutcome, SaveState, SaveTicket, SaveTrigger, SkipReason};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use execution::{BlockResult, ExecutionReport};
pub use instantiate::instantiate_template;
pub use persistence::AgentPersistence;
pub use session::{BoundSource, EditorSession, ResolvedField, SessionOptions, bind_sources};
