//! Command handlers, one module per subcommand.

pub mod agent;
pub mod block;
pub mod completion;
pub mod init;
pub mod resolve;
pub mod results;
pub mod source;
pub mod template;
pub mod var;
pub mod version;

use anyhow::{Result, bail};
use stepwise_session::{EditorSession, SaveOutcome, SystemClock};
use stepwise_storage::SqliteStore;

/// Session type every editing command works through.
pub type Session = EditorSession<SqliteStore, SystemClock>;

/// Writes the session's block edits with a manual save.
///
/// A failed write fails the command; the store keeps its previous blocks.
pub fn commit(session: &mut Session) -> Result<SaveOutcome> {
    let outcome = session.manual_save(|| None)?;
    if let SaveOutcome::Failed { message, .. } = &outcome {
        bail!("failed to save agent {}: {message}", session.agent().id);
    }
    Ok(outcome)
}
