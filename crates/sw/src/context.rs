//! Runtime context for command execution.
//!
//! [`RuntimeContext`] holds what the global flags say. Commands that touch
//! data turn it into a [`Workspace`]: the discovered `.stepwise/` directory,
//! its layered configuration, and an open store.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use stepwise_config::{StepwiseConfig, find_stepwise_dir_or_error, load_config};
use stepwise_session::{EditorSession, SessionOptions, SystemClock};
use stepwise_storage::{SqliteStore, Storage};
use tracing::debug;

use crate::cli::GlobalArgs;

/// Store config key holding the id of the agent commands act on by default.
pub const ACTIVE_AGENT_KEY: &str = "active_agent";

/// Runtime context passed to every command handler.
#[derive(Debug)]
pub struct RuntimeContext {
    /// Database path from `--db`, overriding the configured one.
    pub db_path: Option<PathBuf>,

    /// Owner from `--owner`.
    pub owner: Option<String>,

    /// Whether `--json` was given.
    pub json: bool,

    pub verbose: bool,

    /// Suppress non-essential output.
    pub quiet: bool,
}

impl RuntimeContext {
    /// Build a `RuntimeContext` from parsed global arguments.
    pub fn from_global_args(global: &GlobalArgs) -> Self {
        Self {
            db_path: global.db.clone(),
            owner: global.owner.clone(),
            json: global.json,
            verbose: global.verbose,
            quiet: global.quiet,
        }
    }

    /// Discovers `.stepwise/` from the current directory, loads its config
    /// and opens the store.
    pub fn open_workspace(&self) -> Result<Workspace> {
        let cwd = env::current_dir().context("failed to get current directory")?;
        let dir = find_stepwise_dir_or_error(&cwd)?;
        let config = load_config(&dir)
            .with_context(|| format!("failed to load config from {}", dir.display()))?;

        let db_path = self
            .db_path
            .clone()
            .unwrap_or_else(|| config.db_path(&dir));
        debug!(db = %db_path.display(), "opening workspace");
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("failed to open database {}", db_path.display()))?;

        Ok(Workspace {
            owner: resolve_owner(self.owner.as_deref(), config.owner.as_deref()),
            json: self.json || config.json,
            quiet: self.quiet,
            dir,
            config,
            store,
        })
    }
}

/// An initialized project: config plus an open store.
pub struct Workspace {
    /// The `.stepwise/` directory.
    pub dir: PathBuf,
    pub config: StepwiseConfig,
    pub store: SqliteStore,
    /// Owner recorded on new agents and templates.
    pub owner: String,
    /// JSON output, from `--json` or the `json` config key.
    pub json: bool,
    pub quiet: bool,
}

impl Workspace {
    /// The active agent id, if one is set.
    pub fn active_agent_id(&self) -> Result<Option<String>> {
        match self.store.get_config(ACTIVE_AGENT_KEY) {
            Ok(id) => Ok((!id.is_empty()).then_some(id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_active_agent(&self, id: &str) -> Result<()> {
        self.store.set_config(ACTIVE_AGENT_KEY, id)?;
        Ok(())
    }

    /// Returns `explicit` or the active agent id.
    pub fn resolve_agent_id(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(id) = explicit {
            return Ok(id.to_string());
        }
        match self.active_agent_id()? {
            Some(id) => Ok(id),
            None => bail!("no active agent (pass --agent or run 'sw agent use <id>')"),
        }
    }

    /// Session knobs taken from the configuration.
    pub fn session_options(&self) -> Result<SessionOptions> {
        Ok(SessionOptions {
            owner: self.owner.clone(),
            autosave_interval: self.config.autosave_interval(),
            edit_mode: self.config.autosave.edit_mode,
            parser: self.config.reference_parser()?,
        })
    }

    /// Opens an editor session on `explicit` or the active agent, with the
    /// store's sources loaded for reference resolution.
    pub fn into_session(
        self,
        explicit: Option<&str>,
    ) -> Result<EditorSession<SqliteStore, SystemClock>> {
        let agent_id = self.resolve_agent_id(explicit)?;
        let options = self.session_options()?;
        let sources = self.store.list_sources()?;
        let mut session = EditorSession::open(self.store, SystemClock::new(), options, &agent_id)
            .with_context(|| format!("failed to open agent {agent_id}"))?;
        session.set_sources(sources);
        Ok(session)
    }
}

/// Resolves the owner name.
///
/// Priority: `--owner` flag > `owner` config (file or `STEPWISE_OWNER`) >
/// `$USER` > empty.
pub fn resolve_owner(flag: Option<&str>, configured: Option<&str>) -> String {
    [flag, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| env::var("USER").ok().filter(|u| !u.is_empty()))
        .unwrap_or_default()
}
