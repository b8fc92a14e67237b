//! `sw init` -- initialize a `.stepwise` directory in the current directory.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use stepwise_config::config::CONFIG_FILE_NAME;
use stepwise_config::{StepwiseConfig, ensure_stepwise_dir, load_config, save_config};
use stepwise_storage::SqliteStore;

use crate::cli::InitArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

const GITIGNORE_CONTENT: &str = r#"# Stepwise database files
*.db
*.db-journal
*.db-wal
*.db-shm
"#;

/// Execute the `sw init` command.
pub fn run(ctx: &RuntimeContext, args: &InitArgs) -> Result<()> {
    let cwd = env::current_dir().context("failed to get current directory")?;
    let stepwise_dir = ensure_stepwise_dir(&cwd)
        .with_context(|| format!("failed to create {}", cwd.join(".stepwise").display()))?;

    let config_path = stepwise_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        let config = StepwiseConfig {
            owner: ctx.owner.clone(),
            ..StepwiseConfig::default()
        };
        save_config(&stepwise_dir, &config)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
    }
    let config = load_config(&stepwise_dir)?;

    let db_path = ctx
        .db_path
        .clone()
        .unwrap_or_else(|| config.db_path(&stepwise_dir));
    if db_path.exists() {
        if !args.force {
            bail!(
                "Found existing database at {}\n\n\
                 This directory is already initialized.\n\
                 Use --force to start over with an empty database.",
                db_path.display()
            );
        }
        remove_database(&db_path)?;
    }

    let gitignore_path = stepwise_dir.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(&gitignore_path, GITIGNORE_CONTENT).with_context(|| {
            format!("failed to create .gitignore: {}", gitignore_path.display())
        })?;
    }

    SqliteStore::open(&db_path)
        .with_context(|| format!("failed to create database: {}", db_path.display()))?;

    if ctx.json || config.json {
        output_json(&serde_json::json!({
            "path": stepwise_dir.display().to_string(),
            "database": db_path.display().to_string(),
        }));
    } else if !ctx.quiet {
        println!("Initialized stepwise in {}", stepwise_dir.display());
        println!("  Database: {}", db_path.display());
        println!();
        println!("Run `sw agent create \"My agent\" --use` to get started.");
    }
    Ok(())
}

/// Removes a database file and its WAL side files.
fn remove_database(db_path: &Path) -> Result<()> {
    fs::remove_file(db_path)
        .with_context(|| format!("failed to remove {}", db_path.display()))?;
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut side = db_path.as_os_str().to_owned();
        side.push(suffix);
        let side = Path::new(&side);
        if side.exists() {
            fs::remove_file(side)
                .with_context(|| format!("failed to remove {}", side.display()))?;
        }
    }
    Ok(())
}
