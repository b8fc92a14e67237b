//! `sw results` -- merge an execution report into its agent.
//!
//! The report names its agent; block statuses and outputs are recorded and
//! outputs flow into the variables the blocks are bound to.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use stepwise_session::ExecutionReport;

use crate::cli::ResultsArgs;
use crate::commands::commit;
use crate::context::RuntimeContext;
use crate::output::output_json;
use crate::styles::render_save_outcome;

/// Execute the `sw results` command.
pub fn run(ctx: &RuntimeContext, args: &ResultsArgs) -> Result<()> {
    let report = read_report(&args.file)?;
    let ws = ctx.open_workspace()?;
    let (json, quiet) = (ws.json, ws.quiet);

    let mut session = ws.into_session(Some(&report.agent_id))?;
    let applied = session.apply_execution_report(&report)?;
    let outcome = commit(&mut session)?;

    if json {
        output_json(&serde_json::json!({
            "agent_id": report.agent_id,
            "applied": applied,
            "ignored": report.results.len() - applied,
            "save": outcome,
        }));
    } else if !quiet {
        println!(
            "Applied {applied} of {} results to agent {}",
            report.results.len(),
            report.agent_id
        );
        println!("{}", render_save_outcome(&outcome));
    }
    Ok(())
}

fn read_report(path: &Path) -> Result<ExecutionReport> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read report from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    };
    ExecutionReport::from_json(&raw).context("invalid execution report")
}
