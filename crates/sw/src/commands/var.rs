//! `sw var` -- manage an agent's variables.
//!
//! Variable edits are written through immediately; they do not wait for a
//! block save.

use anyhow::{Context, Result, anyhow};
use stepwise_core::enums::VariableKind;
use stepwise_core::variable::TableRow;
use stepwise_core::{Variable, VariableValue};

use crate::cli::{VarAddArgs, VarArgs, VarCommands, VarRenameArgs, VarSetArgs};
use crate::commands::Session;
use crate::context::RuntimeContext;
use crate::output::{VARIABLE_HEADERS, output_json, output_table, variable_row};
use crate::styles::render_accent;

/// Execute the `sw var` command.
pub fn run(ctx: &RuntimeContext, args: &VarArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let (json, quiet) = (ws.json, ws.quiet);
    let mut session = ws.into_session(args.agent.as_deref())?;

    let (verb, changed) = match &args.command {
        VarCommands::Add(a) => ("Added", cmd_add(&mut session, a)?),
        VarCommands::Remove(a) => {
            let id = variable_id(&session, &a.variable)?;
            ("Removed", session.remove_variable(&id)?)
        }
        VarCommands::Set(a) => ("Set", cmd_set(&mut session, a)?),
        VarCommands::Rename(a) => ("Renamed", cmd_rename(&mut session, a)?),
        VarCommands::List => return cmd_list(&session, json),
    };

    if json {
        output_json(&changed);
    } else if !quiet {
        println!(
            "{verb} variable {} ({})",
            changed.name,
            render_accent(&changed.id)
        );
    }
    Ok(())
}

fn cmd_list(session: &Session, json: bool) -> Result<()> {
    let variables: Vec<&Variable> = session.agent().variables.iter().collect();
    if json {
        output_json(&variables);
    } else if variables.is_empty() {
        println!("No variables.");
    } else {
        let rows: Vec<Vec<String>> = variables.into_iter().map(variable_row).collect();
        output_table(VARIABLE_HEADERS, &rows);
    }
    Ok(())
}

fn cmd_add(session: &mut Session, args: &VarAddArgs) -> Result<Variable> {
    let kind: VariableKind = args.kind.parse()?;
    Ok(session.add_variable(&args.name, kind)?)
}

fn cmd_set(session: &mut Session, args: &VarSetArgs) -> Result<Variable> {
    let variable = session
        .agent()
        .variables
        .find(&args.variable)
        .with_context(|| format!("variable '{}' not found", args.variable))?;
    let value = parse_value(variable.kind, &args.value)?;
    let id = variable.id.clone();
    Ok(session.set_variable_value(&id, value)?)
}

fn cmd_rename(session: &mut Session, args: &VarRenameArgs) -> Result<Variable> {
    let id = variable_id(session, &args.variable)?;
    Ok(session.rename_variable(&id, &args.name)?)
}

fn variable_id(session: &Session, reference: &str) -> Result<String> {
    session
        .agent()
        .variables
        .find(reference)
        .map(|v| v.id.clone())
        .ok_or_else(|| anyhow!("variable '{reference}' not found"))
}

/// Parses a command-line value for a variable of `kind`.
///
/// Table variables take a JSON array of row objects; `""` clears them.
fn parse_value(kind: VariableKind, raw: &str) -> Result<VariableValue> {
    match kind {
        VariableKind::Table if raw.trim().is_empty() => Ok(VariableValue::Table(Vec::new())),
        VariableKind::Table => {
            let rows: Vec<TableRow> = serde_json::from_str(raw)
                .context("table values must be a JSON array of objects")?;
            Ok(VariableValue::Table(rows))
        }
        VariableKind::Input | VariableKind::Intermediate => Ok(VariableValue::Text(raw.to_string())),
    }
}
