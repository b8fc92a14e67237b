//! `sw agent` -- create, list, show, delete, rename and select agents.

use anyhow::{Context, Result, bail};
use stepwise_storage::Storage;

use crate::cli::{AgentArgs, AgentCommands, AgentCreateArgs, AgentListArgs, AgentRenameArgs};
use crate::context::{RuntimeContext, Workspace};
use crate::output::{
    AGENT_HEADERS, BLOCK_HEADERS, VARIABLE_HEADERS, agent_row, block_row, output_json,
    output_table, variable_row,
};
use crate::styles::{render_accent, render_bold, render_muted};

/// Execute the `sw agent` command.
pub fn run(ctx: &RuntimeContext, args: &AgentArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    match &args.command {
        AgentCommands::Create(a) => cmd_create(&ws, a),
        AgentCommands::List(a) => cmd_list(&ws, a),
        AgentCommands::Show(a) => cmd_show(&ws, a.id.as_deref()),
        AgentCommands::Delete(a) => cmd_delete(&ws, &a.id),
        AgentCommands::Rename(a) => cmd_rename(&ws, a),
        AgentCommands::Use(a) => cmd_use(&ws, &a.id),
    }
}

fn cmd_create(ws: &Workspace, args: &AgentCreateArgs) -> Result<()> {
    if args.name.trim().is_empty() {
        bail!("agent name is required");
    }
    let agent = ws.store.create_agent(&args.name, &ws.owner)?;
    if args.use_it {
        ws.set_active_agent(&agent.id)?;
    }

    if ws.json {
        output_json(&agent);
    } else if !ws.quiet {
        println!("Created agent {}: {}", render_accent(&agent.id), agent.name);
        if args.use_it {
            println!("  Now the active agent.");
        }
    }
    Ok(())
}

fn cmd_list(ws: &Workspace, args: &AgentListArgs) -> Result<()> {
    let owner = match (&args.by, args.mine) {
        (Some(owner), _) => Some(owner.as_str()),
        (None, true) => Some(ws.owner.as_str()),
        (None, false) => None,
    };
    let agents = ws.store.list_agents(owner)?;

    if ws.json {
        output_json(&agents);
    } else if agents.is_empty() {
        println!("No agents found.");
    } else {
        let active = ws.active_agent_id()?;
        let rows: Vec<Vec<String>> = agents
            .iter()
            .map(|a| {
                let mut row = agent_row(a);
                if active.as_deref() == Some(a.id.as_str()) {
                    row[0] = format!("{} *", row[0]);
                }
                row
            })
            .collect();
        output_table(AGENT_HEADERS, &rows);
    }
    Ok(())
}

fn cmd_show(ws: &Workspace, id: Option<&str>) -> Result<()> {
    let id = ws.resolve_agent_id(id)?;
    let agent = ws
        .store
        .load_agent(&id)
        .with_context(|| format!("failed to load agent {id}"))?;

    if ws.json {
        output_json(&agent);
        return Ok(());
    }

    println!("{} {}", render_bold(&agent.name), render_muted(&agent.id));
    if !agent.owner.is_empty() {
        println!("Owner: {}", agent.owner);
    }
    println!("Updated: {}", agent.updated_at.format("%Y-%m-%d %H:%M"));
    println!();
    if agent.blocks.is_empty() {
        println!("No blocks.");
    } else {
        let rows: Vec<Vec<String>> = agent.blocks.iter().map(|b| block_row(b, &agent)).collect();
        output_table(BLOCK_HEADERS, &rows);
    }
    if !agent.variables.is_empty() {
        println!();
        let rows: Vec<Vec<String>> = agent.variables.iter().map(variable_row).collect();
        output_table(VARIABLE_HEADERS, &rows);
    }
    Ok(())
}

fn cmd_delete(ws: &Workspace, id: &str) -> Result<()> {
    ws.store.delete_agent(id)?;
    if ws.active_agent_id()?.as_deref() == Some(id) {
        ws.set_active_agent("")?;
    }

    if ws.json {
        output_json(&serde_json::json!({ "deleted": id }));
    } else if !ws.quiet {
        println!("Deleted agent {id}");
    }
    Ok(())
}

fn cmd_rename(ws: &Workspace, args: &AgentRenameArgs) -> Result<()> {
    ws.store.rename_agent(&args.id, &args.name)?;

    if ws.json {
        output_json(&serde_json::json!({ "id": args.id, "name": args.name }));
    } else if !ws.quiet {
        println!("Renamed agent {} to {}", args.id, args.name);
    }
    Ok(())
}

fn cmd_use(ws: &Workspace, id: &str) -> Result<()> {
    let agent = ws
        .store
        .load_agent(id)
        .with_context(|| format!("failed to load agent {id}"))?;
    ws.set_active_agent(&agent.id)?;

    if ws.json {
        output_json(&agent.summary());
    } else if !ws.quiet {
        println!("Active agent: {} ({})", agent.name, render_accent(&agent.id));
    }
    Ok(())
}
