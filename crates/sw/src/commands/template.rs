//! `sw template` -- template operations (create, list, show, delete,
//! instantiate).
//!
//! A template is a snapshot of an agent's blocks and variables with the
//! variable values cleared. Instantiation clones it into a new agent with
//! fresh ids, remapping every variable reference, in one transaction.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use stepwise_core::Template;
use stepwise_session::instantiate_template;
use stepwise_storage::Storage;

use crate::cli::{TemplateArgs, TemplateCommands, TemplateCreateArgs, TemplateInstantiateArgs};
use crate::context::{RuntimeContext, Workspace};
use crate::output::{VARIABLE_HEADERS, output_json, output_table, variable_row};
use crate::styles::{render_accent, render_bold, render_muted};

/// Execute the `sw template` command.
pub fn run(ctx: &RuntimeContext, args: &TemplateArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    match &args.command {
        TemplateCommands::Create(a) => cmd_create(&ws, a),
        TemplateCommands::List => cmd_list(&ws),
        TemplateCommands::Show(a) => cmd_show(&ws, &a.id),
        TemplateCommands::Delete(a) => cmd_delete(&ws, &a.id),
        TemplateCommands::Instantiate(a) => cmd_instantiate(&ws, a),
    }
}

/// Template row for listings.
#[derive(Debug, Serialize)]
struct TemplateSummary<'a> {
    id: &'a str,
    name: &'a str,
    description: &'a str,
    created_by: &'a str,
    created_at: String,
    block_count: usize,
    variable_count: usize,
}

impl<'a> From<&'a Template> for TemplateSummary<'a> {
    fn from(t: &'a Template) -> Self {
        Self {
            id: &t.id,
            name: &t.name,
            description: &t.description,
            created_by: &t.created_by,
            created_at: t.created_at.to_rfc3339(),
            block_count: t.blocks.len(),
            variable_count: t.variables.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

fn cmd_create(ws: &Workspace, args: &TemplateCreateArgs) -> Result<()> {
    let name = args.name.trim();
    if name.is_empty() {
        bail!("template name is required");
    }
    let agent_id = ws.resolve_agent_id(args.agent.as_deref())?;
    let agent = ws
        .store
        .load_agent(&agent_id)
        .with_context(|| format!("failed to load agent {agent_id}"))?;

    let template = Template::snapshot(&agent, name, args.description.as_str(), ws.owner.as_str());
    ws.store.create_template(&template)?;

    if ws.json {
        output_json(&template);
    } else if !ws.quiet {
        println!(
            "Created template {}: {} ({} blocks, {} variables)",
            render_accent(&template.id),
            template.name,
            template.blocks.len(),
            template.variables.len()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// List / show
// ---------------------------------------------------------------------------

fn cmd_list(ws: &Workspace) -> Result<()> {
    let templates = ws.store.list_templates()?;

    if ws.json {
        let summaries: Vec<TemplateSummary<'_>> = templates.iter().map(Into::into).collect();
        output_json(&summaries);
    } else if templates.is_empty() {
        println!("No templates found.");
    } else {
        let rows: Vec<Vec<String>> = templates
            .iter()
            .map(|t| {
                vec![
                    t.id.clone(),
                    t.name.clone(),
                    t.blocks.len().to_string(),
                    t.created_by.clone(),
                ]
            })
            .collect();
        output_table(&["ID", "NAME", "BLOCKS", "CREATED BY"], &rows);
    }
    Ok(())
}

fn cmd_show(ws: &Workspace, id: &str) -> Result<()> {
    let template = ws
        .store
        .get_template(id)
        .with_context(|| format!("failed to load template {id}"))?;

    if ws.json {
        output_json(&template);
        return Ok(());
    }

    println!("{} {}", render_bold(&template.name), render_muted(&template.id));
    if !template.description.is_empty() {
        println!("{}", template.description);
    }
    println!(
        "Created {} by {}",
        template.created_at.format("%Y-%m-%d %H:%M"),
        if template.created_by.is_empty() {
            "unknown"
        } else {
            &template.created_by
        }
    );
    println!();
    for block in &template.blocks {
        let name = if block.name.is_empty() {
            String::new()
        } else {
            format!(" {}", block.name)
        };
        println!("  #{} {}{}", block.block_number, block.kind.name(), name);
    }
    if !template.variables.is_empty() {
        println!();
        let rows: Vec<Vec<String>> = template.variables.iter().map(variable_row).collect();
        output_table(VARIABLE_HEADERS, &rows);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

fn cmd_delete(ws: &Workspace, id: &str) -> Result<()> {
    ws.store.delete_template(id)?;
    if ws.json {
        output_json(&serde_json::json!({ "deleted": id }));
    } else if !ws.quiet {
        println!("Deleted template {id}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Instantiate
// ---------------------------------------------------------------------------

fn cmd_instantiate(ws: &Workspace, args: &TemplateInstantiateArgs) -> Result<()> {
    let instantiated = instantiate_template(&ws.store, &args.id, args.name.as_deref(), &ws.owner)?;
    let agent = &instantiated.agent;
    if args.use_it {
        ws.set_active_agent(&agent.id)?;
    }

    if ws.json {
        output_json(&serde_json::json!({
            "agent": agent,
            "variable_ids": instantiated.variable_ids,
            "block_ids": instantiated.block_ids,
        }));
    } else if !ws.quiet {
        println!(
            "Created agent {}: {} from template {}",
            render_accent(&agent.id),
            agent.name,
            args.id
        );
        println!(
            "  {} blocks, {} variables",
            agent.blocks.len(),
            agent.variables.len()
        );
        if args.use_it {
            println!("  Now the active agent.");
        }
    }
    Ok(())
}
