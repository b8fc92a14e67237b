//! `sw block` -- add, update, remove, copy and reorder the blocks of an agent.
//!
//! Every edit goes through an editor session and ends with a manual save,
//! so the stored block list always matches what was printed.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use stepwise_core::{Agent, Block, BlockKind, BlockUpdates, OutputBinding};
use stepwise_session::SaveOutcome;

use crate::cli::{
    BlockAddArgs, BlockArgs, BlockCommands, BlockFieldArgs, BlockMoveArgs, BlockUpdateArgs,
};
use crate::commands::{Session, commit};
use crate::context::RuntimeContext;
use crate::output::{BLOCK_HEADERS, block_row, format_block_detail, output_json, output_table};
use crate::styles::{render_muted, render_save_outcome};

/// Execute the `sw block` command.
pub fn run(ctx: &RuntimeContext, args: &BlockArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let out = Out {
        json: ws.json,
        quiet: ws.quiet,
    };
    let mut session = ws.into_session(args.agent.as_deref())?;
    match &args.command {
        BlockCommands::Add(a) => cmd_add(&mut session, out, a),
        BlockCommands::Update(a) => cmd_update(&mut session, out, a),
        BlockCommands::Remove(a) => cmd_remove(&mut session, out, a.number),
        BlockCommands::List => cmd_list(&session, out),
        BlockCommands::Show(a) => cmd_show(&session, out, a.number),
        BlockCommands::Copy(a) => cmd_copy(&mut session, out, a.number),
        BlockCommands::Move(a) => cmd_move(&mut session, out, a),
    }
}

#[derive(Debug, Clone, Copy)]
struct Out {
    json: bool,
    quiet: bool,
}

// ---------------------------------------------------------------------------
// Add / update
// ---------------------------------------------------------------------------

fn cmd_add(session: &mut Session, out: Out, args: &BlockAddArgs) -> Result<()> {
    let kind = BlockKind::empty(&args.kind).ok_or_else(|| {
        anyhow!(
            "unknown block kind '{}' (expected one of: {})",
            args.kind,
            BlockKind::NAMES.join(", ")
        )
    })?;
    let fields = &args.fields;
    let kind = patch_kind(kind, &fields.fields, session.agent())?;

    let mut builder = Block::builder(kind)
        .name(fields.name.clone().unwrap_or_default())
        .system_prompt(fields.system_prompt.clone().unwrap_or_default())
        .user_prompt(fields.user_prompt.clone().unwrap_or_default())
        .skip(fields.skip.unwrap_or(false))
        .save_as_csv(fields.save_as_csv.unwrap_or(false))
        .contains_primary_input(fields.primary_input.unwrap_or(false));
    if let Some(binding) = output_binding(fields, session.agent())? {
        builder = builder.output_binding(binding);
    }

    let number = session.insert_block(builder.build(), args.at)?;
    let outcome = commit(session)?;
    report_block(session, out, number, "Added", &outcome)
}

fn cmd_update(session: &mut Session, out: Out, args: &BlockUpdateArgs) -> Result<()> {
    let fields = &args.fields;
    let existing = session
        .agent()
        .blocks
        .get(args.number)
        .with_context(|| format!("block {} not found", args.number))?;

    let kind = if fields.fields.is_empty() {
        None
    } else {
        Some(patch_kind(
            existing.kind.clone(),
            &fields.fields,
            session.agent(),
        )?)
    };
    let output_variable = if args.no_output {
        Some(None)
    } else {
        output_binding(fields, session.agent())?.map(Some)
    };

    let updates = BlockUpdates {
        name: fields.name.clone(),
        system_prompt: fields.system_prompt.clone(),
        user_prompt: fields.user_prompt.clone(),
        save_as_csv: fields.save_as_csv,
        skip: fields.skip,
        contains_primary_input: fields.primary_input,
        output_variable,
        kind,
        ..BlockUpdates::default()
    };
    if updates.is_empty() {
        bail!("nothing to update (pass at least one field)");
    }

    session.update_block(args.number, updates)?;
    let outcome = commit(session)?;
    report_block(session, out, args.number, "Updated", &outcome)
}

/// Resolves `--output` (variable name or id) and `--column`.
fn output_binding(fields: &BlockFieldArgs, agent: &Agent) -> Result<Option<OutputBinding>> {
    let Some(reference) = fields.output.as_deref() else {
        return Ok(None);
    };
    let variable = agent
        .variables
        .find(reference)
        .with_context(|| format!("variable '{reference}' not found"))?;
    Ok(Some(OutputBinding {
        variable_id: variable.id.clone(),
        column_name: fields.column.clone(),
    }))
}

/// Applies `key=value` assignments to a block payload.
///
/// Values are parsed as JSON unless the field currently holds text. Fields
/// ending in `_variable_id` accept a variable name. Keys the kind does not
/// have are rejected.
fn patch_kind(kind: BlockKind, assignments: &[String], agent: &Agent) -> Result<BlockKind> {
    if assignments.is_empty() {
        return Ok(kind);
    }
    let kind_name = kind.name();
    let mut value = serde_json::to_value(&kind).context("failed to serialize block payload")?;
    let map = value
        .as_object_mut()
        .context("block payload is not an object")?;

    let mut keys = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let (key, raw) = assignment
            .split_once('=')
            .with_context(|| format!("invalid field '{assignment}' (expected KEY=VALUE)"))?;
        let key = key.trim();
        if key.is_empty() || key == "type" {
            bail!("invalid field name '{key}'");
        }

        let field_value = if key.ends_with("_variable_id") {
            let variable = agent
                .variables
                .find(raw)
                .with_context(|| format!("variable '{raw}' not found"))?;
            Value::String(variable.id.clone())
        } else if matches!(map.get(key), Some(Value::String(_))) {
            Value::String(raw.to_string())
        } else {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        };
        let clears = field_value.is_null() || field_value.as_array().is_some_and(Vec::is_empty);
        if !clears {
            keys.push(key);
        }
        map.insert(key.to_string(), field_value);
    }

    let patched: BlockKind = serde_json::from_value(value)
        .with_context(|| format!("invalid field value for a {kind_name} block"))?;

    // Unknown keys are dropped by serde; a set key missing afterwards was never a field.
    let check = serde_json::to_value(&patched).context("failed to serialize block payload")?;
    for key in keys {
        if check.get(key).is_none() {
            bail!("a {kind_name} block has no field '{key}'");
        }
    }
    Ok(patched)
}

// ---------------------------------------------------------------------------
// Remove / copy / move
// ---------------------------------------------------------------------------

fn cmd_remove(session: &mut Session, out: Out, number: u32) -> Result<()> {
    let removed = session.remove_block(number)?;
    let outcome = commit(session)?;

    if out.json {
        output_json(&serde_json::json!({
            "removed": removed,
            "save": outcome,
        }));
    } else if !out.quiet {
        println!("Removed block #{number} ({})", removed.kind.name());
        println!("{}", render_save_outcome(&outcome));
    }
    Ok(())
}

fn cmd_copy(session: &mut Session, out: Out, number: u32) -> Result<()> {
    let copy = session.duplicate_block(number)?;
    let outcome = commit(session)?;
    report_block(session, out, copy, &format!("Copied #{number} to"), &outcome)
}

fn cmd_move(session: &mut Session, out: Out, args: &BlockMoveArgs) -> Result<()> {
    if args.from == 0 || args.to == 0 {
        bail!("positions start at 1");
    }
    session.reorder_blocks(args.from - 1, args.to - 1)?;
    let outcome = commit(session)?;

    if out.json {
        output_json(&serde_json::json!({
            "blocks": session.agent().blocks,
            "save": outcome,
        }));
    } else if !out.quiet {
        println!("Moved block at position {} to {}", args.from, args.to);
        print_blocks(session);
        println!("{}", render_save_outcome(&outcome));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// List / show
// ---------------------------------------------------------------------------

fn cmd_list(session: &Session, out: Out) -> Result<()> {
    if out.json {
        output_json(&session.agent().blocks);
    } else if session.agent().blocks.is_empty() {
        println!("No blocks.");
    } else {
        print_blocks(session);
    }
    Ok(())
}

fn cmd_show(session: &Session, out: Out, number: u32) -> Result<()> {
    let agent = session.agent();
    let block = agent
        .blocks
        .get(number)
        .with_context(|| format!("block {number} not found"))?;
    if out.json {
        output_json(block);
    } else {
        println!("{}", format_block_detail(block, agent));
    }
    Ok(())
}

fn print_blocks(session: &Session) {
    let agent = session.agent();
    let rows: Vec<Vec<String>> = agent.blocks.iter().map(|b| block_row(b, agent)).collect();
    output_table(BLOCK_HEADERS, &rows);
}

fn report_block(
    session: &Session,
    out: Out,
    number: u32,
    verb: &str,
    outcome: &SaveOutcome,
) -> Result<()> {
    let block = session
        .agent()
        .blocks
        .get(number)
        .with_context(|| format!("block {number} not found"))?;
    if out.json {
        output_json(&serde_json::json!({
            "block": block,
            "save": outcome,
        }));
    } else if !out.quiet {
        println!(
            "{verb} block #{number} ({}) {}",
            block.kind.name(),
            render_muted(&block.id)
        );
        println!("{}", render_save_outcome(outcome));
    }
    Ok(())
}
