//! Output formatting helpers for the `sw` CLI.
//!
//! Provides JSON output, table formatting, and the row and detail views
//! used for agents, blocks and variables.

use std::io::{self, Write};

use serde::Serialize;
use stepwise_core::{Agent, AgentSummary, Block, Variable};

use crate::styles::{render_block_status, render_bold, render_muted};

/// Print a value as pretty-printed JSON to stdout.
///
/// Terminates the process with exit code 1 if serialization fails.
pub fn output_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            // Ignore broken pipe errors (e.g., piped to `head`)
            let _ = writeln!(handle, "{}", json);
        }
        Err(e) => {
            eprintln!("Error: failed to serialize JSON: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print a simple table with headers and rows.
///
/// Column widths are computed from the data for alignment.
pub fn output_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = write_table(&mut handle, headers, rows);
}

fn write_table(out: &mut impl Write, headers: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            write!(out, "  ")?;
        }
        write!(out, "{:<width$}", header, width = widths[i])?;
    }
    writeln!(out)?;

    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            write!(out, "  ")?;
        }
        write!(out, "{}", "-".repeat(*width))?;
    }
    writeln!(out)?;

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                write!(out, "  ")?;
            }
            if i < widths.len() {
                write!(out, "{:<width$}", cell, width = widths[i])?;
            } else {
                write!(out, "{}", cell)?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

pub const AGENT_HEADERS: &[&str] = &["ID", "NAME", "OWNER", "BLOCKS", "UPDATED"];

pub fn agent_row(agent: &AgentSummary) -> Vec<String> {
    vec![
        agent.id.clone(),
        agent.name.clone(),
        agent.owner.clone(),
        agent.block_count.to_string(),
        agent.updated_at.format("%Y-%m-%d %H:%M").to_string(),
    ]
}

pub const BLOCK_HEADERS: &[&str] = &["#", "KIND", "NAME", "STATUS", "OUTPUT"];

/// One table row per block. Output bindings show the variable's name.
pub fn block_row(block: &Block, agent: &Agent) -> Vec<String> {
    let output = block
        .output_variable
        .as_ref()
        .map(|binding| {
            let name = agent
                .variables
                .get(&binding.variable_id)
                .map_or(binding.variable_id.as_str(), |v| v.name.as_str());
            match &binding.column_name {
                Some(column) => format!("{name}.{column}"),
                None => name.to_string(),
            }
        })
        .unwrap_or_default();
    let mut name = block.name.clone();
    if block.skip {
        name.push_str(" (skip)");
    }
    vec![
        block.block_number.to_string(),
        block.kind.name().to_string(),
        name,
        block.status.as_str().to_string(),
        output,
    ]
}

pub const VARIABLE_HEADERS: &[&str] = &["ID", "NAME", "KIND", "VALUE"];

pub fn variable_row(variable: &Variable) -> Vec<String> {
    vec![
        variable.id.clone(),
        variable.name.clone(),
        variable.kind.as_str().to_string(),
        variable
            .value
            .as_ref()
            .map(|v| v.preview(40))
            .unwrap_or_default(),
    ]
}

/// Multi-line view of one block.
pub fn format_block_detail(block: &Block, agent: &Agent) -> String {
    let mut lines = vec![format!(
        "{} {} [{}] {}",
        render_bold(&format!("#{}", block.block_number)),
        block.kind.name(),
        render_block_status(block.status),
        block.name
    )];
    lines.push(render_muted(&block.id));

    let row = block_row(block, agent);
    if !row[4].is_empty() {
        lines.push(format!("Output: {}", row[4]));
    }
    let flags: Vec<&str> = [
        (block.skip, "skip"),
        (block.save_as_csv, "csv"),
        (block.contains_primary_input, "primary-input"),
    ]
    .into_iter()
    .filter_map(|(on, label)| on.then_some(label))
    .collect();
    if !flags.is_empty() {
        lines.push(format!("Flags: {}", flags.join(", ")));
    }
    if !block.system_prompt.is_empty() {
        lines.push(String::new());
        lines.push(render_bold("System prompt"));
        lines.push(block.system_prompt.clone());
    }
    if !block.user_prompt.is_empty() {
        lines.push(String::new());
        lines.push(render_bold("User prompt"));
        lines.push(block.user_prompt.clone());
    }
    for (field, text) in block.kind.text_fields() {
        if !text.is_empty() {
            lines.push(String::new());
            lines.push(render_bold(field));
            lines.push(text.to_string());
        }
    }
    if let Some(response) = &block.model_response {
        lines.push(String::new());
        lines.push(render_bold("Response"));
        lines.push(response.clone());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::enums::VariableKind;
    use pretty_assertions::assert_eq;
    use stepwise_core::{BlockKind, OutputBinding};

    #[test]
    fn table_pads_columns() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            &["#", "NAME"],
            &[
                vec!["1".into(), "Fetch".into()],
                vec!["10".into(), "Go".into()],
            ],
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "#   NAME \n--  -----\n1   Fetch\n10  Go   \n");
    }

    #[test]
    fn block_row_names_bound_column() {
        let mut agent = Agent::with_id("ag-1", "Digest", "ada");
        let table = agent.add_variable("rows", VariableKind::Table).unwrap();
        let block = Block::builder(BlockKind::Checkpoint)
            .name("Collect")
            .output_binding(OutputBinding {
                variable_id: table.id.clone(),
                column_name: Some("title".into()),
            })
            .build();
        agent.add_block(block).unwrap();

        let row = block_row(agent.blocks.get(1).unwrap(), &agent);
        assert_eq!(row[0], "1");
        assert_eq!(row[1], "checkpoint");
        assert_eq!(row[4], "rows.title");
    }
}
