//! `sw source` -- named data sources referenced from block text as `@{name}`.

use std::fs;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use stepwise_core::enums::SourceKind;
use stepwise_core::{Source, SourceNickname};
use stepwise_storage::Storage;

use crate::cli::{SourceAddArgs, SourceArgs, SourceCommands, SourceNicknameArgs};
use crate::context::{RuntimeContext, Workspace};
use crate::output::{output_json, output_table};

/// Execute the `sw source` command.
pub fn run(ctx: &RuntimeContext, args: &SourceArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    match &args.command {
        SourceCommands::Add(a) => cmd_add(&ws, a),
        SourceCommands::Remove(a) => cmd_remove(&ws, &a.name),
        SourceCommands::List => cmd_list(&ws),
        SourceCommands::Nickname(a) => cmd_nickname(&ws, a),
    }
}

/// A source as listed.
#[derive(Debug, Serialize)]
struct SourceView<'a> {
    name: &'a str,
    kind: &'a SourceKind,
    rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    nickname: Option<&'a SourceNickname>,
}

fn cmd_add(ws: &Workspace, args: &SourceAddArgs) -> Result<()> {
    let name = args.name.trim();
    if name.is_empty() {
        bail!("source name is required");
    }
    let data = match (&args.file, &args.data) {
        (Some(path), _) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, Some(data)) => data.clone(),
        (None, None) => String::new(),
    };
    let source = Source::new(SourceKind::from(args.kind.as_str()), data);
    ws.store.put_source(name, &source)?;

    if ws.json {
        output_json(&serde_json::json!({ "name": name, "source": source }));
    } else if !ws.quiet {
        println!("Added source {name} ({})", source.kind);
    }
    Ok(())
}

fn cmd_remove(ws: &Workspace, name: &str) -> Result<()> {
    ws.store.delete_source(name)?;
    if ws.json {
        output_json(&serde_json::json!({ "deleted": name }));
    } else if !ws.quiet {
        println!("Removed source {name}");
    }
    Ok(())
}

fn cmd_list(ws: &Workspace) -> Result<()> {
    let registry = ws.store.list_sources()?;
    let views: Vec<SourceView<'_>> = registry
        .iter()
        .map(|(name, source)| SourceView {
            name,
            kind: &source.kind,
            rows: source.row_count(),
            nickname: registry.nickname(name),
        })
        .collect();

    if ws.json {
        output_json(&views);
    } else if views.is_empty() {
        println!("No sources.");
    } else {
        let rows: Vec<Vec<String>> = views
            .iter()
            .map(|v| {
                vec![
                    v.name.to_string(),
                    v.kind.to_string(),
                    v.rows.to_string(),
                    v.nickname.map(|n| n.nickname.clone()).unwrap_or_default(),
                ]
            })
            .collect();
        output_table(&["NAME", "KIND", "ROWS", "NICKNAME"], &rows);
    }
    Ok(())
}

fn cmd_nickname(ws: &Workspace, args: &SourceNicknameArgs) -> Result<()> {
    let nickname = SourceNickname {
        nickname: args.nickname.clone(),
        download_url: args.url.clone(),
    };
    ws.store.set_source_nickname(&args.name, &nickname)?;

    if ws.json {
        output_json(&serde_json::json!({ "name": args.name, "nickname": nickname }));
    } else if !ws.quiet {
        println!("Source {} is now shown as {}", args.name, args.nickname);
    }
    Ok(())
}
