//! `sw resolve` -- expand `@{today}` and bind `@{source}` markers.

use anyhow::Result;
use serde::Serialize;
use stepwise_core::ResolvedText;
use stepwise_session::{BoundSource, ResolvedField, bind_sources};
use stepwise_storage::Storage;

use crate::cli::ResolveArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;
use crate::styles::{render_bold, render_muted, render_warn};

/// Resolved free text, shaped like one block field.
#[derive(Debug, Serialize)]
struct ResolvedInput {
    #[serde(flatten)]
    resolved: ResolvedText,
    sources: Vec<BoundSource>,
}

/// Execute the `sw resolve` command.
pub fn run(ctx: &RuntimeContext, args: &ResolveArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let json = ws.json;

    if let Some(text) = &args.text {
        let parser = ws.config.reference_parser()?;
        let registry = ws.store.list_sources()?;
        let resolved = parser.resolve(text);
        let sources = bind_sources(&registry, &resolved);
        if json {
            output_json(&ResolvedInput { resolved, sources });
        } else {
            println!("{}", resolved.processed_text);
            print_sources(&sources);
        }
        return Ok(());
    }

    let session = ws.into_session(args.agent.as_deref())?;
    let number = args.number.unwrap_or_default();
    let fields: Vec<ResolvedField> = session.resolve_block(number)?;

    if json {
        output_json(&fields);
    } else if fields.is_empty() {
        println!("Block #{number} has no text to resolve.");
    } else {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                println!();
            }
            println!("{}", render_bold(field.field));
            println!("{}", field.resolved.processed_text);
            print_sources(&field.sources);
        }
    }
    Ok(())
}

fn print_sources(sources: &[BoundSource]) {
    for source in sources {
        let line = match (&source.kind, &source.nickname) {
            (Some(kind), Some(nickname)) => format!("  @{{{}}} -> {kind} \"{nickname}\"", source.token),
            (Some(kind), None) => format!("  @{{{}}} -> {kind}", source.token),
            (None, _) => {
                println!("  @{{{}}} -> {}", source.token, render_warn("not found"));
                continue;
            }
        };
        println!("{}", render_muted(&line));
    }
}
