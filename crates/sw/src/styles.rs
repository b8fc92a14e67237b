//! Terminal styling for human-readable output.
//!
//! Colors come from the Ayu Dark palette and are applied only when the
//! terminal supports them. Only states that need attention get color.

use std::env;
use std::io::IsTerminal;

use owo_colors::OwoColorize;
use stepwise_core::enums::BlockStatus;
use stepwise_session::{SaveOutcome, SaveState};

const PASS: (u8, u8, u8) = (0xc2, 0xd9, 0x4c); // #c2d94c
const WARN: (u8, u8, u8) = (0xff, 0xb4, 0x54); // #ffb454
const FAIL: (u8, u8, u8) = (0xf0, 0x71, 0x78); // #f07178
const MUTED: (u8, u8, u8) = (0x6c, 0x76, 0x80); // #6c7680
const ACCENT: (u8, u8, u8) = (0x59, 0xc2, 0xff); // #59c2ff

pub const ICON_PASS: &str = "\u{2713}";
pub const ICON_FAIL: &str = "\u{2716}";
pub const ICON_SKIP: &str = "-";

/// Determines if ANSI color codes should be used.
///
/// `NO_COLOR`, `CLICOLOR=0` and `TERM=dumb` disable color,
/// `CLICOLOR_FORCE` forces it, otherwise stdout must be a terminal.
pub fn supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").as_deref() == Ok("0") {
        return false;
    }
    if env::var("TERM").as_deref() == Ok("dumb") {
        return false;
    }
    if env::var_os("CLICOLOR_FORCE").is_some() {
        return true;
    }
    std::io::stdout().is_terminal()
}

fn color_str(s: &str, rgb: (u8, u8, u8)) -> String {
    if supports_color() {
        s.truecolor(rgb.0, rgb.1, rgb.2).to_string()
    } else {
        s.to_string()
    }
}

pub fn render_pass(s: &str) -> String {
    color_str(s, PASS)
}

pub fn render_warn(s: &str) -> String {
    color_str(s, WARN)
}

pub fn render_fail(s: &str) -> String {
    color_str(s, FAIL)
}

pub fn render_muted(s: &str) -> String {
    color_str(s, MUTED)
}

pub fn render_accent(s: &str) -> String {
    color_str(s, ACCENT)
}

pub fn render_bold(s: &str) -> String {
    if supports_color() {
        s.bold().to_string()
    } else {
        s.to_string()
    }
}

/// Renders a block status. Idle blocks use standard text.
pub fn render_block_status(status: BlockStatus) -> String {
    let s = status.as_str();
    match status {
        BlockStatus::Idle => s.to_string(),
        BlockStatus::Running => render_warn(s),
        BlockStatus::Completed => render_pass(s),
        BlockStatus::Failed => render_fail(s),
    }
}

/// Renders the save state shown after an edit.
pub fn render_save_state(state: SaveState) -> String {
    let s = state.to_string();
    match state {
        SaveState::Clean => render_muted(&s),
        SaveState::Dirty => render_warn(&s),
        SaveState::Saving => render_accent(&s),
    }
}

/// One-line summary of a save attempt, prefixed with an icon.
pub fn render_save_outcome(outcome: &SaveOutcome) -> String {
    match outcome {
        SaveOutcome::Saved { trigger } => {
            format!("{} saved ({trigger})", color_str(ICON_PASS, PASS))
        }
        SaveOutcome::Skipped { reason } => {
            format!("{} save skipped: {reason}", color_str(ICON_SKIP, MUTED))
        }
        SaveOutcome::Failed { message, .. } => {
            format!("{} save failed: {message}", color_str(ICON_FAIL, FAIL))
        }
    }
}
