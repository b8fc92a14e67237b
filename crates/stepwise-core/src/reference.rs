//! `@{...}` reference resolution for block text.
//!
//! A marker is `@{` followed by any characters except `}` and line breaks,
//! closed by the first `}`. `@{today}` (trimmed, any case) is replaced by the
//! current date; any other content is a source reference and is left in the
//! text untouched. Replaced text is never rescanned.

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::error::{CoreError, Result};

/// Short locale-style date, e.g. `3/7/2025`.
pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";

const TODAY: &str = "today";
const OPEN: &str = "@{";

/// One marker found in a text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Reference {
    /// `@{today}`, with the rendered date that replaced it.
    Date { value: String },
    /// Any other marker; `token` is the trimmed content in its original case.
    Source { token: String },
}

/// Output of [`ReferenceParser::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedText {
    pub processed_text: String,
    pub references: Vec<Reference>,
}

impl ResolvedText {
    /// Source tokens in order of appearance.
    pub fn source_tokens(&self) -> impl Iterator<Item = &str> {
        self.references.iter().filter_map(|r| match r {
            Reference::Source { token } => Some(token.as_str()),
            Reference::Date { .. } => None,
        })
    }
}

/// A `@{...}` occurrence: byte range of the whole marker and its content.
struct Marker<'a> {
    start: usize,
    end: usize,
    content: &'a str,
}

fn find_markers(text: &str) -> Vec<Marker<'_>> {
    let mut markers = Vec::new();
    let mut pos = 0;
    while let Some(offset) = text[pos..].find(OPEN) {
        let start = pos + offset;
        let content_start = start + OPEN.len();
        let rest = &text[content_start..];
        match rest.find(['}', '\n', '\r']) {
            Some(close) if rest.as_bytes()[close] == b'}' => {
                let end = content_start + close + 1;
                markers.push(Marker {
                    start,
                    end,
                    content: &rest[..close],
                });
                pos = end;
            }
            // Unterminated on this line: this `@` opens nothing.
            _ => pos = start + 1,
        }
    }
    markers
}

/// Resolves `@{...}` markers using a configurable date format.
#[derive(Debug, Clone)]
pub struct ReferenceParser {
    date_format: String,
}

impl Default for ReferenceParser {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_owned(),
        }
    }
}

impl ReferenceParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a chrono strftime format for `@{today}`.
    pub fn with_format(format: impl Into<String>) -> Result<Self> {
        let date_format = format.into();
        if StrftimeItems::new(&date_format).any(|item| matches!(item, Item::Error)) {
            return Err(CoreError::InvalidDateFormat(date_format));
        }
        Ok(Self { date_format })
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    /// Resolves against the local current date.
    pub fn resolve(&self, text: &str) -> ResolvedText {
        self.resolve_on(text, Local::now().date_naive())
    }

    /// Resolves against a fixed date.
    pub fn resolve_on(&self, text: &str, today: NaiveDate) -> ResolvedText {
        let markers = find_markers(text);
        if markers.is_empty() {
            return ResolvedText {
                processed_text: text.to_owned(),
                references: Vec::new(),
            };
        }

        let mut processed = String::with_capacity(text.len());
        let mut references = Vec::with_capacity(markers.len());
        let mut copied_to = 0;
        for marker in markers {
            let token = marker.content.trim();
            if token.eq_ignore_ascii_case(TODAY) {
                let value = today.format(&self.date_format).to_string();
                processed.push_str(&text[copied_to..marker.start]);
                processed.push_str(&value);
                copied_to = marker.end;
                references.push(Reference::Date { value });
            } else {
                references.push(Reference::Source {
                    token: token.to_owned(),
                });
            }
        }
        processed.push_str(&text[copied_to..]);

        ResolvedText {
            processed_text: processed,
            references,
        }
    }
}

/// Resolves `text` with the default date format and today's date.
pub fn resolve(text: &str) -> ResolvedText {
    ReferenceParser::default().resolve(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    fn parse(text: &str) -> ResolvedText {
        ReferenceParser::default().resolve_on(text, date())
    }

    #[test]
    fn today_is_replaced() {
        let out = parse("Meeting on @{today}");
        assert_eq!(out.processed_text, "Meeting on 3/7/2025");
        assert_eq!(
            out.references,
            vec![Reference::Date {
                value: "3/7/2025".into()
            }]
        );
        assert_eq!(out.source_tokens().count(), 0);
    }

    #[test]
    fn resolve_uses_local_today() {
        let out = resolve("Meeting on @{today}");
        let expected = format!(
            "Meeting on {}",
            Local::now().date_naive().format(DEFAULT_DATE_FORMAT)
        );
        assert_eq!(out.processed_text, expected);
        assert_eq!(out.source_tokens().count(), 0);
    }

    #[test]
    fn source_token_left_in_place() {
        let out = parse("Use @{leads_csv} for analysis");
        assert_eq!(out.processed_text, "Use @{leads_csv} for analysis");
        assert_eq!(out.source_tokens().collect::<Vec<_>>(), vec!["leads_csv"]);
    }

    #[test]
    fn today_is_case_and_whitespace_insensitive() {
        let out = parse("@{ Today } and @{TODAY}");
        assert_eq!(out.processed_text, "3/7/2025 and 3/7/2025");
        assert_eq!(out.references.len(), 2);
    }

    #[test]
    fn source_token_keeps_case_but_is_trimmed() {
        let out = parse("see @{  Q3 Report.pdf }");
        assert_eq!(out.source_tokens().collect::<Vec<_>>(), vec!["Q3 Report.pdf"]);
    }

    #[test]
    fn mixed_markers_in_order() {
        let out = parse("@{a} on @{today} then @{b}");
        assert_eq!(out.processed_text, "@{a} on 3/7/2025 then @{b}");
        assert_eq!(
            out.references,
            vec![
                Reference::Source { token: "a".into() },
                Reference::Date {
                    value: "3/7/2025".into()
                },
                Reference::Source { token: "b".into() },
            ]
        );
    }

    #[test]
    fn non_greedy_match() {
        let out = parse("@{a}b}");
        assert_eq!(out.source_tokens().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn marker_does_not_span_newline() {
        let out = parse("@{left\nright}");
        assert!(out.references.is_empty());
        assert_eq!(out.processed_text, "@{left\nright}");
    }

    #[test]
    fn unterminated_marker_then_valid_one() {
        let out = parse("@{oops\n@{fine}");
        assert_eq!(out.source_tokens().collect::<Vec<_>>(), vec!["fine"]);
    }

    #[test]
    fn empty_marker_is_an_empty_source_token() {
        let out = parse("x @{} y");
        assert_eq!(out.source_tokens().collect::<Vec<_>>(), vec![""]);
    }

    #[test]
    fn text_without_markers_is_unchanged() {
        let text = "plain text with @ and { braces }";
        let out = parse(text);
        assert_eq!(out.processed_text, text);
        assert!(out.references.is_empty());
        assert_eq!(parse(&out.processed_text), out);
    }

    #[test]
    fn replaced_date_is_not_rescanned() {
        let parser = ReferenceParser::with_format("@{%Y}").unwrap();
        let out = parser.resolve_on("@{today}", date());
        assert_eq!(out.processed_text, "@{2025}");
        assert_eq!(out.references.len(), 1);
    }

    #[test]
    fn custom_format() {
        let parser = ReferenceParser::with_format("%Y-%m-%d").unwrap();
        assert_eq!(parser.resolve_on("@{today}", date()).processed_text, "2025-03-07");
    }

    #[test]
    fn invalid_format_is_rejected() {
        let err = ReferenceParser::with_format("%Q").unwrap_err();
        assert_eq!(err, CoreError::InvalidDateFormat("%Q".into()));
    }

    #[test]
    fn multibyte_text_is_handled() {
        let out = parse("héllo @{tödåy} @{today} ✓");
        assert_eq!(out.processed_text, "héllo @{tödåy} 3/7/2025 ✓");
    }
}
