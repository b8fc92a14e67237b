//! Named values that blocks read from and write into.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::VariableKind;

/// One row of tabular data, keyed by column name.
pub type TableRow = BTreeMap<String, serde_json::Value>;

/// The value held by a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Text(String),
    Table(Vec<TableRow>),
}

impl VariableValue {
    /// Returns `true` for an empty string or a table with no rows.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Table(rows) => rows.is_empty(),
        }
    }

    /// Short human readable rendering for tables and logs.
    pub fn preview(&self, max_len: usize) -> String {
        match self {
            Self::Text(s) if s.chars().count() > max_len => {
                let cut: String = s.chars().take(max_len).collect();
                format!("{cut}...")
            }
            Self::Text(s) => s.clone(),
            Self::Table(rows) => format!("[{} rows]", rows.len()),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl VariableKind {
    /// The value a freshly created or reset variable of this kind holds.
    pub fn empty_value(&self) -> VariableValue {
        match self {
            Self::Table => VariableValue::Table(Vec::new()),
            Self::Input | Self::Intermediate => VariableValue::Text(String::new()),
        }
    }
}

/// A named value scoped to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: VariableKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<VariableValue>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub agent_id: String,
    pub updated_at: DateTime<Utc>,
}

impl Variable {
    /// Creates a variable with the kind's empty value.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            value: Some(kind.empty_value()),
            description: String::new(),
            agent_id: String::new(),
            updated_at: Utc::now(),
        }
    }

    /// Clears the value back to the kind's empty value.
    pub fn reset_value(&mut self) {
        self.value = Some(self.kind.empty_value());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_values_follow_kind() {
        assert_eq!(VariableKind::Table.empty_value(), VariableValue::Table(vec![]));
        assert_eq!(
            VariableKind::Input.empty_value(),
            VariableValue::Text(String::new())
        );
    }

    #[test]
    fn value_deserializes_untagged() {
        let text: VariableValue = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(text, VariableValue::from("hello"));

        let table: VariableValue =
            serde_json::from_value(json!([{"name": "Ada", "score": 3}])).unwrap();
        match table {
            VariableValue::Table(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0]["name"], json!("Ada"));
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn preview_truncates_long_text() {
        let v = VariableValue::from("abcdefghij");
        assert_eq!(v.preview(4), "abcd...");
        assert_eq!(VariableValue::Table(vec![TableRow::new()]).preview(4), "[1 rows]");
    }

    #[test]
    fn kind_serializes_as_type() {
        let var = Variable::new("var-1", "leads", VariableKind::Table);
        let json = serde_json::to_value(&var).unwrap();
        assert_eq!(json["type"], json!("table"));
        assert_eq!(json["value"], json!([]));
    }
}
