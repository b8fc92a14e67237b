//! Results delivered by the external execution service.

use serde::{Deserialize, Serialize};
use stepwise_core::OutputBinding;
use stepwise_core::enums::{BlockStatus, VariableKind};
use stepwise_core::variable::{TableRow, VariableValue};

/// Per-block outcome of one execution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockResult {
    pub block_number: u32,
    pub status: BlockStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Everything the execution service reports back for an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub agent_id: String,
    #[serde(default)]
    pub results: Vec<BlockResult>,
}

impl ExecutionReport {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Converts a block's output into the value stored in its bound variable.
///
/// Table variables accept a JSON array of row objects. Any other output
/// bound to a column becomes one row per non-empty line; everything else is
/// stored as text.
pub fn output_value(kind: VariableKind, binding: &OutputBinding, output: &str) -> VariableValue {
    if kind == VariableKind::Table {
        if let Ok(rows) = serde_json::from_str::<Vec<TableRow>>(output) {
            return VariableValue::Table(rows);
        }
        if let Some(column) = binding.column_name.as_deref() {
            let rows = output
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| {
                    let mut row = TableRow::new();
                    row.insert(column.to_owned(), serde_json::Value::from(line));
                    row
                })
                .collect();
            return VariableValue::Table(rows);
        }
    }
    VariableValue::Text(output.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_report_json() {
        let report = ExecutionReport::from_json(
            r#"{"agent_id":"ag-1","results":[
                {"block_number":1,"status":"completed","output":"hello"},
                {"block_number":2,"status":"failed"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].status, BlockStatus::Completed);
        assert_eq!(report.results[1].output, None);
    }

    #[test]
    fn rejects_unknown_status() {
        let err = ExecutionReport::from_json(
            r#"{"agent_id":"ag-1","results":[{"block_number":1,"status":"done"}]}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn text_output_for_scalar_variables() {
        let binding = OutputBinding::new("var-1");
        assert_eq!(
            output_value(VariableKind::Intermediate, &binding, "[1,2]"),
            VariableValue::Text("[1,2]".into())
        );
    }

    #[test]
    fn table_output_from_json_rows() {
        let binding = OutputBinding::new("var-1");
        let value = output_value(VariableKind::Table, &binding, r#"[{"name":"Acme"}]"#);
        match value {
            VariableValue::Table(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0]["name"], "Acme");
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn table_output_split_into_column() {
        let binding = OutputBinding {
            variable_id: "var-1".into(),
            column_name: Some("company".into()),
        };
        let value = output_value(VariableKind::Table, &binding, "Acme\n\nGlobex\n");
        match value {
            VariableValue::Table(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1]["company"], "Globex");
            }
            other => panic!("expected table, got {other:?}"),
        }
    }
}
