//! Named data sources referenced from block text with `@{name}`.

use serde::{Deserialize, Serialize};

use crate::enums::SourceKind;
use crate::variable::TableRow;

/// A single column filter applied to a tabular source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub column: String,
    pub operator: String,
    pub value: String,
}

/// An uploaded or fetched data source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type", default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub processed_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Vec<TableRow>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_criteria: Vec<FilterCriteria>,
}

impl Source {
    pub fn new(kind: SourceKind, processed_data: impl Into<String>) -> Self {
        Self {
            kind,
            processed_data: processed_data.into(),
            ..Self::default()
        }
    }

    /// Number of raw rows, zero for non-tabular sources.
    pub fn row_count(&self) -> usize {
        self.raw_data.as_ref().map_or(0, Vec::len)
    }
}

/// Display nickname cached for a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceNickname {
    pub nickname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub download_url: String,
}
