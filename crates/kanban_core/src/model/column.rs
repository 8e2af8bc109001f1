//! Column (group) model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable column identifier, e.g. `col-ready`.
pub type ColumnId = String;

/// One board column. Cards reference it through `Card::column_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: ColumnId,
    #[serde(default)]
    pub title: String,
    /// Fields this crate does not interpret, written back unchanged.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Column {
    pub fn new(id: impl Into<ColumnId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            attributes: Map::new(),
        }
    }
}
