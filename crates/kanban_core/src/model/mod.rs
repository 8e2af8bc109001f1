//! Board domain model for columns and cards.
//!
//! # Responsibility
//! - Define the persisted shapes of the `columns` and `cards` collections.
//! - Keep unknown display attributes intact across load/save cycles.
//!
//! # Invariants
//! - Identifiers are strings; numeric ids in stored documents are normalized.
//! - Presentation order is `column_id` + `column_sort_order`, never storage order.

pub mod card;
pub mod column;

use serde::{Deserialize, Deserializer, Serialize};

pub use card::{Card, CardId};
pub use column::{Column, ColumnId};

/// Both collections of one board, as read by the board view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub columns: Vec<Column>,
    pub cards: Vec<Card>,
}

/// Accepts either a JSON string or a JSON integer for identifier fields.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Signed(value) => value.to_string(),
        RawId::Unsigned(value) => value.to_string(),
    })
}
