//! Card (entity) model.
//!
//! # Invariants
//! - `id` is unique within the cards collection.
//! - `updated_at` is only rewritten by the operation that actively moved the card.
//! - `locked` cards keep their placement while the lock policy is enforced.

use crate::model::column::ColumnId;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable card identifier. Stored ids are numeric strings such as `"12"`.
pub type CardId = String;

/// Canonical card record as persisted in `cards.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: CardId,
    #[serde(default)]
    pub title: String,
    /// Column the card currently belongs to.
    #[serde(deserialize_with = "super::deserialize_id")]
    pub column_id: ColumnId,
    /// 1-based order key inside `column_id`. Older documents may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_sort_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// ISO-8601 UTC timestamp with millisecond precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub locked: bool,
    /// Fields this crate does not interpret, written back unchanged.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Card {
    /// Creates an unlocked card with empty display attributes.
    pub fn new(
        id: impl Into<CardId>,
        title: impl Into<String>,
        column_id: impl Into<ColumnId>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            column_id: column_id.into(),
            column_sort_order: None,
            ticket_id: None,
            description: None,
            tags: None,
            updated_at: None,
            locked: false,
            attributes: Map::new(),
        }
    }

    /// Sets `updated_at` to `now`.
    pub fn touch(&mut self, now: &str) {
        self.updated_at = Some(now.to_string());
    }

    /// Sort key used to keep pre-existing relative order; unordered cards sink.
    pub fn order_key(&self) -> i64 {
        self.column_sort_order.unwrap_or(i64::MAX)
    }
}

/// Current time in the stored `updatedAt` format, e.g. `2024-05-01T09:30:00.000Z`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
