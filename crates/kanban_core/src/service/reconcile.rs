//! Column order reconciliation over an in-memory card collection.
//!
//! # Responsibility
//! - Apply a client-supplied (possibly partial) order to one column.
//! - Renumber the column's unmentioned cards so they follow the given order.
//!
//! # Invariants
//! - After `apply_column_order`, the target column's sort orders are exactly `1..=n`.
//! - Only the card named by `moved_card_id`, and only when listed, gets a new
//!   `updated_at`.
//! - Cards in other columns and unreferenced cards keep their column.
//! - Under `LockPolicy::Enforce` nothing is mutated when a locked card would move.

use crate::config::LockPolicy;
use crate::model::{Card, CardId, ColumnId};
use crate::service::board_service::BoardError;
use std::collections::{HashMap, HashSet};

/// Caller input for one reorder of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    /// Column receiving the ordered cards. Must exist.
    pub column_id: ColumnId,
    /// Desired order; may be a subset of the column and may name other columns' cards.
    pub card_ids: Vec<CardId>,
    /// Card the user actually dragged. Required.
    pub moved_card_id: Option<CardId>,
}

impl ReconcileRequest {
    pub fn new(
        column_id: impl Into<ColumnId>,
        card_ids: impl IntoIterator<Item = impl Into<CardId>>,
        moved_card_id: impl Into<CardId>,
    ) -> Self {
        Self {
            column_id: column_id.into(),
            card_ids: card_ids.into_iter().map(Into::into).collect(),
            moved_card_id: Some(moved_card_id.into()),
        }
    }
}

/// Result handed back to the request handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub column_id: ColumnId,
    /// Distinct ids processed from the request list.
    pub count: usize,
    /// How many of them matched an existing card.
    pub matched: usize,
}

/// Applies `card_ids` as the new head of `column_id`'s order.
///
/// Repeated ids keep their last position; unknown ids are skipped without
/// leaving a gap. Remaining cards of the column follow in their previous
/// relative order (old sort order, then storage position).
///
/// # Errors
/// - `BoardError::CardLocked` when `lock_policy` is `Enforce` and a locked
///   card's column or sort order would change. `cards` is left untouched.
pub fn apply_column_order(
    cards: &mut [Card],
    column_id: &str,
    card_ids: &[CardId],
    moved_card_id: &str,
    now: &str,
    lock_policy: LockPolicy,
) -> Result<ReconcileSummary, BoardError> {
    let requested = dedupe_keep_last(card_ids);

    let mut position_by_id: HashMap<&str, usize> = HashMap::with_capacity(cards.len());
    for (position, card) in cards.iter().enumerate() {
        position_by_id.entry(card.id.as_str()).or_insert(position);
    }

    let listed: Vec<usize> = requested
        .iter()
        .filter_map(|id| position_by_id.get(id).copied())
        .collect();
    let listed_set: HashSet<usize> = listed.iter().copied().collect();

    let mut remaining: Vec<usize> = cards
        .iter()
        .enumerate()
        .filter(|(position, card)| card.column_id == column_id && !listed_set.contains(position))
        .map(|(position, _)| position)
        .collect();
    remaining.sort_by_key(|position| (cards[*position].order_key(), *position));

    let placements: Vec<(usize, i64)> = listed
        .iter()
        .chain(remaining.iter())
        .enumerate()
        .map(|(index, position)| (*position, index as i64 + 1))
        .collect();

    if lock_policy == LockPolicy::Enforce {
        for (position, order) in &placements {
            let card = &cards[*position];
            let changes_placement =
                card.column_id != column_id || card.column_sort_order != Some(*order);
            if card.locked && changes_placement {
                return Err(BoardError::CardLocked(card.id.clone()));
            }
        }
    }

    for (position, order) in placements {
        let card = &mut cards[position];
        card.column_id = column_id.to_string();
        card.column_sort_order = Some(order);
        // Cards only renumbered as a side effect keep their timestamp.
        if card.id == moved_card_id && listed_set.contains(&position) {
            card.touch(now);
        }
    }

    Ok(ReconcileSummary {
        column_id: column_id.to_string(),
        count: requested.len(),
        matched: listed.len(),
    })
}

fn dedupe_keep_last(card_ids: &[CardId]) -> Vec<&str> {
    let last_index: HashMap<&str, usize> = card_ids
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index))
        .collect();
    card_ids
        .iter()
        .enumerate()
        .filter(|(index, id)| last_index.get(id.as_str()) == Some(index))
        .map(|(_, id)| id.as_str())
        .collect()
}
