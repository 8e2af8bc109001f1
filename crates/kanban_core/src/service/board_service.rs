//! Board mutation engine.
//!
//! # Responsibility
//! - Own the document store, the mutation queues and the board configuration.
//! - Run every card write as load → mutate → atomic save inside the cards queue.
//!
//! # Invariants
//! - Column references are validated before any card is mutated.
//! - Each exclusive operation works on its own freshly loaded collection.
//! - Failures are classified and returned; nothing is retried or swallowed here.

use crate::config::{BoardConfig, LockPolicy};
use crate::model::card::timestamp_now;
use crate::model::{Board, Card, CardId, Column, ColumnId};
use crate::service::reconcile::{apply_column_order, ReconcileRequest, ReconcileSummary};
use crate::store::{ensure_collections, Collection, DocumentStore, SeedError, StoreError};
use crate::sync::{QueueError, ResourceQueues};
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

static NON_DIGIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\D").expect("valid non-digit regex"));
static TRAILING_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)$").expect("valid trailing number regex"));

pub type BoardResult<T> = Result<T, BoardError>;

/// Coarse failure class for the surrounding service to map onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Corrupt,
    Io,
    InvalidArgument,
    /// Request conflicts with card state (e.g. a locked card).
    Conflict,
    /// Mutation queue did not admit the request in time.
    Unavailable,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Corrupt => "corrupt",
            Self::Io => "io",
            Self::InvalidArgument => "invalid_argument",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug)]
pub enum BoardError {
    /// Required input missing or malformed.
    InvalidArgument(String),
    /// Referenced column does not exist.
    UnknownColumn(ColumnId),
    CardNotFound(CardId),
    /// Card is locked and the lock policy forbids repositioning it.
    CardLocked(CardId),
    /// A column the operation depends on (looked up by title) is absent.
    MissingColumn(String),
    Store(StoreError),
    Queue(QueueError),
}

impl BoardError {
    pub fn kind(&self) -> ErrorClass {
        match self {
            Self::InvalidArgument(_) | Self::UnknownColumn(_) | Self::MissingColumn(_) => {
                ErrorClass::InvalidArgument
            }
            Self::CardNotFound(_) => ErrorClass::NotFound,
            Self::CardLocked(_) => ErrorClass::Conflict,
            Self::Store(StoreError::NotFound { .. }) => ErrorClass::NotFound,
            Self::Store(StoreError::Corrupt { .. } | StoreError::Serialization { .. }) => {
                ErrorClass::Corrupt
            }
            Self::Store(StoreError::Io { .. }) => ErrorClass::Io,
            Self::Queue(_) => ErrorClass::Unavailable,
        }
    }
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::UnknownColumn(id) => write!(f, "column not found: {id}"),
            Self::CardNotFound(id) => write!(f, "card not found: {id}"),
            Self::CardLocked(id) => write!(f, "card is locked: {id}"),
            Self::MissingColumn(title) => write!(f, "column titled `{title}` not found"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Queue(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BoardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Queue(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for BoardError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<QueueError> for BoardError {
    fn from(value: QueueError) -> Self {
        Self::Queue(value)
    }
}

/// Board engine facade used by request handlers.
#[derive(Debug)]
pub struct BoardService {
    config: BoardConfig,
    store: DocumentStore,
    queues: ResourceQueues,
}

impl BoardService {
    /// Creates an engine with an empty queue registry.
    pub fn new(config: BoardConfig) -> Self {
        let store = DocumentStore::new(config.data_dir.clone());
        let queues = match config.queue_timeout {
            Some(timeout) => ResourceQueues::with_wait_timeout(timeout),
            None => ResourceQueues::new(),
        };
        Self {
            config,
            store,
            queues,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn queues(&self) -> &ResourceQueues {
        &self.queues
    }

    /// Seeds missing collections. Safe to call on every start.
    pub async fn ensure_collections(&self) -> Result<Vec<Collection>, SeedError> {
        ensure_collections(&self.store, self.config.template_dir.as_deref()).await
    }

    /// Reads columns outside the mutation queue.
    pub async fn load_columns(&self) -> BoardResult<Vec<Column>> {
        Ok(self.store.load(Collection::Columns).await?)
    }

    /// Reads cards outside the mutation queue; may miss an in-flight write.
    pub async fn load_cards(&self) -> BoardResult<Vec<Card>> {
        Ok(self.store.load(Collection::Cards).await?)
    }

    /// Reads both collections concurrently.
    pub async fn load_board(&self) -> BoardResult<Board> {
        let (columns, cards) = tokio::try_join!(self.load_columns(), self.load_cards())?;
        Ok(Board { columns, cards })
    }

    /// Applies a new (possibly partial) card order to one column.
    ///
    /// # Errors
    /// - `InvalidArgument` when `moved_card_id` is missing or blank.
    /// - `UnknownColumn` when `column_id` does not exist.
    /// - `CardLocked` under `LockPolicy::Enforce` when a locked card would move.
    /// - Store/queue failures; on any error the stored cards are unchanged.
    pub async fn reconcile_order(
        &self,
        request: ReconcileRequest,
    ) -> BoardResult<ReconcileSummary> {
        let started_at = Instant::now();
        let moved_card_id = request
            .moved_card_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BoardError::InvalidArgument("moved card id is required".to_string()))?;
        self.ensure_column_exists(&request.column_id).await?;

        let lock_policy = self.config.lock_policy;
        let result = self
            .queues
            .run_exclusive(Collection::Cards.file_name(), || async {
                let mut cards: Vec<Card> = self.store.load(Collection::Cards).await?;
                let summary = apply_column_order(
                    &mut cards,
                    &request.column_id,
                    &request.card_ids,
                    moved_card_id,
                    &timestamp_now(),
                    lock_policy,
                )?;
                self.store.save(Collection::Cards, &cards).await?;
                Ok::<_, BoardError>(summary)
            })
            .await;

        match &result {
            Ok(summary) => info!(
                "event=column_reorder module=board status=ok column_id={} count={} matched={} duration_ms={}",
                summary.column_id,
                summary.count,
                summary.matched,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=column_reorder module=board status=error column_id={} duration_ms={} error={}",
                request.column_id,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Sets the `locked` flag on one card. Does not touch `updated_at`.
    pub async fn set_locked(&self, card_id: &str, locked: bool) -> BoardResult<Card> {
        let card_id = require_id(card_id, "card id")?;
        let result = self
            .queues
            .run_exclusive(Collection::Cards.file_name(), || async {
                let mut cards: Vec<Card> = self.store.load(Collection::Cards).await?;
                let card = cards
                    .iter_mut()
                    .find(|card| card.id == card_id)
                    .ok_or_else(|| BoardError::CardNotFound(card_id.to_string()))?;
                card.locked = locked;
                let updated = card.clone();
                self.store.save(Collection::Cards, &cards).await?;
                Ok::<_, BoardError>(updated)
            })
            .await;

        log_card_result("card_lock", card_id, &result);
        result
    }

    /// Moves one card to the end of another column.
    ///
    /// Entering the configured "posted" column locks the card.
    pub async fn move_card(&self, card_id: &str, column_id: &str) -> BoardResult<Card> {
        let card_id = require_id(card_id, "card id")?;
        let column_id = require_id(column_id, "column id")?;
        let column = self.ensure_column_exists(column_id).await?;
        let locks_on_entry = column.title == self.config.posted_column_title;

        let lock_policy = self.config.lock_policy;
        let result = self
            .queues
            .run_exclusive(Collection::Cards.file_name(), || async {
                let mut cards: Vec<Card> = self.store.load(Collection::Cards).await?;
                let position = cards
                    .iter()
                    .position(|card| card.id == card_id)
                    .ok_or_else(|| BoardError::CardNotFound(card_id.to_string()))?;
                if lock_policy == LockPolicy::Enforce && cards[position].locked {
                    return Err(BoardError::CardLocked(card_id.to_string()));
                }

                let next_order = next_sort_order(&cards, column_id, Some(position));
                let card = &mut cards[position];
                card.column_id = column_id.to_string();
                card.column_sort_order = Some(next_order);
                card.touch(&timestamp_now());
                if locks_on_entry {
                    card.locked = true;
                }
                let moved = card.clone();
                self.store.save(Collection::Cards, &cards).await?;
                Ok::<_, BoardError>(moved)
            })
            .await;

        log_card_result("card_move", card_id, &result);
        result
    }

    /// Appends new cards to the intake column, one per non-blank title.
    ///
    /// Ids continue from the highest numeric id; ticket ids continue from the
    /// highest trailing ticket number.
    pub async fn add_titles<S: AsRef<str>>(&self, titles: &[S]) -> BoardResult<Vec<Card>> {
        let titles: Vec<String> = titles
            .iter()
            .map(|title| title.as_ref().trim().to_string())
            .filter(|title| !title.is_empty())
            .collect();
        if titles.is_empty() {
            return Err(BoardError::InvalidArgument(
                "at least one non-blank title is required".to_string(),
            ));
        }

        let columns = self.load_columns().await?;
        let intake = columns
            .iter()
            .find(|column| column.title == self.config.intake_column_title)
            .ok_or_else(|| BoardError::MissingColumn(self.config.intake_column_title.clone()))?;

        let result = self
            .queues
            .run_exclusive(Collection::Cards.file_name(), || async {
                let mut cards: Vec<Card> = self.store.load(Collection::Cards).await?;
                let mut next_id = max_numeric_id(&cards) + 1;
                let mut next_ticket = max_ticket_number(&cards) + 1;
                let mut next_order = next_sort_order(&cards, &intake.id, None);
                let now = timestamp_now();

                let mut added = Vec::with_capacity(titles.len());
                for title in &titles {
                    let mut card =
                        Card::new(next_id.to_string(), title.as_str(), intake.id.as_str());
                    card.column_sort_order = Some(next_order);
                    card.ticket_id = Some(format!(
                        "{}-{:03}",
                        self.config.ticket_prefix, next_ticket
                    ));
                    card.description = Some(String::new());
                    card.tags = Some(Vec::new());
                    card.touch(&now);
                    added.push(card);
                    next_id += 1;
                    next_ticket += 1;
                    next_order += 1;
                }

                cards.extend(added.iter().cloned());
                self.store.save(Collection::Cards, &cards).await?;
                Ok::<_, BoardError>(added)
            })
            .await;

        match &result {
            Ok(added) => info!(
                "event=cards_add module=board status=ok column_id={} added={}",
                intake.id,
                added.len()
            ),
            Err(err) => error!(
                "event=cards_add module=board status=error column_id={} error={}",
                intake.id, err
            ),
        }
        result
    }

    async fn ensure_column_exists(&self, column_id: &str) -> BoardResult<Column> {
        self.load_columns()
            .await?
            .into_iter()
            .find(|column| column.id == column_id)
            .ok_or_else(|| BoardError::UnknownColumn(column_id.to_string()))
    }
}

fn require_id<'a>(value: &'a str, label: &str) -> BoardResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BoardError::InvalidArgument(format!("{label} is required")));
    }
    Ok(trimmed)
}

/// Next free sort order at the end of `column_id`, ignoring the card at `skip`.
fn next_sort_order(cards: &[Card], column_id: &str, skip: Option<usize>) -> i64 {
    cards
        .iter()
        .enumerate()
        .filter(|(position, card)| Some(*position) != skip && card.column_id == column_id)
        .filter_map(|(_, card)| card.column_sort_order)
        .max()
        .unwrap_or(0)
        + 1
}

fn max_numeric_id(cards: &[Card]) -> u64 {
    cards
        .iter()
        .filter_map(|card| NON_DIGIT_RE.replace_all(&card.id, "").parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

fn max_ticket_number(cards: &[Card]) -> u64 {
    cards
        .iter()
        .filter_map(|card| card.ticket_id.as_deref())
        .filter_map(|ticket| TRAILING_NUMBER_RE.captures(ticket))
        .filter_map(|captures| captures[1].parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

fn log_card_result(event: &str, card_id: &str, result: &BoardResult<Card>) {
    match result {
        Ok(card) => info!(
            "event={} module=board status=ok card_id={} column_id={} locked={}",
            event, card.id, card.column_id, card.locked
        ),
        Err(err) => error!(
            "event={} module=board status=error card_id={} error={}",
            event, card_id, err
        ),
    }
}
