//! Serialized mutation engine for a JSON-file kanban board.
//! This crate is the single source of truth for board ordering invariants.

pub mod config;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod sync;

pub use config::{BoardConfig, ConfigError, LockPolicy};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{Board, Card, CardId, Column, ColumnId};
pub use service::board_service::{BoardError, BoardResult, BoardService, ErrorClass};
pub use service::reconcile::{apply_column_order, ReconcileRequest, ReconcileSummary};
pub use store::{
    ensure_collections, Collection, DocumentStore, SeedError, StagedWrite, StoreError, StoreResult,
};
pub use sync::{QueueError, ResourceQueues};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
