//! Board use-case services.
//!
//! # Responsibility
//! - Orchestrate queue, store and reconciliation into board operations.
//! - Keep request handlers decoupled from storage details.

pub mod board_service;
pub mod reconcile;
