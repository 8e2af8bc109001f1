//! In-process write serialization.
//!
//! # Responsibility
//! - Provide the per-resource mutation queues used by every board write.
//!
//! # Invariants
//! - Cooperative and single-process only; other processes writing the same
//!   files are not excluded.

mod resource_queue;

pub use resource_queue::{QueueError, ResourceQueues};
