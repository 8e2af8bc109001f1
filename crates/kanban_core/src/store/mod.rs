//! JSON document storage for board collections.
//!
//! # Responsibility
//! - Load and atomically persist the `cards` and `columns` collections.
//! - Seed missing collections from bundled or configured templates.
//!
//! # Invariants
//! - Writes go through temp file + rename; a final path is never written in place.
//! - Every load re-reads storage; nothing is cached between calls.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

mod document_store;
mod seed;

pub use document_store::{DocumentStore, StagedWrite};
pub use seed::{ensure_collections, SeedError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Named collections persisted by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Columns,
    Cards,
}

impl Collection {
    /// Every known collection, in seeding order.
    pub const ALL: [Collection; 2] = [Collection::Columns, Collection::Cards];

    /// File name under the data directory. Also the mutation queue key.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Columns => "columns.json",
            Self::Cards => "cards.json",
        }
    }

    /// Template file name used when seeding from a template directory.
    pub fn template_name(self) -> &'static str {
        match self {
            Self::Columns => "columns_sample.json",
            Self::Cards => "cards_sample.json",
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

#[derive(Debug)]
pub enum StoreError {
    /// Collection file does not exist.
    NotFound {
        collection: Collection,
        path: PathBuf,
    },
    /// Stored bytes are not well-formed JSON of the expected shape.
    Corrupt {
        collection: Collection,
        source: serde_json::Error,
    },
    /// In-memory value could not be serialized.
    Serialization {
        collection: Collection,
        source: serde_json::Error,
    },
    /// Storage read/write/rename failed.
    Io {
        collection: Collection,
        path: PathBuf,
        source: io::Error,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { collection, path } => {
                write!(f, "collection `{collection}` not found at `{}`", path.display())
            }
            Self::Corrupt { collection, source } => {
                write!(f, "collection `{collection}` is corrupt: {source}")
            }
            Self::Serialization { collection, source } => {
                write!(f, "failed to serialize collection `{collection}`: {source}")
            }
            Self::Io {
                collection,
                path,
                source,
            } => write!(
                f,
                "storage failure for collection `{collection}` at `{}`: {source}",
                path.display()
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound { .. } => None,
            Self::Corrupt { source, .. } => Some(source),
            Self::Serialization { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}
