//! First-run seeding of missing collections.
//!
//! # Invariants
//! - Existing collection files are never overwritten.
//! - Templates must decode as the collection's element type before they are written.
//! - Seeding writes through `DocumentStore::save`, so it is atomic like any other write.

use super::{Collection, DocumentStore, StoreError};
use crate::model::{Card, Column};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const BUNDLED_COLUMNS: &str = include_str!("../../templates/columns_sample.json");
const BUNDLED_CARDS: &str = include_str!("../../templates/cards_sample.json");

#[derive(Debug)]
pub enum SeedError {
    /// Configured template file does not exist or cannot be read.
    TemplateMissing {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Template exists but is not a valid collection document.
    TemplateCorrupt {
        collection: Collection,
        source: serde_json::Error,
    },
    /// Creating the data directory failed.
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
    Store(StoreError),
}

impl Display for SeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateMissing { path, source } => {
                write!(f, "seed template `{}` unavailable: {source}", path.display())
            }
            Self::TemplateCorrupt { collection, source } => {
                write!(f, "seed template for `{collection}` is corrupt: {source}")
            }
            Self::DataDir { path, source } => write!(
                f,
                "failed to create data directory `{}`: {source}",
                path.display()
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TemplateMissing { source, .. } => Some(source),
            Self::TemplateCorrupt { source, .. } => Some(source),
            Self::DataDir { source, .. } => Some(source),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for SeedError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Ensures every known collection exists, copying templates for missing ones.
///
/// `template_dir = None` uses the templates compiled into this crate.
/// Returns the collections that were seeded by this call.
///
/// # Errors
/// - Template missing/corrupt, data directory creation or storage failures.
///   None of them are swallowed: a half-seeded store must stop startup.
pub async fn ensure_collections(
    store: &DocumentStore,
    template_dir: Option<&Path>,
) -> Result<Vec<Collection>, SeedError> {
    let data_dir = store.data_dir();
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|source| SeedError::DataDir {
            path: data_dir.to_path_buf(),
            source,
        })?;

    let mut seeded = Vec::new();
    for collection in Collection::ALL {
        if store.exists(collection).await? {
            continue;
        }

        let template = read_template(collection, template_dir).await?;
        if let Err(err) = seed_one(store, collection, template.as_str()).await {
            error!(
                "event=collection_seed module=store status=error collection={} error={}",
                collection, err
            );
            return Err(err);
        }
        info!(
            "event=collection_seed module=store status=ok collection={}",
            collection
        );
        seeded.push(collection);
    }
    Ok(seeded)
}

async fn read_template(
    collection: Collection,
    template_dir: Option<&Path>,
) -> Result<String, SeedError> {
    let Some(dir) = template_dir else {
        return Ok(match collection {
            Collection::Columns => BUNDLED_COLUMNS.to_string(),
            Collection::Cards => BUNDLED_CARDS.to_string(),
        });
    };

    let path = dir.join(collection.template_name());
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                error!(
                    "event=collection_seed module=store status=error collection={} error_code=template_missing",
                    collection
                );
            }
            SeedError::TemplateMissing { path, source }
        })
}

async fn seed_one(
    store: &DocumentStore,
    collection: Collection,
    template: &str,
) -> Result<(), SeedError> {
    let corrupt = |source| SeedError::TemplateCorrupt { collection, source };
    match collection {
        Collection::Columns => {
            let columns: Vec<Column> = serde_json::from_str(template).map_err(corrupt)?;
            store.save(collection, &columns).await?;
        }
        Collection::Cards => {
            let cards: Vec<Card> = serde_json::from_str(template).map_err(corrupt)?;
            store.save(collection, &cards).await?;
        }
    }
    Ok(())
}
