//! Board engine configuration.
//!
//! # Responsibility
//! - Describe where collections live and which product rules apply.
//! - Read the same settings from process environment for the CLI.
//!
//! # Invariants
//! - `data_dir` is always set; every other field has a default.
//! - Unparseable environment values are errors, never silently defaulted.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DATA_DIR: &str = "KANBAN_DATA_DIR";
pub const ENV_TEMPLATE_DIR: &str = "KANBAN_TEMPLATE_DIR";
pub const ENV_LOCK_POLICY: &str = "KANBAN_LOCK_POLICY";
pub const ENV_QUEUE_TIMEOUT_MS: &str = "KANBAN_QUEUE_TIMEOUT_MS";

const DEFAULT_INTAKE_COLUMN_TITLE: &str = "Ready";
const DEFAULT_POSTED_COLUMN_TITLE: &str = "Posted";
const DEFAULT_TICKET_PREFIX: &str = "PROJ";

/// Whether locked cards may be repositioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// Reject any reorder or move that would change a locked card's placement.
    #[default]
    Enforce,
    /// Treat `locked` as display-only.
    Ignore,
}

impl LockPolicy {
    /// Parses `enforce|ignore` (case-insensitive, surrounding blanks allowed).
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "enforce" | "strict" => Ok(Self::Enforce),
            "ignore" | "off" => Ok(Self::Ignore),
            other => Err(ConfigError::InvalidLockPolicy(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enforce => "enforce",
            Self::Ignore => "ignore",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingDataDir,
    InvalidLockPolicy(String),
    InvalidQueueTimeout(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDataDir => write!(f, "`{ENV_DATA_DIR}` must point to the data directory"),
            Self::InvalidLockPolicy(value) => {
                write!(f, "unsupported lock policy `{value}`; expected enforce|ignore")
            }
            Self::InvalidQueueTimeout(value) => write!(
                f,
                "invalid queue timeout `{value}`; expected a positive number of milliseconds"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Settings for one board engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// Directory holding `columns.json` and `cards.json`.
    pub data_dir: PathBuf,
    /// Directory with `*_sample.json` seed templates; bundled templates when `None`.
    pub template_dir: Option<PathBuf>,
    pub lock_policy: LockPolicy,
    /// Column that receives newly added cards.
    pub intake_column_title: String,
    /// Moving a card into this column locks it.
    pub posted_column_title: String,
    /// Prefix for generated ticket ids, e.g. `PROJ` in `PROJ-007`.
    pub ticket_prefix: String,
    /// Upper bound on waiting for a resource's mutation queue.
    pub queue_timeout: Option<Duration>,
}

impl BoardConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            template_dir: None,
            lock_policy: LockPolicy::default(),
            intake_column_title: DEFAULT_INTAKE_COLUMN_TITLE.to_string(),
            posted_column_title: DEFAULT_POSTED_COLUMN_TITLE.to_string(),
            ticket_prefix: DEFAULT_TICKET_PREFIX.to_string(),
            queue_timeout: None,
        }
    }

    pub fn with_template_dir(mut self, template_dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(template_dir.into());
        self
    }

    pub fn with_lock_policy(mut self, lock_policy: LockPolicy) -> Self {
        self.lock_policy = lock_policy;
        self
    }

    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = Some(timeout);
        self
    }

    pub fn with_intake_column_title(mut self, title: impl Into<String>) -> Self {
        self.intake_column_title = title.into();
        self
    }

    pub fn with_posted_column_title(mut self, title: impl Into<String>) -> Self {
        self.posted_column_title = title.into();
        self
    }

    pub fn with_ticket_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ticket_prefix = prefix.into();
        self
    }

    /// Builds configuration from `KANBAN_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let data_dir = non_blank(ENV_DATA_DIR).ok_or(ConfigError::MissingDataDir)?;
        let mut config = Self::new(data_dir.trim());

        if let Some(dir) = non_blank(ENV_TEMPLATE_DIR) {
            config.template_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(policy) = non_blank(ENV_LOCK_POLICY) {
            config.lock_policy = LockPolicy::parse(&policy)?;
        }
        if let Some(timeout) = non_blank(ENV_QUEUE_TIMEOUT_MS) {
            config.queue_timeout = Some(parse_timeout_ms(&timeout)?);
        }
        Ok(config)
    }
}

fn parse_timeout_ms(value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidQueueTimeout(value.trim().to_string())),
    }
}
