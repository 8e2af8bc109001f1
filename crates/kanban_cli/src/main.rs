//! Command-line front end for a JSON kanban board.
//!
//! # Responsibility
//! - Map subcommands onto `BoardService` operations.
//! - Print results as pretty JSON on stdout and failures on stderr.
//!
//! Every mutating command seeds missing collections first, the same way a
//! long-running service would on startup.

use clap::{Parser, Subcommand};
use kanban_core::config::{ENV_DATA_DIR, ENV_LOCK_POLICY};
use kanban_core::{
    init_logging, BoardConfig, BoardError, BoardService, ConfigError, LoggingError,
    ReconcileRequest, SeedError,
};
use log::info;
use serde::Serialize;
use serde_json::json;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "kanban")]
#[command(about = "Serialized mutations over a JSON-file kanban board", version)]
struct Cli {
    /// Directory holding columns.json and cards.json
    #[arg(long, global = true, env = ENV_DATA_DIR)]
    data_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true, default_value_t = kanban_core::default_log_level().to_string())]
    log_level: String,

    /// Write rotating log files into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Whether locked cards may be repositioned (enforce|ignore)
    #[arg(long, global = true, env = ENV_LOCK_POLICY)]
    lock_policy: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create missing collections from templates
    Seed,
    /// Print columns and cards
    Board,
    /// Apply a new order to one column
    Reorder {
        column_id: String,
        /// Card the user dragged
        #[arg(long = "moved")]
        moved_card_id: String,
        /// Desired order; may be partial
        card_ids: Vec<String>,
    },
    /// Lock or unlock a card
    Lock {
        card_id: String,
        #[arg(long)]
        unlock: bool,
    },
    /// Move a card to the end of another column
    Move { card_id: String, column_id: String },
    /// Add cards to the intake column, one per title
    Add {
        #[arg(required = true)]
        titles: Vec<String>,
    },
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Seed(SeedError),
    Board(BoardError),
    Output(serde_json::Error),
}

impl CliError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Logging(_) => "logging",
            Self::Seed(_) => "seed",
            Self::Board(err) => err.kind().as_str(),
            Self::Output(_) => "output",
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Seed(err) => write!(f, "{err}"),
            Self::Board(err) => write!(f, "{err}"),
            Self::Output(err) => write!(f, "failed to render output: {err}"),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<SeedError> for CliError {
    fn from(value: SeedError) -> Self {
        Self::Seed(value)
    }
}

impl From<BoardError> for CliError {
    fn from(value: BoardError) -> Self {
        Self::Board(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error[{}]: {}", err.kind(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Some(log_dir) = &cli.log_dir {
        init_logging(&cli.log_level, &absolute(log_dir))?;
    }

    let config = load_config(&cli)?;
    let service = BoardService::new(config);
    let seeded = service.ensure_collections().await?;
    info!(
        "event=cli_start module=cli status=ok seeded={} lock_policy={}",
        seeded.len(),
        service.config().lock_policy.as_str()
    );

    match cli.command {
        Commands::Seed => {
            let names: Vec<String> = seeded.iter().map(ToString::to_string).collect();
            print_json(&json!({ "seeded": names }))
        }
        Commands::Board => print_json(&service.load_board().await?),
        Commands::Reorder {
            column_id,
            moved_card_id,
            card_ids,
        } => {
            let request = ReconcileRequest::new(column_id, card_ids, moved_card_id);
            let summary = service.reconcile_order(request).await?;
            print_json(&json!({
                "columnId": summary.column_id,
                "count": summary.count,
                "matched": summary.matched,
            }))
        }
        Commands::Lock { card_id, unlock } => {
            print_json(&service.set_locked(&card_id, !unlock).await?)
        }
        Commands::Move { card_id, column_id } => {
            print_json(&service.move_card(&card_id, &column_id).await?)
        }
        Commands::Add { titles } => print_json(&service.add_titles(titles.as_slice()).await?),
    }
}

/// clap already resolved data dir and lock policy from flags or `KANBAN_*`.
fn load_config(cli: &Cli) -> Result<BoardConfig, ConfigError> {
    let data_dir = cli.data_dir.as_deref().map(absolute);
    BoardConfig::from_lookup(|key| match key {
        ENV_DATA_DIR => data_dir.as_ref().map(|dir| dir.display().to_string()),
        ENV_LOCK_POLICY => cli.lock_policy.clone(),
        _ => std::env::var(key).ok(),
    })
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_config, Cli, Commands};
    use clap::Parser;
    use kanban_core::LockPolicy;
    use std::path::PathBuf;

    #[test]
    fn reorder_parses_partial_order_and_moved_card() {
        let cli = Cli::parse_from([
            "kanban",
            "--data-dir",
            "/tmp/board",
            "reorder",
            "col-ready",
            "--moved",
            "3",
            "3",
            "1",
        ]);
        match cli.command {
            Commands::Reorder {
                column_id,
                moved_card_id,
                card_ids,
            } => {
                assert_eq!(column_id, "col-ready");
                assert_eq!(moved_card_id, "3");
                assert_eq!(card_ids, vec!["3".to_string(), "1".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn add_requires_at_least_one_title() {
        assert!(Cli::try_parse_from(["kanban", "add"]).is_err());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::parse_from(["kanban", "lock", "6", "--unlock", "--lock-policy", "ignore"]);
        assert_eq!(cli.lock_policy.as_deref(), Some("ignore"));
        assert!(matches!(cli.command, Commands::Lock { unlock: true, .. }));
    }

    #[test]
    fn data_dir_and_lock_policy_fall_back_to_environment() {
        std::env::set_var("KANBAN_DATA_DIR", "/srv/kanban-from-env");
        std::env::set_var("KANBAN_LOCK_POLICY", "ignore");
        let cli = Cli::parse_from(["kanban", "board"]);
        std::env::remove_var("KANBAN_DATA_DIR");
        std::env::remove_var("KANBAN_LOCK_POLICY");

        assert_eq!(cli.data_dir, Some(PathBuf::from("/srv/kanban-from-env")));
        let config = load_config(&cli).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/kanban-from-env"));
        assert_eq!(config.lock_policy, LockPolicy::Ignore);
    }
}
