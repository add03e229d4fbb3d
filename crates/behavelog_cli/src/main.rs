//! Command-line front end for the behavior log.
//!
//! # Responsibility
//! - Stand in for the entry form: print form options, submit entries,
//!   review logged entries.
//! - Provide the administrative `config` commands that edit properties.
//!
//! Output is JSON on stdout; failures print a JSON error object and exit
//! non-zero.

use behavelog_core::db::open_db;
use behavelog_core::{
    default_log_level, init_logging, CandidateEntry, ConfigStore, EntryListQuery, EntryService,
    EntryValidator, EnvConfigStore, SqliteConfigStore, SqliteEntryLog, SubmissionError, KEY_BEHAVIOR_CATEGORIES,
    KEY_DEFAULT_USER, KEY_IMPACT_TYPES,
};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use rusqlite::{params, Connection};
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

const EXIT_REJECTED: u8 = 2;
const EXIT_RETRYABLE: u8 = 75;

#[derive(Parser)]
#[command(name = "behavelog")]
#[command(version)]
#[command(about = "Log behaviors with categories and impact types")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file
    #[arg(long, global = true, env = "BEHAVELOG_DB", default_value = "behavelog.db")]
    db: PathBuf,

    /// Where form options come from
    #[arg(long, global = true, value_enum, default_value_t = ConfigSource::Db)]
    config_source: ConfigSource,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true, env = "BEHAVELOG_LOG_LEVEL")]
    log_level: Option<String>,

    /// Accepted clock drift for submitted timestamps, in seconds
    #[arg(long, global = true, default_value_t = 300)]
    max_future_skew_secs: u64,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, global = true, env = "BEHAVELOG_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConfigSource {
    /// `config_properties` table in the database
    Db,
    /// `BEHAVELOG_<KEY>` environment variables
    Env,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the categories and impact types the form offers
    Options,

    /// Submit one entry
    Submit {
        #[arg(short, long)]
        behavior: String,
        #[arg(short, long)]
        category: String,
        #[arg(short, long)]
        impact_type: String,
        #[arg(short, long, default_value = "")]
        user: String,
        /// RFC 3339 instant or epoch milliseconds; defaults to now
        #[arg(short, long, default_value = "")]
        timestamp: String,
    },

    /// List logged entries in the order they were recorded
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        impact_type: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Show one entry by id
    Show { id: i64 },

    /// Administrative access to configuration properties
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a property, e.g. `config set BEHAVIOR_CATEGORIES "Work, Sleep"`
    Set { key: ConfigKey, value: String },
    /// Print the raw stored value of a property
    Get { key: ConfigKey },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
enum ConfigKey {
    BehaviorCategories,
    ImpactTypes,
    DefaultUser,
}

impl ConfigKey {
    fn as_str(self) -> &'static str {
        match self {
            Self::BehaviorCategories => KEY_BEHAVIOR_CATEGORIES,
            Self::ImpactTypes => KEY_IMPACT_TYPES,
            Self::DefaultUser => KEY_DEFAULT_USER,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliFailure::Submission(err)) => {
            print_json(&json!({
                "error": err.code(),
                "message": err.to_string(),
                "retryable": err.is_retryable(),
                "field": match &err {
                    SubmissionError::Rejected(reason) => Some(reason.field()),
                    SubmissionError::PersistFailed(_) => None,
                },
            }));
            if err.is_retryable() {
                ExitCode::from(EXIT_RETRYABLE)
            } else if matches!(err, SubmissionError::Rejected(_)) {
                ExitCode::from(EXIT_REJECTED)
            } else {
                ExitCode::FAILURE
            }
        }
        Err(CliFailure::Other(err)) => {
            print_json(&json!({ "error": "failed", "message": err.to_string() }));
            ExitCode::FAILURE
        }
    }
}

enum CliFailure {
    Submission(SubmissionError),
    Other(Box<dyn Error>),
}

impl<E: Error + 'static> From<E> for CliFailure {
    fn from(value: E) -> Self {
        Self::Other(Box::new(value))
    }
}

fn run(cli: Cli) -> Result<(), CliFailure> {
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir.to_string_lossy())?;
    }

    let conn = open_db(&cli.db)?;
    info!("event=cli_command module=cli status=start db={}", cli.db.display());

    let validator =
        EntryValidator::with_max_future_skew(Duration::from_secs(cli.max_future_skew_secs));
    match cli.config_source {
        ConfigSource::Db => {
            let store = SqliteConfigStore::try_new(&conn)?;
            dispatch(cli.command, &conn, store, validator)
        }
        ConfigSource::Env => dispatch(
            cli.command,
            &conn,
            EnvConfigStore::with_prefix("BEHAVELOG_"),
            validator,
        ),
    }
}

fn dispatch<C: ConfigStore>(
    command: Commands,
    conn: &Connection,
    store: C,
    validator: EntryValidator,
) -> Result<(), CliFailure> {
    let service =
        EntryService::new(store, SqliteEntryLog::try_new(conn)?).with_validator(validator);

    match command {
        Commands::Options => print_json(&service.get_form_options()),
        Commands::Submit {
            behavior,
            category,
            impact_type,
            user,
            timestamp,
        } => {
            let entry = CandidateEntry::new(behavior, category, impact_type)
                .with_user(user)
                .with_timestamp(timestamp);
            let logged = service.submit(&entry).map_err(CliFailure::Submission)?;
            print_json(&logged);
        }
        Commands::List {
            category,
            impact_type,
            limit,
            offset,
        } => {
            let entries = service.list_entries(&EntryListQuery {
                category,
                impact_type,
                limit,
                offset,
            })?;
            print_json(&entries);
        }
        Commands::Show { id } => match service.get_entry(id)? {
            Some(entry) => print_json(&entry),
            None => {
                return Err(CliFailure::Other(
                    format!("entry not found: {id}").into(),
                ))
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Set { key, value } => {
                set_property(conn, key.as_str(), &value)?;
                print_json(&json!({ "key": key.as_str(), "value": value }));
            }
            ConfigAction::Get { key } => {
                let store = SqliteConfigStore::try_new(conn)?;
                print_json(&json!({ "key": key.as_str(), "value": store.get(key.as_str()) }));
            }
        },
    }
    Ok(())
}

/// Administrative write; the core itself never writes configuration.
fn set_property(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO config_properties (key, value) VALUES (?1, ?2)
         ON CONFLICT (key) DO UPDATE SET
            value = excluded.value,
            updated_at_ms = (strftime('%s', 'now') * 1000);",
        params![key, value],
    )?;
    info!("event=config_set module=cli status=ok key={key}");
    Ok(())
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("failed to encode output: {err}"),
    }
}
