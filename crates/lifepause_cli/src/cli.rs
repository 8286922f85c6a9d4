use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use lifepause_core::{
    parse_module_tag, ConfigError, FreezePeriodId, FreezeReason, GuardConfig, ModuleTag,
    ModuleTagError, OwnerId,
};
use lifepause_http::DEFAULT_OWNER_HEADER;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lifepause", about = "LifePause freeze periods and module guard", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, global = true)]
    pub log_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a health-check reply
    Ping,

    /// Print the core crate version
    Version,

    /// Show which modules an owner currently has frozen
    Frozen {
        #[command(flatten)]
        db: DbArgs,

        /// Owner id
        #[arg(long)]
        owner: OwnerId,

        #[command(flatten)]
        guard: GuardArgs,
    },

    /// Manage freeze periods
    #[command(subcommand)]
    Period(PeriodCommand),

    /// Run an HTTP server with the freeze guard in front of every route
    Serve {
        #[command(flatten)]
        db: DbArgs,

        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,

        /// Header carrying the authenticated owner id
        #[arg(long, default_value = DEFAULT_OWNER_HEADER)]
        owner_header: String,

        #[command(flatten)]
        guard: GuardArgs,
    },
}

#[derive(Subcommand)]
pub enum PeriodCommand {
    /// Schedule a new freeze period
    Schedule {
        #[command(flatten)]
        db: DbArgs,

        #[arg(long)]
        owner: OwnerId,

        /// First frozen day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last frozen day (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        #[arg(long, value_enum)]
        reason: ReasonArg,

        /// Free text, required with `--reason other`
        #[arg(long)]
        custom_reason: Option<String>,

        /// Comma-separated module tags, e.g. `finance,home`
        #[arg(long, required = true, value_delimiter = ',', value_parser = parse_module_arg)]
        modules: Vec<ModuleTag>,
    },

    /// Move a scheduled period to active
    Activate(PeriodIdArgs),

    /// Move an active period to completed
    Complete(PeriodIdArgs),

    /// Cancel a scheduled or active period
    Cancel(PeriodIdArgs),

    /// Replace the module set of a non-terminal period
    SetModules {
        #[command(flatten)]
        target: PeriodIdArgs,

        #[arg(long, required = true, value_delimiter = ',', value_parser = parse_module_arg)]
        modules: Vec<ModuleTag>,
    },

    /// Delete a period and its modules
    Delete(PeriodIdArgs),

    /// List an owner's periods ordered by start date
    List {
        #[command(flatten)]
        db: DbArgs,

        #[arg(long)]
        owner: OwnerId,
    },
}

#[derive(Args)]
pub struct DbArgs {
    /// SQLite database file
    #[arg(long = "db")]
    pub path: PathBuf,
}

#[derive(Args)]
pub struct PeriodIdArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Freeze period id
    #[arg(long)]
    pub id: FreezePeriodId,
}

/// Freeze guard cache tuning
#[derive(Args, Debug, Clone, Copy)]
pub struct GuardArgs {
    /// Seconds a cached frozen-module snapshot stays valid
    #[arg(long, env = "LIFEPAUSE_FREEZE_CACHE_TTL_SECS", default_value = "60")]
    pub cache_ttl_secs: u64,

    /// Milliseconds allowed for one freeze store read before failing open
    #[arg(long, env = "LIFEPAUSE_FREEZE_STORE_TIMEOUT_MS", default_value = "2000")]
    pub store_timeout_ms: u64,

    /// Maximum owners kept in the freeze cache
    #[arg(long, env = "LIFEPAUSE_FREEZE_CACHE_MAX_ENTRIES", default_value = "10000")]
    pub cache_max_entries: usize,
}

impl GuardArgs {
    pub fn to_config(self) -> Result<GuardConfig, ConfigError> {
        GuardConfig::new(
            Duration::from_secs(self.cache_ttl_secs),
            Duration::from_millis(self.store_timeout_ms),
            self.cache_max_entries,
        )
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReasonArg {
    Vacation,
    Travel,
    Illness,
    IntenseProject,
    MentalRest,
    Other,
}

impl From<ReasonArg> for FreezeReason {
    fn from(value: ReasonArg) -> Self {
        match value {
            ReasonArg::Vacation => FreezeReason::Vacation,
            ReasonArg::Travel => FreezeReason::Travel,
            ReasonArg::Illness => FreezeReason::Illness,
            ReasonArg::IntenseProject => FreezeReason::IntenseProject,
            ReasonArg::MentalRest => FreezeReason::MentalRest,
            ReasonArg::Other => FreezeReason::Other,
        }
    }
}

fn parse_module_arg(value: &str) -> Result<ModuleTag, ModuleTagError> {
    parse_module_tag(&value.trim().to_ascii_uppercase())
}
