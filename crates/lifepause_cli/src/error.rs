use lifepause_core::db::DbError;
use lifepause_core::{ConfigError, FreezeCacheError, FreezeServiceError, LoggingError, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    Logging(LoggingError),
    Config(ConfigError),
    Db(DbError),
    Freeze(FreezeServiceError),
    Cache(FreezeCacheError),
    Io(std::io::Error),
    InvalidArgument(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(err) => write!(f, "logging: {err}"),
            Self::Config(err) => write!(f, "config: {err}"),
            Self::Db(err) => write!(f, "database: {err}"),
            Self::Freeze(err) => write!(f, "{err}"),
            Self::Cache(err) => write!(f, "freeze state: {err}"),
            Self::Io(err) => write!(f, "io: {err}"),
            Self::InvalidArgument(message) => write!(f, "{message}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Freeze(err) => Some(err),
            Self::Cache(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::InvalidArgument(_) => None,
        }
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<FreezeServiceError> for CliError {
    fn from(value: FreezeServiceError) -> Self {
        Self::Freeze(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Freeze(value.into())
    }
}

impl From<FreezeCacheError> for CliError {
    fn from(value: FreezeCacheError) -> Self {
        Self::Cache(value)
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
