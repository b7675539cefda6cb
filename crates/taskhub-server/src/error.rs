use taskhub_core::error::TaskhubError;
use taskhub_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot read config file {path}: {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),

    /// Connecting to the store or applying migrations failed.
    #[error(transparent)]
    Store(#[from] DbError),

    #[error("seeding failed: {0}")]
    Seed(#[from] TaskhubError),
}
