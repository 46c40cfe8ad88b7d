use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The result selector couldn't be parsed. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("Search endpoint answered with HTTP status {0}")]
    BadStatus(u16),
    #[error("Only {found} results on the page, expected at least {expected}")]
    InsufficientResults { found: usize, expected: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("Couldn't set up logging: {0}")]
    Logging(String),
    #[error("Row {0} has no queue id, it can't be written to the queue table")]
    MissingQueueId(usize),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Csv Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),
}
