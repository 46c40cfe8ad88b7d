//! SUPERSCRAPER
//! Looks up search terms on a results page and records the result URLs,
//! either from a CSV file into a CSV file or from the campaign queue table back into the database.

pub mod config;
mod error;
pub mod input;
pub mod logger;
mod macros;
pub mod parse;
pub mod pause;
pub mod process;
pub mod queue;
pub mod request;
pub mod sink;
pub mod stats;

pub use error::{Error, Result};
