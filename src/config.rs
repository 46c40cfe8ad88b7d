use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};

use crate::input::LastRow;
use crate::request::{RetryPolicy, SearchEngine};
use crate::{Error, Result};

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrapes search result URLs for a list of keywords")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y', global = true, default_value_t = false)]
    pub yes: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape the terms of a CSV file into an output CSV file
    Csv(CsvArgs),
    /// Scrape the pending terms of a campaign and store the results in the database
    Queue(QueueArgs),
    /// Load the terms of a CSV file into the queue table as a new campaign
    Enqueue(EnqueueArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct CsvArgs {
    /// Input CSV, with a header row and the search term in the first column
    #[arg(long, default_value = "input.csv")]
    pub input: PathBuf,

    /// Output CSV path, derived from the parameters when missing
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// First data row to process (1-based)
    #[arg(long, default_value_t = 1)]
    pub start_row: usize,

    /// Last data row to process, or 'all'
    #[arg(long, default_value_t = LastRow::All)]
    pub last_row: LastRow,

    #[command(flatten)]
    pub search: SearchArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct QueueArgs {
    /// Campaign whose pending terms get scraped
    #[arg(long)]
    pub campaign_id: i64,

    #[command(flatten)]
    pub search: SearchArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct EnqueueArgs {
    /// CSV with a 'search_term' column (or the terms in the first column)
    #[arg(long, default_value = "input.csv")]
    pub input: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SearchArgs {
    /// Maximum number of result URLs kept per term
    #[arg(long = "results", default_value_t = 25)]
    pub results_to_return: usize,

    /// Attempts per term before giving up
    #[arg(long, default_value_t = 3)]
    pub attempts: u32,

    /// Seconds to wait between attempts
    #[arg(long, default_value_t = 10)]
    pub retry_delay: u64,

    /// Pages with fewer results are treated as failed attempts
    #[arg(long = "min-results", default_value_t = 20)]
    pub min_acceptable: usize,

    #[arg(long, value_enum, default_value_t = SearchEngine::DuckDuckGo)]
    pub engine: SearchEngine,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Error log path, derived from the parameters when missing
    #[arg(long)]
    pub error_log: Option<PathBuf>,
}

impl SearchArgs {
    pub fn policy(&self) -> Result<RetryPolicy> {
        if self.attempts == 0 {
            return Err(Error::Config("attempts must be at least 1".into()));
        }
        if self.results_to_return == 0 {
            return Err(Error::Config("results must be at least 1".into()));
        }
        if self.min_acceptable > self.results_to_return {
            return Err(Error::Config(format!(
                "min-results ({}) can't exceed results ({}), every page would fail",
                self.min_acceptable, self.results_to_return
            )));
        }
        Ok(RetryPolicy {
            attempts: self.attempts,
            delay: Duration::from_secs(self.retry_delay),
            min_acceptable: self.min_acceptable,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    fn params(&self) -> Params {
        vec![
            ("results_to_return", self.results_to_return.to_string()),
            ("attempts", self.attempts.to_string()),
            ("retry_delay", self.retry_delay.to_string()),
            ("min_results", self.min_acceptable.to_string()),
            ("search_engine", self.engine.to_string()),
        ]
    }
}

/// Ordered `(name, value)` pairs shown to the operator and used to name output files.
pub type Params = Vec<(&'static str, String)>;

impl CsvArgs {
    pub fn validate(&self) -> Result<RetryPolicy> {
        if self.start_row == 0 {
            return Err(Error::Config("start-row is 1-based".into()));
        }
        self.search.policy()
    }

    pub fn params(&self) -> Params {
        let mut params = vec![
            ("input_filename", self.input.display().to_string()),
            ("start_row", self.start_row.to_string()),
            ("last_row", self.last_row.to_string()),
        ];
        params.extend(self.search.params());
        params
    }
}

impl QueueArgs {
    pub fn params(&self) -> Params {
        let mut params = vec![("campaign_id", self.campaign_id.to_string())];
        params.extend(self.search.params());
        params
    }
}

/// Output and error log locations for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFiles {
    pub output: PathBuf,
    pub error_log: PathBuf,
}

impl RunFiles {
    /// Fills in missing paths as `output_<params>_<timestamp>.csv` and `error_<params>_<timestamp>.txt`.
    pub fn resolve(params: &Params, output: Option<PathBuf>, error_log: Option<PathBuf>) -> Self {
        let stamp = Local::now().format("%b%d_%Y_%I-%M-%S_%p").to_string().to_lowercase();
        let label = param_label(params);
        Self {
            output: output.unwrap_or_else(|| PathBuf::from(format!("output_{label}_{stamp}.csv"))),
            error_log: error_log.unwrap_or_else(|| PathBuf::from(format!("error_{label}_{stamp}.txt"))),
        }
    }
}

pub fn param_label(params: &Params) -> String {
    let joined = params
        .iter()
        .map(|(key, value)| format!("{key}{value}"))
        .collect::<Vec<_>>()
        .join("_");
    sanitize_filename(&joined)
}

/// Replaces characters that aren't allowed in file names on common platforms.
pub fn sanitize_filename(name: &str) -> String {
    name.replace(['<', '>', ':', '"', '/', '\\', '|', '?', '*'], "_")
}

/// Prints the parameters and asks the operator to confirm them.
pub fn confirm(params: &Params) -> Result<bool> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "Confirmation:")?;
    for (key, value) in params {
        writeln!(stdout, "  {key}: {value}")?;
    }
    write!(stdout, "Continue with these parameters? (y/n): ")?;
    stdout.flush()?;
    drop(stdout);

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
