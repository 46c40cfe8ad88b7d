use std::fs::File;

use chrono::Local;
use tracing::{error, info, warn};

use crate::config::{self, Args, Command, CsvArgs, EnqueueArgs, Params, QueueArgs, RunFiles, SearchArgs};
use crate::input::{self, SearchRow};
use crate::pause::{spawn_operator_input, PauseController};
use crate::request::{FetchOutcome, Fetcher, HttpSearchClient, SearchClient};
use crate::sink::{CsvSink, QueueSink, RowSink};
use crate::stats::RunStatistics;
use crate::{info_time, logger, queue, Result};

/// Drives a run: one row at a time, in input order, pausing only between rows.
pub struct RowProcessor<C, S> {
    fetcher: Fetcher<C>,
    sink: S,
    pause: PauseController,
}

impl<C: SearchClient, S: RowSink> RowProcessor<C, S> {
    pub fn new(fetcher: Fetcher<C>, sink: S, pause: PauseController) -> Self {
        Self { fetcher, sink, pause }
    }

    /// Processes every row. A row that yields nothing (or whose write fails) never stops the run;
    /// only writing the header or the final flush can.
    pub async fn run(&mut self, rows: Vec<SearchRow>) -> Result<RunStatistics> {
        let mut stats = RunStatistics::start(rows.len(), self.fetcher.engine().to_string());
        self.sink.begin(self.fetcher.cap()).await?;

        for row in rows {
            self.pause.checkpoint().await;

            info_time!("Row {}: Search Term: {}", row.number, row.term);
            let outcome = if row.term.is_empty() {
                warn!("Row {} has an empty search term, skipping the search", row.number);
                FetchOutcome::Exhausted { attempts: 0 }
            } else {
                self.fetcher.fetch(&row.term).await
            };

            let results = outcome.results();
            let written = if results.is_empty() {
                info_time!("No more results");
                self.sink.record_exhausted(&row).await
            } else {
                for (i, url) in results.iter().enumerate() {
                    println!("Result {}: {}", i + 1, url);
                }
                self.sink.record_results(&row, results).await
            };
            // A lost write still counts as a processed row, but its results weren't kept.
            let stored = match written {
                Ok(()) => results.len(),
                Err(e) => {
                    error!("Failed to record row {} (search term '{}'): {e}", row.number, row.term);
                    0
                }
            };

            stats.record_row(row.number, stored);
            println!("{}", stats.progress());
        }

        self.sink.finish().await?;
        Ok(stats)
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

pub async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Csv(csv_args) => scrape_csv(csv_args, args.yes).await,
        Command::Queue(queue_args) => scrape_queue(queue_args, args.yes).await,
        Command::Enqueue(enqueue_args) => enqueue(enqueue_args).await,
    }
}

/// Prints the parameters and waits for the operator's go-ahead unless `yes` is set.
fn confirmed(params: &Params, yes: bool) -> Result<bool> {
    if yes || config::confirm(params)? {
        return Ok(true);
    }
    info_time!("Script execution aborted.");
    Ok(false)
}

/// Builds the fetcher and starts listening for pause/resume commands.
fn prepare(search: &SearchArgs) -> Result<(Fetcher<HttpSearchClient>, PauseController)> {
    let client = HttpSearchClient::new(search.request_timeout())?;
    let fetcher = Fetcher::new(client, search.engine, search.results_to_return, search.policy()?)?;

    let (control_tx, pause) = PauseController::channel();
    spawn_operator_input(control_tx);
    info_time!("Press Enter (or type 'p') to pause between rows, Enter (or 'r') again to resume.");
    Ok((fetcher, pause))
}

fn summarize(stats: &RunStatistics) {
    info_time!(
        stats.started_at(),
        "Finished. Processed {} rows, retrieved {} results.",
        stats.rows_processed(),
        stats.results_retrieved()
    );
}

async fn scrape_csv(args: CsvArgs, yes: bool) -> Result<()> {
    args.validate()?;
    let mut params = args.params();
    let files = RunFiles::resolve(&params, args.output.clone(), args.search.error_log.clone());
    params.push(("output_filename", files.output.display().to_string()));
    params.push(("error_log_name", files.error_log.display().to_string()));
    if !confirmed(&params, yes)? {
        return Ok(());
    }
    logger::init(Some(&files.error_log))?;

    let start_time = Local::now();
    info_time!("Starting script execution...");

    let input_file = File::open(&args.input).inspect_err(|e| {
        error!("Could not open input file {}: {e}", args.input.display());
    })?;
    let rows = input::read_csv_rows(input_file, args.start_row, args.last_row).inspect_err(|e| {
        error!("Could not read input file {}: {e}", args.input.display());
    })?;
    let sink = CsvSink::create(&files.output).inspect_err(|e| {
        error!("Could not create output file {}: {e}", files.output.display());
    })?;

    let (fetcher, pause) = prepare(&args.search)?;
    let stats = RowProcessor::new(fetcher, sink, pause).run(rows).await?;
    summarize(&stats);
    info_time!(start_time, "Results written to {}", files.output.display());
    Ok(())
}

async fn scrape_queue(args: QueueArgs, yes: bool) -> Result<()> {
    args.search.policy()?;
    let mut params = args.params();
    let files = RunFiles::resolve(&params, None, args.search.error_log.clone());
    params.push(("error_log_name", files.error_log.display().to_string()));
    if !confirmed(&params, yes)? {
        return Ok(());
    }
    logger::init(Some(&files.error_log))?;

    let settings = queue::DbSettings::from_env().inspect_err(|e| error!("{e}"))?;
    let pool = queue::connect(&settings).await.inspect_err(|e| {
        error!("Could not connect to the database: {e}");
    })?;

    let result: Result<RunStatistics> = async {
        let rows = queue::pending_rows(&pool, args.campaign_id).await?;
        let (fetcher, pause) = prepare(&args.search)?;
        RowProcessor::new(fetcher, QueueSink::new(pool.clone()), pause)
            .run(rows)
            .await
    }
    .await;

    pool.close().await;
    info!("Disconnected from the database.");
    match result {
        Ok(stats) => {
            summarize(&stats);
            Ok(())
        }
        Err(e) => {
            error!("Queue run failed: {e}");
            Err(e)
        }
    }
}

async fn enqueue(args: EnqueueArgs) -> Result<()> {
    logger::init(None)?;
    let settings = queue::DbSettings::from_env()?;
    let terms = input::read_terms(File::open(&args.input)?)?;
    if terms.is_empty() {
        warn!("No search terms found in {}", args.input.display());
        return Ok(());
    }

    let pool = queue::connect(&settings).await?;
    let result = queue::enqueue_campaign(&pool, &terms).await;
    pool.close().await;

    let campaign_id = result?;
    info_time!("Search terms inserted successfully. Campaign id: {campaign_id}");
    Ok(())
}
