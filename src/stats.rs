use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

/// Counters for one run. Only ever moves forward.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    started_at: DateTime<Local>,
    started: Instant,
    engine: String,
    rows_in_range: usize,
    rows_processed: usize,
    results_retrieved: usize,
    current_row: usize,
}

impl RunStatistics {
    pub fn start(rows_in_range: usize, engine: impl Into<String>) -> Self {
        Self {
            started_at: Local::now(),
            started: Instant::now(),
            engine: engine.into(),
            rows_in_range,
            rows_processed: 0,
            results_retrieved: 0,
            current_row: 0,
        }
    }

    /// Counts a finished row. `stored` is the number of results that actually reached the sink.
    pub fn record_row(&mut self, row_number: usize, stored: usize) {
        self.current_row = row_number;
        self.rows_processed += 1;
        self.results_retrieved += stored;
    }

    pub fn rows_in_range(&self) -> usize {
        self.rows_in_range
    }

    pub fn rows_processed(&self) -> usize {
        self.rows_processed
    }

    pub fn results_retrieved(&self) -> usize {
        self.results_retrieved
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn progress(&self) -> Progress {
        Progress::at(self, self.started.elapsed(), Local::now())
    }
}

/// Snapshot printed after every row.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub started_at: DateTime<Local>,
    pub now: DateTime<Local>,
    pub engine: String,
    pub elapsed: Duration,
    pub current_row: usize,
    pub rows_processed: usize,
    pub rows_in_range: usize,
    pub rows_left: usize,
    pub results_retrieved: usize,
    pub secs_per_row: f64,
    pub percent_complete: f64,
    pub remaining: Duration,
}

impl Progress {
    pub fn at(stats: &RunStatistics, elapsed: Duration, now: DateTime<Local>) -> Self {
        let rows_processed = stats.rows_processed;
        let rows_in_range = stats.rows_in_range;
        let rows_left = rows_in_range.saturating_sub(rows_processed);
        let secs_per_row = if rows_processed > 0 {
            elapsed.as_secs_f64() / rows_processed as f64
        } else {
            0.0
        };
        let percent_complete = if rows_in_range > 0 {
            rows_processed as f64 / rows_in_range as f64 * 100.0
        } else {
            0.0
        };

        Self {
            started_at: stats.started_at,
            now,
            engine: stats.engine.clone(),
            elapsed,
            current_row: stats.current_row,
            rows_processed,
            rows_in_range,
            rows_left,
            results_retrieved: stats.results_retrieved,
            secs_per_row,
            percent_complete,
            remaining: Duration::from_secs_f64(secs_per_row * rows_left as f64),
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Start Time: {} | Runtime: {} | Current Row: {} | Rows Processed: {}/{} | Rows Left: {} | Total Results Retrieved: {} | Rate: {:.2} sec/row | Percent Complete: {:.2}% | Time Remaining: {} | Current Time: {} | Search Engine: {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            fmt_hms(self.elapsed),
            self.current_row,
            self.rows_processed,
            self.rows_in_range,
            self.rows_left,
            self.results_retrieved,
            self.secs_per_row,
            self.percent_complete,
            fmt_hms(self.remaining),
            self.now.format("%Y-%m-%d %H:%M:%S"),
            self.engine,
        )
    }
}

/// `H:MM:SS`, whole seconds.
pub fn fmt_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn stats_after(rows_in_range: usize, rows: &[(usize, usize)]) -> RunStatistics {
        let mut stats = RunStatistics::start(rows_in_range, "DuckDuckGo");
        for &(number, stored) in rows {
            stats.record_row(number, stored);
        }
        stats
    }

    #[test]
    fn estimates_from_average_row_time() {
        let stats = stats_after(9, &[(1, 25), (2, 25), (3, 25)]);
        let p = Progress::at(&stats, Duration::from_secs(30), Local::now());
        assert_eq!(p.rows_left, 6);
        assert_eq!(p.results_retrieved, 75);
        assert!((p.secs_per_row - 10.0).abs() < f64::EPSILON);
        assert_eq!(p.remaining, Duration::from_secs(60));
        assert!((p.percent_complete - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn nothing_processed_yet() {
        let stats = stats_after(0, &[]);
        let p = Progress::at(&stats, Duration::from_secs(5), Local::now());
        assert_eq!(p.secs_per_row, 0.0);
        assert_eq!(p.percent_complete, 0.0);
        assert_eq!(p.remaining, Duration::ZERO);
    }

    #[test]
    fn counters_only_grow() {
        let stats = stats_after(3, &[(1, 25), (2, 0)]);
        assert_eq!(stats.rows_processed(), 2);
        assert_eq!(stats.results_retrieved(), 25);
        assert_eq!(stats.progress().rows_left, 1);
    }

    #[test]
    fn progress_line_names_row_time_and_engine() {
        let stats = stats_after(9, &[(6, 25), (7, 0)]);
        let now = Local.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap();
        let line = Progress::at(&stats, Duration::from_secs(20), now).to_string();
        assert!(line.contains("Current Row: 7"));
        assert!(line.contains("Rows Processed: 2/9"));
        assert!(line.contains("Current Time: 2024-03-01 14:05:09"));
        assert!(line.ends_with("Search Engine: DuckDuckGo"));
    }

    #[test]
    fn hms() {
        assert_eq!(fmt_hms(Duration::from_secs(0)), "0:00:00");
        assert_eq!(fmt_hms(Duration::from_secs(3725)), "1:02:05");
        assert_eq!(fmt_hms(Duration::from_millis(59_900)), "0:00:59");
    }
}
