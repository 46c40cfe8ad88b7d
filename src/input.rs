use std::fmt;
use std::io::Read;
use std::ops::RangeInclusive;
use std::str::FromStr;

use tracing::info;

use crate::Result;

/// Column the enqueue step looks for before falling back to the first column.
pub const SEARCH_TERM_COLUMN: &str = "search_term";

/// One unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRow {
    /// 1-based data row number (CSV) or position in the pending queue (database).
    pub number: usize,
    pub queue_id: Option<i64>,
    pub term: String,
}

/// Upper row bound, either a row number or everything the input has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastRow {
    All,
    Row(usize),
}

impl FromStr for LastRow {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(LastRow::All);
        }
        s.parse::<usize>()
            .map(LastRow::Row)
            .map_err(|_| format!("expected a row number or 'all', got '{s}'"))
    }
}

impl fmt::Display for LastRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastRow::All => write!(f, "all"),
            LastRow::Row(n) => write!(f, "{n}"),
        }
    }
}

/// Resolves the configured bounds against the number of data rows in the input.
/// The end is clamped, so an input that runs out first just ends the range early.
pub fn resolve_range(start_row: usize, last_row: LastRow, data_rows: usize) -> RangeInclusive<usize> {
    let end = match last_row {
        LastRow::All => data_rows,
        LastRow::Row(n) => n.min(data_rows),
    };
    start_row.max(1)..=end
}

/// Reads the data rows in `start_row..=last_row` from a CSV with a header row.
/// The search term is the first column.
pub fn read_csv_rows<R: Read>(reader: R, start_row: usize, last_row: LastRow) -> Result<Vec<SearchRow>> {
    let records = read_records(reader)?;
    let range = resolve_range(start_row, last_row, records.len());
    info!(
        "Input has {} data rows, processing rows {}..={}",
        records.len(),
        range.start(),
        range.end()
    );

    let rows = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| (i + 1, record))
        .filter(|(number, _)| range.contains(number))
        .map(|(number, record)| SearchRow {
            number,
            queue_id: None,
            term: record.get(0).unwrap_or_default().trim().to_string(),
        })
        .collect();
    Ok(rows)
}

/// Reads the terms to enqueue: the `search_term` column if the header has one, else the first column.
/// Blank terms are dropped.
pub fn read_terms<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let column = rdr
        .headers()?
        .iter()
        .position(|h| h.eq_ignore_ascii_case(SEARCH_TERM_COLUMN))
        .unwrap_or(0);

    let mut terms = Vec::new();
    for record in rdr.records() {
        let record = record?;
        match record.get(column) {
            Some(term) if !term.is_empty() => terms.push(term.to_string()),
            _ => {}
        }
    }
    Ok(terms)
}

fn read_records<R: Read>(reader: R) -> Result<Vec<csv::StringRecord>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let records = rdr.records().collect::<core::result::Result<Vec<_>, _>>()?;
    Ok(records)
}
