//! Append-only CSV record of runs, one row per run.
use crate::error::PersistError;
use echobench_core::RunStatistics;
use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use time::{macros::format_description, OffsetDateTime};
use tracing::{debug, warn};

pub const DEFAULT_RESULTS_FILE: &str = "benchmark_results.csv";

pub const CSV_HEADER: &str = "Timestamp,Server Name,Concurrency,Duration(s),Total Reqs,QPS,Avg Latency(ms),P99 Latency(ms),Errors";

const FIELD_COUNT: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub timestamp: String,
    pub server_name: String,
    pub concurrency: usize,
    pub elapsed_secs: f64,
    pub total_requests: u64,
    pub qps: f64,
    pub mean_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub errors: u64,
}

impl ResultRow {
    /// `None` when the run produced no latency data; such runs are not recorded.
    pub fn from_statistics(
        timestamp: String,
        server_name: &str,
        concurrency: usize,
        stats: &RunStatistics,
    ) -> Option<Self> {
        let latency = stats.latency.as_ref()?;
        Some(Self {
            timestamp,
            server_name: server_name.to_string(),
            concurrency,
            elapsed_secs: stats.elapsed.as_secs_f64(),
            total_requests: stats.total_requests,
            qps: stats.qps,
            mean_latency_ms: micros_as_millis(latency.mean),
            p99_latency_ms: micros_as_millis(latency.p99),
            errors: stats.total_errors,
        })
    }

    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{:.2},{},{:.2},{:.2},{:.2},{}",
            csv_escape(&self.timestamp),
            csv_escape(&self.server_name),
            self.concurrency,
            self.elapsed_secs,
            self.total_requests,
            self.qps,
            self.mean_latency_ms,
            self.p99_latency_ms,
            self.errors,
        )
    }

    fn from_record(line: usize, record: &[String]) -> Result<Self, PersistError> {
        if record.len() < FIELD_COUNT {
            return Err(PersistError::MalformedRow {
                line,
                reason: format!("expected {FIELD_COUNT} fields, found {}", record.len()),
            });
        }

        let field = |idx: usize| record[idx].trim();
        Ok(Self {
            timestamp: record[0].clone(),
            server_name: record[1].clone(),
            concurrency: parse_field(line, "concurrency", field(2))?,
            elapsed_secs: parse_field(line, "duration", field(3))?,
            total_requests: parse_field(line, "total requests", field(4))?,
            qps: parse_field(line, "QPS", field(5))?,
            mean_latency_ms: parse_field(line, "average latency", field(6))?,
            p99_latency_ms: parse_field(line, "P99 latency", field(7))?,
            errors: parse_field(line, "errors", field(8))?,
        })
    }
}

/// Local wall-clock time as `YYYY-MM-DD HH:MM:SS`, falling back to UTC when the local offset
/// cannot be determined.
pub fn timestamp_now() -> Result<String, PersistError> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    Ok(now.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))?)
}

/// Append `row`, writing the header first if the file is new or empty.
pub fn append_row(path: &Path, row: &ResultRow) -> Result<(), PersistError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        writeln!(file, "{CSV_HEADER}")?;
    }
    writeln!(file, "{}", row.to_csv_line())?;
    debug!(
        "Appended results for {} to {}",
        row.server_name,
        path.display()
    );
    Ok(())
}

/// Read every well-formed row back. The header and malformed rows are skipped.
pub fn read_rows(path: &Path) -> Result<Vec<ResultRow>, PersistError> {
    let content = fs::read_to_string(path)?;
    Ok(parse_rows(&content))
}

pub fn parse_rows(content: &str) -> Vec<ResultRow> {
    parse_records(content)
        .into_iter()
        .enumerate()
        .skip(1)
        .filter_map(|(idx, record)| match ResultRow::from_record(idx + 1, &record) {
            Ok(row) => Some(row),
            Err(err) => {
                warn!("Skipping results row: {err}");
                None
            }
        })
        .collect()
}

fn parse_field<T: std::str::FromStr>(
    line: usize,
    name: &str,
    value: &str,
) -> Result<T, PersistError> {
    value.parse().map_err(|_| PersistError::MalformedRow {
        line,
        reason: format!("invalid {name} {value:?}"),
    })
}

fn micros_as_millis(dur: Duration) -> f64 {
    dur.as_micros() as f64 / 1000.
}

fn csv_escape(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Split CSV text into records. Handles quoted fields with embedded separators, doubled quotes
/// and line breaks. Blank lines are dropped.
fn parse_records(content: &str) -> Vec<Vec<String>> {
    let mut records = vec![];
    let mut record = vec![];
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => quoted = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                }
                record.clear();
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}
