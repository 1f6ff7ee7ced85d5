//! CSV candle data adapter.
//!
//! Two row shapes are accepted, detected per line from the first field:
//!
//! - `timestamp,open,high,low,close[,volume]` with a Unix timestamp in seconds
//! - `YYYY.MM.DD,HH:MM,open,high,low,close[,volume]` (MetaTrader export, UTC)

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord};

use crate::domain::error::MqlError;
use crate::domain::ohlcv::Candle;
use crate::ports::data_port::DataPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvAdapter;

impl CsvAdapter {
    pub fn new() -> Self {
        CsvAdapter
    }
}

impl DataPort for CsvAdapter {
    fn load_candles(&self, source: &Path) -> Result<Vec<Candle>, MqlError> {
        let content = fs::read_to_string(source)?;
        parse_candles(&content)
    }
}

/// Parse CSV text into candles, in file order. A non-numeric first line is
/// treated as a header.
pub fn parse_candles(content: &str) -> Result<Vec<Candle>, MqlError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut candles = Vec::new();
    for (n, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| MqlError::Csv {
            line: e.position().map_or(n + 1, |p| p.line() as usize),
            reason: e.to_string(),
        })?;
        let line = record.position().map_or(n + 1, |p| p.line() as usize);
        if record.iter().all(str::is_empty) {
            continue;
        }
        if n == 0 && is_header(&record) {
            continue;
        }
        candles.push(parse_record(&record, line)?);
    }
    Ok(candles)
}

/// Parse a single CSV row.
pub fn parse_line(text: &str) -> Result<Candle, MqlError> {
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    parse_record(&StringRecord::from(fields), 1)
}

fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .is_some_and(|f| f.parse::<f64>().is_err() && !is_metatrader_date(f))
}

fn is_metatrader_date(field: &str) -> bool {
    let bytes = field.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'.',
            _ => b.is_ascii_digit(),
        })
}

fn parse_record(record: &StringRecord, line: usize) -> Result<Candle, MqlError> {
    let first = record.get(0).unwrap_or_default();
    let (time, offset) = if is_metatrader_date(first) {
        let clock = field(record, 1, "time", line)?;
        (metatrader_time(first, clock, line)?, 2)
    } else {
        let time = first.parse::<i64>().map_err(|e| MqlError::Csv {
            line,
            reason: format!("invalid timestamp '{}': {}", first, e),
        })?;
        (time, 1)
    };

    let open = number(record, offset, "open", line)?;
    let high = number(record, offset + 1, "high", line)?;
    let low = number(record, offset + 2, "low", line)?;
    let close = number(record, offset + 3, "close", line)?;
    let candle = Candle::new(time, open, high, low, close);

    match record.get(offset + 4).filter(|v| !v.is_empty()) {
        Some(_) => Ok(candle.with_volume(number(record, offset + 4, "volume", line)?)),
        None => Ok(candle),
    }
}

fn metatrader_time(date: &str, clock: &str, line: usize) -> Result<i64, MqlError> {
    let text = format!("{} {}", date, clock);
    ["%Y.%m.%d %H:%M:%S", "%Y.%m.%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&text, fmt).ok())
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| MqlError::Csv {
            line,
            reason: format!("invalid date '{}'", text),
        })
}

fn field<'a>(record: &'a StringRecord, index: usize, name: &str, line: usize) -> Result<&'a str, MqlError> {
    record.get(index).ok_or_else(|| MqlError::Csv {
        line,
        reason: format!("missing {} column", name),
    })
}

fn number(record: &StringRecord, index: usize, name: &str, line: usize) -> Result<f64, MqlError> {
    let text = field(record, index, name, line)?;
    text.parse().map_err(|e| MqlError::Csv {
        line,
        reason: format!("invalid {} value '{}': {}", name, text, e),
    })
}
