// Primitives for reading the delimited survey exports.

use std::fs;
use std::path::Path;

use encoding_rs::Encoding;
use log::debug;
use snafu::prelude::*;

use survey_tables::Table;

use crate::explorer::*;

// Tried in order; the first decode without errors wins.
const ENCODING_LABELS: [&str; 4] = ["utf-8", "latin1", "iso-8859-1", "windows-1252"];

pub fn read_table(path: &Path) -> ExplorerResult<Table> {
    let display = path.display().to_string();
    let bytes = fs::read(path).context(ReadingSourceSnafu {
        path: display.clone(),
    })?;
    let text = decode_with_fallback(&bytes).context(UnreadableSourceSnafu { path: display })?;
    parse_records(&text)
}

fn decode_with_fallback(bytes: &[u8]) -> Option<String> {
    for label in ENCODING_LABELS {
        let encoding = match Encoding::for_label(label.as_bytes()) {
            Some(e) => e,
            None => continue,
        };
        let (text, actual, had_errors) = encoding.decode(bytes);
        if !had_errors {
            debug!("decode_with_fallback: decoded as {}", actual.name());
            return Some(text.into_owned());
        }
        debug!("decode_with_fallback: {} failed, trying next", label);
    }
    None
}

fn parse_records(text: &str) -> ExplorerResult<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        // Short records are padded as missing values downstream.
        .flexible(true)
        .from_reader(text.as_bytes());
    let header: Vec<String> = rdr
        .headers()
        .context(CsvParseSnafu {})?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in rdr.records() {
        let record = record.context(CsvParseSnafu {})?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    debug!(
        "parse_records: {} columns, {} rows",
        header.len(),
        rows.len()
    );
    Ok(Table::from_records(&header, &rows))
}
