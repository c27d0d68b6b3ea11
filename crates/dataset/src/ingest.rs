//! CSV ingestion: encoding sniffing and separator detection.
//!
//! Uploaded files come from spreadsheet exports of unknown origin, so the
//! encoding is guessed from the bytes and `;` is tried before `,`. All cells
//! stay text; nothing is type-inferred.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

use crate::error::IngestError;
use crate::table::{Cell, Table};

/// Separators tried in order; the first giving more than one column wins.
pub const SEPARATORS: [u8; 2] = [b';', b','];

const FALLBACK_SEPARATOR: u8 = b',';

/// Guess the text encoding of `bytes`.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if bytes.is_empty() {
        return UTF_8;
    }
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

pub fn decode(bytes: &[u8]) -> String {
    let encoding = detect_encoding(bytes);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(encoding = used.name(), "input had undecodable bytes, replaced");
    }
    text.into_owned()
}

/// Parse raw CSV bytes into a string table.
pub fn read_csv(bytes: &[u8]) -> Result<Table, IngestError> {
    let text = decode(bytes);

    for separator in SEPARATORS {
        match parse_with_separator(&text, separator) {
            Ok(table) if table.columns().len() > 1 => {
                tracing::debug!(
                    separator = %(separator as char),
                    columns = table.columns().len(),
                    rows = table.len(),
                    "parsed csv"
                );
                return Ok(table);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(separator = %(separator as char), error = %e, "separator rejected");
            }
        }
    }

    parse_with_separator(&text, FALLBACK_SEPARATOR)
}

fn parse_with_separator(text: &str, separator: u8) -> Result<Table, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(IngestError::Empty);
    }
    let columns = dedupe_headers(headers.iter());
    let width = columns.len();

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() == 1 && record[0].is_empty() {
            continue;
        }
        if record.len() > width {
            return Err(IngestError::UnevenRow {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                expected: width,
                found: record.len(),
            });
        }

        let mut row: Vec<Cell> = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    None
                } else {
                    Some(field.to_string())
                }
            })
            .collect();
        row.resize(width, None);
        rows.push(row);
    }

    Ok(Table::new(columns, rows))
}

/// Blank labels become `Unnamed: <i>`; repeats get `.1`, `.2`, ... suffixes.
fn dedupe_headers<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (i, label) in labels.enumerate() {
        let base = if label.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            label.to_string()
        };

        let mut candidate = base.clone();
        let mut n = 1;
        while out.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        out.push(candidate);
    }
    out
}
