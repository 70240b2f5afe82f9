//! CSV → SQLite import of the raw table.
//!
//! Every header entry becomes a `TEXT` column and every data row is inserted
//! as-is, one statement per row, inside a single transaction.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::ByteRecord;
use encoding_rs::Encoding;
use log::{debug, info};
use rusqlite::{Connection, params_from_iter};
use serde::Serialize;

use crate::{error::PipelineError, io_utils};

/// Wraps an identifier in double quotes so names with spaces or punctuation
/// survive. Embedded double quotes are left as they are.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTableSchema {
    pub table: String,
    pub columns: Vec<String>,
}

impl RawTableSchema {
    pub fn from_headers(table: &str, headers: &[String]) -> Self {
        Self {
            table: table.to_string(),
            columns: headers.to_vec(),
        }
    }

    pub fn create_table_sql(&self) -> String {
        let columns_def = self
            .columns
            .iter()
            .map(|column| format!("{} TEXT", quote_identifier(column)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TABLE {} ({columns_def})",
            quote_identifier(&self.table)
        )
    }

    pub fn insert_sql(&self) -> String {
        let placeholders = (1..=self.columns.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} VALUES ({placeholders})",
            quote_identifier(&self.table)
        )
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub csv: PathBuf,
    pub table: String,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl LoadOptions {
    pub fn new(csv: &Path, table: &str) -> Self {
        Self {
            csv: csv.to_path_buf(),
            table: table.to_string(),
            delimiter: io_utils::resolve_input_delimiter(csv, None),
            encoding: encoding_rs::UTF_8,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LoadSummary {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: u64,
}

/// Creates the raw table and fills it from the CSV file.
///
/// The whole import is one transaction. A row whose field count differs from
/// the header aborts the import; nothing from the file is committed.
pub fn load_csv(conn: &mut Connection, options: &LoadOptions) -> Result<LoadSummary> {
    if !options.csv.exists() {
        return Err(PipelineError::MissingCsv(options.csv.clone()).into());
    }
    info!("Importing CSV from: {}", options.csv.display());

    let mut reader = io_utils::open_csv_reader_from_path(&options.csv, options.delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, options.encoding)
        .with_context(|| format!("Reading header row of {:?}", options.csv))?;
    if headers.is_empty() {
        return Err(PipelineError::EmptyHeader(options.csv.clone()).into());
    }
    // Lines are counted by '\n'. With CRLF endings the reader stops at '\r'
    // and consumes the '\n' with the next record, so positions trail by one.
    let header_newlines = newline_count(reader.byte_headers()?);
    let lag = u64::from(reader.position().line() == 1 + header_newlines);
    let schema = RawTableSchema::from_headers(&options.table, &headers);
    debug!("Raw columns: {:?}", schema.columns);

    let tx = conn.transaction().context("Starting import transaction")?;
    let create_sql = schema.create_table_sql();
    tx.execute(&create_sql, [])
        .with_context(|| format!("Creating table {}", schema.table))?;

    let mut rows = 0u64;
    {
        let mut insert = tx
            .prepare(&schema.insert_sql())
            .with_context(|| format!("Preparing insert into {}", schema.table))?;
        let mut record = ByteRecord::new();
        loop {
            let line = reader.position().line() + lag;
            let more = reader
                .read_byte_record(&mut record)
                .with_context(|| format!("Reading line {line} in {:?}", options.csv))?;
            if !more {
                break;
            }
            let start = record.position().map_or(line, |pos| pos.line() + lag);
            if skipped_blank_lines(start, reader.position().line() + lag, &record) {
                return Err(PipelineError::FieldCount {
                    row: start,
                    expected: schema.columns.len(),
                    found: 0,
                }
                .into());
            }
            if record.len() != schema.columns.len() {
                return Err(PipelineError::FieldCount {
                    row: start,
                    expected: schema.columns.len(),
                    found: record.len(),
                }
                .into());
            }
            let decoded = io_utils::decode_record(&record, options.encoding)
                .with_context(|| format!("Decoding line {start} in {:?}", options.csv))?;
            insert
                .execute(params_from_iter(decoded.iter()))
                .with_context(|| format!("Inserting line {start} into {}", schema.table))?;
            rows += 1;
        }
    }
    tx.commit().context("Committing import transaction")?;

    info!("Imported {rows} rows into {}", schema.table);
    Ok(LoadSummary {
        table: schema.table,
        columns: schema.columns,
        rows,
    })
}

/// The csv reader drops empty lines without yielding a record, so a gap shows
/// up only as extra line breaks consumed ahead of the record. A record spans
/// one terminator plus the newlines embedded in its quoted fields; anything
/// beyond that was a blank line. Blank lines after the last record are not
/// seen here.
fn skipped_blank_lines(start: u64, end: u64, record: &ByteRecord) -> bool {
    end.saturating_sub(start) > newline_count(record) + 1
}

fn newline_count(record: &ByteRecord) -> u64 {
    record
        .as_slice()
        .iter()
        .filter(|&&byte| byte == b'\n')
        .count() as u64
}
