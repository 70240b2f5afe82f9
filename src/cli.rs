use std::path::PathBuf;

use clap::{Parser, ValueEnum};

pub const DEFAULT_CSV_PATH: &str = "data/raw_311_sample.csv";
pub const DEFAULT_DB_PATH: &str = "nyc311.db";
pub const DEFAULT_SCRIPT_PATH: &str = "nyc311_sql_tasks.sql";
pub const DEFAULT_RAW_TABLE: &str = "raw_311";

/// Tables the transformation script is expected to leave behind, in pipeline order.
pub const DEFAULT_EXPECTED_TABLES: &[&str] = &[
    "raw_311",
    "raw_311_indexed",
    "raw_311_2023",
    "clean_311_2023",
    "clean_311_2023_dedup",
];

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Load the NYC 311 CSV export into SQLite and run the analysis transformations",
    long_about = None
)]
pub struct Cli {
    /// Source CSV file (first row holds the column names)
    #[arg(long = "csv", default_value = DEFAULT_CSV_PATH)]
    pub csv: PathBuf,
    /// Destination SQLite database; removed and recreated on every run
    #[arg(long = "db", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,
    /// SQL script applied after the import
    #[arg(long = "script", default_value = DEFAULT_SCRIPT_PATH)]
    pub script: PathBuf,
    /// Name of the raw table receiving the CSV rows
    #[arg(long = "table", default_value = DEFAULT_RAW_TABLE)]
    pub table: String,
    /// Tables whose row counts are reported after the script runs
    #[arg(long = "expect", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub expect: Vec<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// What to do when a script statement fails
    #[arg(long = "on-error", value_enum, default_value = "stop")]
    pub on_error: FailureMode,
    /// Write a JSON summary of the run to this path
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
}

impl Cli {
    pub fn expected_tables(&self) -> Vec<String> {
        let listed = self
            .expect
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        if listed.is_empty() {
            DEFAULT_EXPECTED_TABLES
                .iter()
                .map(|name| name.to_string())
                .collect()
        } else {
            listed
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum FailureMode {
    /// Run the script as a single batch; the first error abandons the remainder
    #[default]
    Stop,
    /// Run statements one by one and keep going past failures
    Continue,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
