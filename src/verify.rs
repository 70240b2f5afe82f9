use anyhow::{Context, Result};
use log::warn;
use rusqlite::Connection;
use serde::Serialize;

use crate::loader::quote_identifier;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "status", content = "rows", rename_all = "snake_case")]
pub enum TableStatus {
    Count(u64),
    NotFound,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableReport {
    pub name: String,
    #[serde(flatten)]
    pub status: TableStatus,
}

impl TableReport {
    pub fn rows(&self) -> Option<u64> {
        match self.status {
            TableStatus::Count(rows) => Some(rows),
            TableStatus::NotFound => None,
        }
    }

    pub fn summary_line(&self) -> String {
        match self.status {
            TableStatus::Count(rows) => format!("  {}: {rows} rows", self.name),
            TableStatus::NotFound => format!("  {}: table not found", self.name),
        }
    }
}

pub fn count_rows(conn: &Connection, table: &str) -> rusqlite::Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Counts each table independently; any failure is reported as not found.
pub fn verify_tables<S: AsRef<str>>(conn: &Connection, names: &[S]) -> Vec<TableReport> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let status = match count_rows(conn, name) {
                Ok(rows) => TableStatus::Count(rows),
                Err(_) => TableStatus::NotFound,
            };
            TableReport {
                name: name.to_string(),
                status,
            }
        })
        .collect()
}

pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
        .context("Listing tables")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Reading table catalog")?;
    Ok(names)
}

/// Tables whose row count exceeds the raw table's. Derived tables only ever
/// narrow the raw data, so anything listed here points at a script problem.
pub fn oversized_tables<'a>(reports: &'a [TableReport], raw_table: &str) -> Vec<&'a TableReport> {
    let Some(raw_rows) = reports
        .iter()
        .find(|report| report.name == raw_table)
        .and_then(TableReport::rows)
    else {
        return Vec::new();
    };
    let oversized = reports
        .iter()
        .filter(|report| report.name != raw_table)
        .filter(|report| report.rows().is_some_and(|rows| rows > raw_rows))
        .collect::<Vec<_>>();
    for report in &oversized {
        warn!(
            "{} has more rows than {raw_table} ({:?} > {raw_rows})",
            report.name,
            report.rows()
        );
    }
    oversized
}
