use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;

use crate::{loader::LoadSummary, transform::ScriptOutcome, verify::TableReport};

/// Everything a run did, in the order it did it.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub csv: PathBuf,
    pub database: PathBuf,
    pub load: LoadSummary,
    pub script: PathBuf,
    pub script_outcome: ScriptOutcome,
    pub tables: Vec<String>,
    pub verification: Vec<TableReport>,
    /// Tables holding more rows than the raw table.
    pub oversized: Vec<String>,
}

impl RunReport {
    pub fn report_for(&self, table: &str) -> Option<&TableReport> {
        self.verification.iter().find(|report| report.name == table)
    }

    /// Console summary printed at the end of a run.
    pub fn render_summary(&self) -> String {
        let mut lines = Vec::with_capacity(self.verification.len() + 6);
        lines.push(format!(
            "Imported {} rows into {}",
            self.load.rows, self.load.table
        ));
        lines.push(self.script_status_line());
        lines.push(String::new());
        lines.push(format!(
            "Tables in database: [{}]",
            self.tables.iter().map(|name| format!("'{name}'")).join(", ")
        ));
        lines.extend(self.verification.iter().map(TableReport::summary_line));
        lines.extend(self.oversized.iter().map(|name| {
            format!(
                "Warning: {name} has more rows than {}",
                self.load.table
            )
        }));
        lines.push(String::new());
        lines.push(format!(
            "Database setup complete: {}",
            self.database.display()
        ));
        lines.join("\n")
    }

    fn script_status_line(&self) -> String {
        match &self.script_outcome {
            ScriptOutcome::Skipped => {
                format!("Warning: SQL script not found at {}", self.script.display())
            }
            ScriptOutcome::Completed { statements, .. } => {
                format!("SQL transformations completed successfully ({statements} statement(s))")
            }
            ScriptOutcome::Failed { failures, .. } => format!(
                "Warning: {} SQL statement failure(s): {}",
                failures.len(),
                failures.iter().map(|failure| &failure.message).join("; ")
            ),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating report file {path:?}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context("Writing report JSON")?;
        writer
            .flush()
            .with_context(|| format!("Flushing report file {path:?}"))
    }
}
