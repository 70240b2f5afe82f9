use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use log::{info, warn};

use crate::{
    cli::{Cli, FailureMode},
    database,
    error::PipelineError,
    io_utils,
    loader::{self, LoadOptions},
    report::RunReport,
    transform,
    verify,
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub load: LoadOptions,
    pub database: PathBuf,
    pub script: PathBuf,
    pub failure_mode: FailureMode,
    pub expected_tables: Vec<String>,
}

impl PipelineConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let encoding = io_utils::resolve_encoding(cli.input_encoding.as_deref())?;
        let delimiter = io_utils::resolve_input_delimiter(&cli.csv, cli.delimiter);
        Ok(Self {
            load: LoadOptions {
                csv: cli.csv.clone(),
                table: cli.table.clone(),
                delimiter,
                encoding,
            },
            database: cli.db.clone(),
            script: cli.script.clone(),
            failure_mode: cli.on_error,
            expected_tables: cli.expected_tables(),
        })
    }
}

/// Import, transform, verify.
///
/// The CSV is checked before the old database is touched, so a missing input
/// leaves the filesystem as it was. Script and verification problems never
/// fail the run.
pub fn run(config: &PipelineConfig) -> Result<RunReport> {
    let started_at = Utc::now();
    if !config.load.csv.exists() {
        return Err(PipelineError::MissingCsv(config.load.csv.clone()).into());
    }

    let mut conn = database::recreate(&config.database)?;
    let load = loader::load_csv(&mut conn, &config.load)?;

    let script_outcome = transform::run_script(&conn, &config.script, config.failure_mode);

    let tables = verify::list_tables(&conn).unwrap_or_else(|err| {
        warn!("Could not list tables: {err:#}");
        Vec::new()
    });
    info!("Found {} table(s)", tables.len());
    let verification = verify::verify_tables(&conn, &config.expected_tables);
    let oversized = verify::oversized_tables(&verification, &load.table)
        .into_iter()
        .map(|report| report.name.clone())
        .collect();

    database::close(conn)?;

    Ok(RunReport {
        started_at,
        csv: config.load.csv.clone(),
        database: config.database.clone(),
        load,
        script: config.script.clone(),
        script_outcome,
        tables,
        verification,
        oversized,
    })
}
