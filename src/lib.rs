pub mod cli;
pub mod database;
pub mod error;
pub mod io_utils;
pub mod loader;
pub mod pipeline;
pub mod report;
pub mod transform;
pub mod verify;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{cli::Cli, pipeline::PipelineConfig};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("nyc311_db", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = PipelineConfig::from_cli(&cli)?;
    info!(
        "Loading '{}' into {:?} (delimiter '{}')",
        config.load.csv.display(),
        config.database,
        printable_delimiter(config.load.delimiter)
    );
    debug!("Expected tables: {:?}", config.expected_tables);

    let report = pipeline::run(&config)?;
    println!("{}", report.render_summary());

    if let Some(path) = &cli.report {
        report
            .save(path)
            .with_context(|| format!("Writing run report to {path:?}"))?;
        info!("Run report written to {:?}", path);
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
