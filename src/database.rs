use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::info;
use rusqlite::Connection;

/// Deletes any database at `path` and opens a fresh one in its place.
pub fn recreate(path: &Path) -> Result<Connection> {
    if path.exists() {
        info!("Removing existing database: {}", path.display());
        fs::remove_file(path).with_context(|| format!("Removing database {path:?}"))?;
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating database directory {parent:?}"))?;
        }
    }
    info!("Creating database: {}", path.display());
    Connection::open(path).with_context(|| format!("Opening database {path:?}"))
}

pub fn close(conn: Connection) -> Result<()> {
    conn.close()
        .map_err(|(_, err)| err)
        .context("Closing database")
}
