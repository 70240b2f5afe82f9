//! Runs the external SQL script against the freshly loaded database.
//!
//! The script is trusted and opaque; this module only decides how failures
//! inside it are handled (see [`FailureMode`]). No error here is fatal.

use std::{fs, path::Path};

use log::{debug, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::cli::FailureMode;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatementFailure {
    /// 1-based position of the statement in the script; `None` when the
    /// batch reported the error without a position.
    pub statement: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScriptOutcome {
    Skipped,
    Completed {
        digest: String,
        statements: usize,
    },
    Failed {
        digest: String,
        statements: usize,
        failures: Vec<StatementFailure>,
    },
}

/// Applies the script at `path`. A missing script is skipped with a warning;
/// statement errors are logged and folded into the outcome.
pub fn run_script(conn: &Connection, path: &Path, mode: FailureMode) -> ScriptOutcome {
    if !path.exists() {
        warn!("SQL script not found at {}", path.display());
        return ScriptOutcome::Skipped;
    }
    info!("Executing SQL script: {}", path.display());
    let sql = match fs::read_to_string(path) {
        Ok(sql) => sql,
        Err(err) => {
            warn!("Could not read SQL script {}: {err}", path.display());
            return ScriptOutcome::Failed {
                digest: String::new(),
                statements: 0,
                failures: vec![StatementFailure {
                    statement: None,
                    message: err.to_string(),
                }],
            };
        }
    };
    let digest = script_digest(&sql);
    debug!("Script digest sha256:{digest}");

    let statements = split_statements(&sql);
    let failures = match mode {
        FailureMode::Stop => run_batch(conn, &sql),
        FailureMode::Continue => run_each(conn, &statements),
    };

    if failures.is_empty() {
        info!("SQL transformations completed successfully");
        ScriptOutcome::Completed {
            digest,
            statements: statements.len(),
        }
    } else {
        for failure in &failures {
            match failure.statement {
                Some(idx) => warn!("Statement {idx} failed: {}", failure.message),
                None => warn!("Some SQL statements may have failed: {}", failure.message),
            }
        }
        ScriptOutcome::Failed {
            digest,
            statements: statements.len(),
            failures,
        }
    }
}

pub fn script_digest(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn run_batch(conn: &Connection, sql: &str) -> Vec<StatementFailure> {
    match conn.execute_batch(sql) {
        Ok(()) => Vec::new(),
        Err(err) => vec![StatementFailure {
            statement: None,
            message: err.to_string(),
        }],
    }
}

fn run_each(conn: &Connection, statements: &[String]) -> Vec<StatementFailure> {
    let mut failures = Vec::new();
    for (idx, statement) in statements.iter().enumerate() {
        let position = idx + 1;
        match run_statement(conn, statement) {
            Ok(0) => debug!("Statement {position} ok"),
            Ok(rows) => debug!("Statement {position} returned {rows} row(s)"),
            Err(err) => failures.push(StatementFailure {
                statement: Some(position),
                message: err.to_string(),
            }),
        }
    }
    failures
}

/// Executes one statement, draining any rows it produces.
fn run_statement(conn: &Connection, sql: &str) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut count = 0usize;
    while rows.next()?.is_some() {
        count += 1;
    }
    Ok(count)
}

/// Splits a script into statements on top-level semicolons.
///
/// Quoted strings (`'..'`), quoted identifiers (`".."`, `` `..` ``, `[..]`)
/// and comments are skipped over. Comment-only or blank fragments are
/// dropped. `CREATE TRIGGER` bodies are not recognised and split at their
/// inner semicolons.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' | '`' | '[' => {
                let close = if ch == '[' { ']' } else { ch };
                has_code = true;
                current.push(ch);
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if inner == close {
                        // doubled quote is an escape, not the end
                        if close != ']' && chars.peek() == Some(&close) {
                            current.push(close);
                            chars.next();
                            continue;
                        }
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                current.push(ch);
                for inner in chars.by_ref() {
                    current.push(inner);
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                current.push(ch);
                current.push('*');
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    current.push(inner);
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            ';' => {
                if has_code {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                has_code = false;
            }
            other => {
                if !other.is_whitespace() {
                    has_code = true;
                }
                current.push(other);
            }
        }
    }
    if has_code {
        statements.push(current.trim().to_string());
    }
    statements
}
