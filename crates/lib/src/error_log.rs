//! Per-stage failure logs: one tab-separated line per failed item.

use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLogEntry {
    pub timestamp: String,
    pub stage: String,
    pub item: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
    stage: &'static str,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>, stage: &'static str) -> Self {
        Self {
            path: path.into(),
            stage,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a failed item. Tabs and newlines in the message are flattened.
    pub fn record(&self, item: &str, message: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let now: DateTime<Local> = Local::now();
        let message = message.replace(['\t', '\n', '\r'], " ");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "{}\t{}\t{}\t{}",
            now.format("%Y-%m-%d %H:%M:%S"),
            self.stage,
            item,
            message
        )
    }

    /// Like [`record`](Self::record), but a failing log write only warns.
    pub fn record_or_warn(&self, item: &str, message: &str) {
        if let Err(e) = self.record(item, message) {
            warn!("Could not write to {}: {e}", self.path.display());
        }
    }

    /// Reads every entry. A missing log is empty; lines with fewer than four
    /// fields are ignored.
    pub fn entries(&self) -> io::Result<Vec<ErrorLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter_map(|line| {
                let mut fields = line.splitn(4, '\t');
                Some(ErrorLogEntry {
                    timestamp: fields.next()?.to_string(),
                    stage: fields.next()?.to_string(),
                    item: fields.next()?.to_string(),
                    message: fields.next()?.to_string(),
                })
            })
            .collect())
    }

    /// The set of item ids with at least one logged failure.
    pub fn failed_items(&self) -> io::Result<HashSet<String>> {
        Ok(self.entries()?.into_iter().map(|e| e.item).collect())
    }
}
