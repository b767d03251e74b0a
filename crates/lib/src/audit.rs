//! # Audits
//!
//! Read-only consistency checks over a harvest on disk: which listed
//! documents never arrived, and which metadata rows are broken or orphaned.

use crate::error_log::ErrorLog;
use crate::layout::Layout;
use crate::store::{IncrementalRecordStore, StoreError};
use crate::types::{document_name, Kamer, LinkRecord, SpeechRecord};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadAudit {
    pub group: String,
    pub expected: usize,
    pub downloaded: usize,
    /// Expected, not on disk, and present in the download error log.
    pub failed: Vec<String>,
    /// Expected, not on disk, and never logged as failed.
    pub missing: Vec<String>,
}

/// Compares a group's link list against the documents on disk.
pub fn audit_downloads(
    layout: &Layout,
    group: &str,
    exclude: Option<&Regex>,
) -> Result<DownloadAudit, AuditError> {
    let expected: BTreeSet<String> = IncrementalRecordStore::<LinkRecord>::open(layout.link_list(group))
        .records()?
        .into_iter()
        .map(|link| link.id)
        .filter(|id| !exclude.is_some_and(|re| re.is_match(id)))
        .collect();
    let on_disk: HashSet<String> = list_documents(layout, group)?.into_iter().collect();
    let logged = failed_items(&ErrorLog::new(layout.download_error_log(), "download"))?;

    let mut audit = DownloadAudit {
        group: group.to_string(),
        expected: expected.len(),
        downloaded: expected.iter().filter(|id| on_disk.contains(*id)).count(),
        ..Default::default()
    };
    for id in expected.iter().filter(|id| !on_disk.contains(*id)) {
        if logged.contains(id) {
            audit.failed.push(id.clone());
        } else {
            audit.missing.push(id.clone());
        }
    }
    info!(
        "[audit] {group}: {}/{} downloaded, {} failed, {} missing without error",
        audit.downloaded,
        audit.expected,
        audit.failed.len(),
        audit.missing.len()
    );
    Ok(audit)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataAudit {
    pub group: String,
    pub rows: usize,
    /// Downloaded documents of the group.
    pub documents: usize,
    /// Empty or absent cells per column.
    pub missing_values: BTreeMap<String, usize>,
    pub invalid_dates: Vec<String>,
    pub invalid_kamer: Vec<String>,
    pub duplicate_keys: Vec<String>,
    pub documents_without_metadata: Vec<String>,
    pub metadata_without_document: Vec<String>,
    /// Documents without metadata that never appear in the metadata error log.
    pub missing_without_error: Vec<String>,
}

impl MetadataAudit {
    pub fn is_clean(&self) -> bool {
        self.invalid_dates.is_empty()
            && self.invalid_kamer.is_empty()
            && self.duplicate_keys.is_empty()
            && self.documents_without_metadata.is_empty()
            && self.metadata_without_document.is_empty()
    }
}

/// Validates a group's metadata store field by field.
///
/// Rows are read as raw strings so malformed values are reported instead of
/// silently dropped.
pub fn audit_metadata(layout: &Layout, group: &str) -> Result<MetadataAudit, AuditError> {
    let path = layout.meta_store(group);
    let mut audit = MetadataAudit {
        group: group.to_string(),
        ..Default::default()
    };

    let mut keys = HashSet::new();
    if path.exists() {
        let csv_err = |source| AuditError::Csv {
            path: path.clone(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(csv_err)?;
        let headers = reader.headers().map_err(csv_err)?.clone();
        let column = |name: &str| headers.iter().position(|h| h == name);
        for header in headers.iter() {
            audit.missing_values.insert(header.to_string(), 0);
        }
        let (file_col, date_col, kamer_col) = (column("file"), column("date"), column("kamer"));

        for row in reader.records() {
            let row = row.map_err(csv_err)?;
            audit.rows += 1;
            let field = |col: Option<usize>| col.and_then(|c| row.get(c)).unwrap_or_default();
            let file = field(file_col).to_string();
            for (i, header) in headers.iter().enumerate() {
                if row.get(i).is_none_or(|v| v.trim().is_empty()) {
                    *audit.missing_values.entry(header.to_string()).or_default() += 1;
                }
            }

            if NaiveDate::parse_from_str(field(date_col), "%Y-%m-%d").is_err() {
                audit.invalid_dates.push(file.clone());
            }
            if Kamer::from_code(field(kamer_col)).is_none() {
                audit.invalid_kamer.push(file.clone());
            }
            if !keys.insert(file.clone()) {
                audit.duplicate_keys.push(file);
            }
        }
    }

    let documents: BTreeSet<String> = list_documents(layout, group)?
        .iter()
        .map(|id| document_name(id).to_string())
        .collect();
    audit.documents = documents.len();
    let logged = failed_items(&ErrorLog::new(layout.meta_error_log(), "metadata"))?;

    for name in &documents {
        if !keys.contains(name) {
            audit.documents_without_metadata.push(name.clone());
            if !logged.contains(name) {
                audit.missing_without_error.push(name.clone());
            }
        }
    }
    let mut orphans: Vec<String> = keys.into_iter().filter(|k| !documents.contains(k)).collect();
    orphans.sort();
    audit.metadata_without_document = orphans;

    info!(
        "[audit] {group}: {} rows, {} invalid dates, {} invalid kamer, {} duplicates, {} documents without metadata",
        audit.rows,
        audit.invalid_dates.len(),
        audit.invalid_kamer.len(),
        audit.duplicate_keys.len(),
        audit.documents_without_metadata.len()
    );
    Ok(audit)
}

/// Metadata rows as a percentage of downloaded documents, over all audits.
///
/// No documents at all is 0%.
pub fn metadata_coverage(audits: &[MetadataAudit]) -> f64 {
    let documents: usize = audits.iter().map(|a| a.documents).sum();
    if documents == 0 {
        return 0.0;
    }
    let rows: usize = audits.iter().map(|a| a.rows).sum();
    rows as f64 / documents as f64 * 100.0
}

/// The first `n` speeches of a group with their text cut to `max_chars`.
pub fn preview(
    layout: &Layout,
    group: &str,
    n: usize,
    max_chars: usize,
) -> Result<Vec<SpeechRecord>, AuditError> {
    let records = IncrementalRecordStore::<SpeechRecord>::open(layout.speech_store(group)).records()?;
    Ok(records
        .into_iter()
        .take(n)
        .map(|mut record| {
            record.speech_text = truncate(&record.speech_text, max_chars);
            record
        })
        .collect())
}

/// Cuts `text` to `max_chars` characters, marking the cut with `...`.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn list_documents(layout: &Layout, group: &str) -> Result<Vec<String>, AuditError> {
    layout.list_documents(group).map_err(|source| AuditError::Io {
        path: layout.documents_dir(group),
        source,
    })
}

fn failed_items(log: &ErrorLog) -> Result<HashSet<String>, AuditError> {
    log.failed_items().map_err(|source| AuditError::Io {
        path: log.path().to_path_buf(),
        source,
    })
}
