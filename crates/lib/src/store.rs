//! # Incremental Record Store
//!
//! An append-only CSV file of typed records. The file is opened lazily on the
//! first append; a missing or empty file receives the header row first. Every
//! append is flushed and fsynced before it returns, so a checkpoint written
//! afterwards never points past data that is not on disk.
//!
//! The store does not deduplicate. Callers read [`existing_keys`] once at
//! startup and skip keys they have already stored.
//!
//! [`existing_keys`]: IncrementalRecordStore::existing_keys

use crate::types::{LinkRecord, MetadataRecord, SpeechRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::hash::Hash;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StoreError {
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

/// A row type that can live in an [`IncrementalRecordStore`].
pub trait StoreRecord: Serialize + DeserializeOwned {
    type Key: Eq + Hash + Clone + Debug;

    fn key(&self) -> Self::Key;
}

impl StoreRecord for MetadataRecord {
    type Key = String;

    fn key(&self) -> String {
        self.file.clone()
    }
}

impl StoreRecord for SpeechRecord {
    type Key = (String, usize);

    fn key(&self) -> (String, usize) {
        (self.file_id.clone(), self.position)
    }
}

impl StoreRecord for LinkRecord {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

pub struct IncrementalRecordStore<R> {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    _record: PhantomData<R>,
}

impl<R: StoreRecord> IncrementalRecordStore<R> {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the keys of every well-formed record on disk.
    pub fn existing_keys(&self) -> Result<HashSet<R::Key>, StoreError> {
        Ok(self.records()?.iter().map(StoreRecord::key).collect())
    }

    /// Reads every well-formed record on disk, in file order.
    ///
    /// Rows that fail to deserialize (a torn final line, for example) are
    /// skipped with a warning. A missing file yields no records.
    pub fn records(&self) -> Result<Vec<R>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|source| self.csv_err(source))?;

        let mut records = Vec::new();
        for (index, row) in reader.deserialize::<R>().enumerate() {
            match row {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping malformed row {} in {}: {e}",
                    index + 2,
                    self.path.display()
                ),
            }
        }
        Ok(records)
    }

    pub fn append(&mut self, record: &R) -> Result<(), StoreError> {
        self.append_all(std::slice::from_ref(record))
    }

    /// Appends a batch of records and makes them durable.
    pub fn append_all(&mut self, records: &[R]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let path = self.path.clone();
        let writer = self.writer()?;
        for record in records {
            writer.serialize(record).map_err(|source| StoreError::Csv {
                path: path.clone(),
                source,
            })?;
        }
        writer.flush().map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        writer
            .get_ref()
            .sync_data()
            .map_err(|source| StoreError::Io { path, source })?;
        debug!("Appended {} record(s) to {}", records.len(), self.path.display());
        Ok(())
    }

    fn writer(&mut self) -> Result<&mut csv::Writer<File>, StoreError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.open_writer().map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?,
        };
        Ok(self.writer.insert(writer))
    }

    fn open_writer(&self) -> io::Result<csv::Writer<File>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        let len = file.metadata()?.len();
        if len > 0 {
            // A torn final line must not swallow the next record.
            file.seek(SeekFrom::End(-1))?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                warn!("{} does not end with a newline; terminating the last row", self.path.display());
                file.write_all(b"\n")?;
            }
        }

        Ok(csv::WriterBuilder::new()
            .has_headers(len == 0)
            .from_writer(file))
    }

    fn csv_err(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}
