//! # Checkpoint Store
//!
//! Persists the last completed `(group, item)` of one logical stream as a
//! single `group,item` line, and turns that marker into a per-group resume
//! plan.
//!
//! The file holds one value, never a log. `advance` writes a temporary file,
//! fsyncs it and renames it over the old checkpoint, so a crash leaves either
//! the previous or the new value on disk.

use crate::types::{Checkpoint, WorkItem};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint file {} is unreadable: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },
    #[error("Failed to write checkpoint {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Durable "last completed item" marker for one stream.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current checkpoint. An absent or empty file is `Ok(None)`.
    pub fn read(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(|e| CheckpointError::Unreadable {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let line = content.trim();
        if line.is_empty() {
            return Ok(None);
        }
        match line.split_once(',') {
            Some((group, item)) if !group.is_empty() && !item.is_empty() => {
                Ok(Some(Checkpoint::new(group, item)))
            }
            _ => Err(CheckpointError::Unreadable {
                path: self.path.clone(),
                reason: format!("expected 'group,item', found '{line}'"),
            }),
        }
    }

    /// Like [`read`](Self::read), but an unreadable file means "start over".
    pub fn read_or_start(&self) -> Option<Checkpoint> {
        match self.read() {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                error!("{e}. Processing everything from the start.");
                None
            }
        }
    }

    /// Durably replaces the checkpoint. Returns only after the new value is on disk.
    pub fn advance(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let io_err = |source| CheckpointError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp).map_err(io_err)?;
            write!(file, "{},{}", checkpoint.group, checkpoint.item).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        rename_durably(&tmp, &self.path).map_err(io_err)?;
        debug!(
            "Checkpoint {} advanced to {},{}",
            self.path.display(),
            checkpoint.group,
            checkpoint.item
        );
        Ok(())
    }
}

/// The directory holding `path`; a bare file name lives in `.`.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Renames `tmp` over `path`, then syncs the directory so the rename itself
/// survives a power loss.
pub(crate) fn rename_durably(tmp: &Path, path: &Path) -> io::Result<()> {
    fs::rename(tmp, path)?;
    #[cfg(unix)]
    File::open(parent_dir(path))?.sync_all()?;
    Ok(())
}

/// What to do with one group when resuming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupResume {
    /// The group precedes the checkpointed group and is already complete.
    Skip,
    /// Process every item.
    Full,
    /// Process only items enumerated after this id.
    After(String),
}

impl GroupResume {
    /// Returns the items still to process, in enumeration order.
    ///
    /// Ordering follows each item's `seq`. When the checkpointed id is not
    /// part of the sequence the whole group is returned.
    pub fn pending<'a>(&self, items: &'a [WorkItem]) -> &'a [WorkItem] {
        match self {
            GroupResume::Skip => &[],
            GroupResume::Full => items,
            GroupResume::After(last) => match items.iter().find(|item| &item.id == last) {
                Some(done) => {
                    let start = items.partition_point(|item| item.seq <= done.seq);
                    &items[start..]
                }
                None => {
                    warn!(
                        "Checkpointed item '{last}' is not in the current sequence; processing the whole group."
                    );
                    items
                }
            },
        }
    }
}

/// Maps a checkpoint onto the configured group order.
#[derive(Debug, Clone)]
pub struct ResumePlan {
    groups: Vec<String>,
    checkpoint: Option<(usize, String)>,
}

impl ResumePlan {
    pub fn new(groups: &[String], checkpoint: Option<Checkpoint>) -> Self {
        let checkpoint = match checkpoint {
            None => None,
            Some(cp) => match groups.iter().position(|g| g == &cp.group) {
                Some(index) => {
                    info!("Resuming after {},{}", cp.group, cp.item);
                    Some((index, cp.item))
                }
                None => {
                    warn!(
                        "Checkpoint group '{}' is not in the configured order; processing all groups.",
                        cp.group
                    );
                    None
                }
            },
        };
        Self {
            groups: groups.to_vec(),
            checkpoint,
        }
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn for_group(&self, group: &str) -> GroupResume {
        let Some((cp_index, item)) = &self.checkpoint else {
            return GroupResume::Full;
        };
        match self.groups.iter().position(|g| g == group) {
            Some(index) if index < *cp_index => GroupResume::Skip,
            Some(index) if index == *cp_index => GroupResume::After(item.clone()),
            _ => GroupResume::Full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::sequence;

    #[test]
    fn test_parent_dir_of_bare_file_name_is_current_dir() {
        assert_eq!(parent_dir(Path::new("last_processed.txt")), Path::new("."));
        assert_eq!(parent_dir(Path::new("data/last.txt")), Path::new("data"));
    }

    #[test]
    fn test_rename_durably_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("cp.tmp");
        let target = dir.path().join("cp.txt");
        fs::write(&target, "old").unwrap();
        fs::write(&tmp, "new").unwrap();

        rename_durably(&tmp, &target).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        assert!(!tmp.exists());
    }

    #[test]
    fn test_pending_uses_sequence_not_lexical_order() {
        // "item10" sorts before "item9" lexically but comes after it here.
        let items = sequence("2023-2024", ["item8", "item9", "item10", "item11"]);
        let resume = GroupResume::After("item9".to_string());
        let pending: Vec<&str> = resume.pending(&items).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(pending, vec!["item10", "item11"]);
    }

    #[test]
    fn test_pending_unknown_item_processes_everything() {
        let items = sequence("g", ["a", "b"]);
        let resume = GroupResume::After("zzz".to_string());
        assert_eq!(resume.pending(&items).len(), 2);
    }
}
