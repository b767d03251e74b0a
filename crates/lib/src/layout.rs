//! On-disk layout of a harvest, rooted at the data directory.

use crate::constants::{
    DOCUMENTS_DIR, DOWNLOAD_CHECKPOINT_FILE, DOWNLOAD_ERROR_LOG, LINKS_DIR, META_CHECKPOINT_FILE,
    META_DIR, META_ERROR_LOG, PARSED_DIR, PARSE_CHECKPOINT_FILE, PARSE_ERROR_LOG,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn link_list(&self, group: &str) -> PathBuf {
        self.root.join(LINKS_DIR).join(format!("{group}.csv"))
    }

    pub fn documents_dir(&self, group: &str) -> PathBuf {
        self.root.join(DOCUMENTS_DIR).join(group)
    }

    pub fn document(&self, group: &str, id: &str) -> PathBuf {
        self.documents_dir(group).join(id)
    }

    pub fn meta_store(&self, group: &str) -> PathBuf {
        self.root.join(META_DIR).join(format!("meta_{group}.csv"))
    }

    pub fn parsed_dir(&self) -> PathBuf {
        self.root.join(PARSED_DIR)
    }

    pub fn speech_store(&self, group: &str) -> PathBuf {
        self.parsed_dir().join(format!("speeches_{group}.csv"))
    }

    pub fn download_checkpoint(&self) -> PathBuf {
        self.root.join(DOWNLOAD_CHECKPOINT_FILE)
    }

    pub fn meta_checkpoint(&self) -> PathBuf {
        self.root.join(META_CHECKPOINT_FILE)
    }

    pub fn parse_checkpoint(&self) -> PathBuf {
        self.root.join(PARSE_CHECKPOINT_FILE)
    }

    pub fn download_error_log(&self) -> PathBuf {
        self.root.join(DOWNLOAD_ERROR_LOG)
    }

    pub fn meta_error_log(&self) -> PathBuf {
        self.root.join(META_ERROR_LOG)
    }

    pub fn parse_error_log(&self) -> PathBuf {
        self.root.join(PARSE_ERROR_LOG)
    }

    /// Lists the downloaded `.xml` documents of a group, sorted by file name.
    ///
    /// A missing group directory is an empty list.
    pub fn list_documents(&self, group: &str) -> io::Result<Vec<String>> {
        let dir = self.documents_dir(group);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".xml") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
