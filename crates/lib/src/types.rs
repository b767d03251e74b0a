//! # Data Model
//!
//! The work units moved through the pipeline and the records persisted by
//! the stores.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The chamber a document belongs to. A closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kamer {
    Tk,
    Ek,
    Vv,
}

impl Kamer {
    /// Maps the archive's "Organisatie" label to a chamber code.
    pub fn from_organisation(label: &str) -> Option<Self> {
        match label.trim() {
            "Tweede Kamer der Staten-Generaal" => Some(Kamer::Tk),
            "Eerste Kamer der Staten-Generaal" => Some(Kamer::Ek),
            "Verenigde Vergadering der Staten-Generaal" => Some(Kamer::Vv),
            _ => None,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "tk" => Some(Kamer::Tk),
            "ek" => Some(Kamer::Ek),
            "vv" => Some(Kamer::Vv),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Kamer::Tk => "tk",
            Kamer::Ek => "ek",
            Kamer::Vv => "vv",
        }
    }
}

impl fmt::Display for Kamer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One unit of harvest.
///
/// `seq` is the item's position in its group's enumeration order. Resume
/// decisions compare `seq`, never the ids themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub group: String,
    pub id: String,
    pub seq: usize,
}

impl WorkItem {
    pub fn new(group: impl Into<String>, id: impl Into<String>, seq: usize) -> Self {
        Self {
            group: group.into(),
            id: id.into(),
            seq,
        }
    }

    /// The checkpoint recording this item as the last one completed.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(&self.group, &self.id)
    }

    /// The id without its machine-readable extension. This is the metadata key.
    pub fn document_name(&self) -> &str {
        document_name(&self.id)
    }
}

/// Strips a trailing `.xml` from an item id.
pub fn document_name(id: &str) -> &str {
    id.strip_suffix(".xml").unwrap_or(id)
}

/// Builds the ordered work items of a group from ids in enumeration order.
pub fn sequence<I, S>(group: &str, ids: I) -> Vec<WorkItem>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ids.into_iter()
        .enumerate()
        .map(|(seq, id)| WorkItem::new(group, id, seq))
        .collect()
}

/// The last completed `(group, item)` of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub group: String,
    pub item: String,
}

impl Checkpoint {
    pub fn new(group: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            item: item.into(),
        }
    }
}

/// One row of a group's link list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub vergaderjaar: String,
    pub id: String,
}

/// Document-level metadata scraped from the detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub file: String,
    pub kamer: Kamer,
    pub jaar: String,
    pub nr: String,
    pub date: NaiveDate,
    pub document_nr: String,
    pub title: String,
}

/// One speech joined with its document's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRecord {
    pub file_id: String,
    pub position: usize,
    pub speaker_name: String,
    pub speaker_party: Option<String>,
    pub speech_text: String,
    pub jaar: String,
    pub date: NaiveDate,
    pub kamer: Kamer,
    pub category: String,
    pub title: String,
    pub document_number: String,
    pub url: String,
    pub meta_url: String,
    pub vergadernummer: String,
}
