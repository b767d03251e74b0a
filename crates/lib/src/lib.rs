//! # Handelingen
//!
//! A resumable harvester for parliamentary transcripts ("Handelingen") from
//! the Dutch publications archive, plus the analysis boundary that sends
//! speeches to a language model and recovers structured results from its
//! free-form output.
//!
//! The pipeline is sequential and restartable: every stage persists a
//! checkpoint after each durably stored item, and every store can report the
//! keys it already holds so a rerun never duplicates work.

pub mod analysis;
pub mod audit;
pub mod checkpoint;
pub mod constants;
pub mod enumerate;
pub mod error_log;
pub mod errors;
pub mod extract;
pub mod fetch;
pub mod harvest;
pub mod layout;
pub mod metadata;
pub mod providers;
pub mod store;
pub mod types;

pub use analysis::{
    extract_structured, AnalysisOutcome, Analyzer, ExtractionError, ExtractionResult,
    PromptTemplate,
};
pub use checkpoint::{CheckpointError, CheckpointStore, GroupResume, ResumePlan};
pub use enumerate::{EnumerateError, LinkRewrite, WorkEnumerator};
pub use errors::{HarvestError, PromptError};
pub use extract::{DocumentError, DocumentExtractor};
pub use fetch::{FetchError, Fetched, RetryPolicy, RetryingFetcher};
pub use harvest::{ArchiveConfig, Harvester, StageReport};
pub use layout::Layout;
pub use store::{IncrementalRecordStore, StoreError, StoreRecord};
pub use types::{Checkpoint, Kamer, LinkRecord, MetadataRecord, SpeechRecord, WorkItem};
