use crate::checkpoint::CheckpointError;
use crate::store::StoreError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while talking to an AI provider.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to AI provider: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error: {0}")]
    AiApi(String),
    #[error("AI provider returned no completion")]
    EmptyCompletion,
    #[error("API key is missing")]
    MissingApiKey,
}

/// Errors that abort a harvest stage.
///
/// Per-item failures (fetch, parse, metadata) never surface here; the stages
/// log them and move on. Only local storage failures stop a run.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Checkpoint storage failed: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("Record storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to write {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid exclusion pattern: {0}")]
    ExcludePattern(#[from] regex::Error),
}

impl HarvestError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HarvestError::Storage {
            path: path.into(),
            source,
        }
    }
}
