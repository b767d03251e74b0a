//! # Analysis Boundary
//!
//! Sends speech text to an [`AiProvider`] and turns whatever comes back into
//! an [`AnalysisOutcome`]. Provider failures and unparseable output never
//! propagate: they become the "no finding" sentinel.

pub mod prompt;
pub mod runner;
pub mod structured;

use crate::providers::ai::AiProvider;
use crate::store::StoreError;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

pub use prompt::PromptTemplate;
pub use structured::{extract_structured, ExtractionError, ExtractionResult};

/// Result fields whose non-empty array signals a finding.
pub const DEFAULT_FINDING_FIELDS: [&str; 2] = ["gevonden_delegitimatie", "gevallen_delegitimatie"];

pub const DEFAULT_PARSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid prompt file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Prompt file has no 'prompt_template' key")]
    MissingPromptTemplate,
    #[error("No speech files found at {}", .path.display())]
    NoSpeechFiles { path: PathBuf },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// The object returned in place of a real analysis when anything fails.
pub fn sentinel() -> Map<String, Value> {
    let value = json!({
        "gevonden_delegitimatie": [],
        "samenvatting": {
            "aantal_gevallen": 0,
            "meest_voorkomende_type": "error",
            "meest_getroffen_doelgroep": "error",
            "ernst_score": 0,
            "gemiddelde_confidence": 0.0,
            "hoogste_confidence": 0.0,
            "laagste_confidence": 0.0
        }
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// True when any of `fields` holds a non-empty array.
pub fn pattern_found<S: AsRef<str>>(result: &Map<String, Value>, fields: &[S]) -> bool {
    fields.iter().any(|field| {
        result
            .get(field.as_ref())
            .and_then(Value::as_array)
            .is_some_and(|findings| !findings.is_empty())
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub result: Map<String, Value>,
    pub pattern_found: bool,
}

impl AnalysisOutcome {
    pub fn sentinel() -> Self {
        Self {
            result: sentinel(),
            pattern_found: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Analyzer {
    provider: Box<dyn AiProvider>,
    template: PromptTemplate,
    parse_timeout: Duration,
    finding_fields: Vec<String>,
}

impl Analyzer {
    pub fn new(provider: Box<dyn AiProvider>, template: PromptTemplate) -> Self {
        Self {
            provider,
            template,
            parse_timeout: DEFAULT_PARSE_TIMEOUT,
            finding_fields: DEFAULT_FINDING_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_parse_timeout(mut self, parse_timeout: Duration) -> Self {
        self.parse_timeout = parse_timeout;
        self
    }

    pub fn with_finding_fields(mut self, fields: Vec<String>) -> Self {
        self.finding_fields = fields;
        self
    }

    /// Analyses one speech. When a pattern is found the result carries a
    /// `_meta` object with the source file and the original text.
    pub async fn analyze(&self, text: &str, source_file: &str) -> AnalysisOutcome {
        let system_prompt = self.template.render(text);
        let raw = match self.provider.generate(&system_prompt, text).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("AI request failed for speech from {source_file}: {e}");
                return AnalysisOutcome::sentinel();
            }
        };

        let mut result = match extract_structured(&raw, self.parse_timeout) {
            Ok(result) => result,
            Err(e) => {
                error!("Could not extract a result for speech from {source_file}: {e}");
                return AnalysisOutcome::sentinel();
            }
        };

        let found = pattern_found(&result, &self.finding_fields);
        if found {
            info!("Pattern found in speech from {source_file}");
            result.insert(
                "_meta".to_string(),
                json!({ "source_file": source_file, "original_text": text }),
            );
        }
        AnalysisOutcome {
            result,
            pattern_found: found,
        }
    }
}
