//! Batch analysis over the parsed speech files.

use crate::analysis::{AnalysisError, Analyzer};
use crate::store::IncrementalRecordStore;
use crate::types::SpeechRecord;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Seed for the sample draw, so repeated runs pick the same speeches.
pub const SAMPLE_SEED: u64 = 42;

/// Party label for speeches without a party.
pub const UNKNOWN_PARTY: &str = "unknown";

/// A speech together with the file it was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSpeech {
    pub record: SpeechRecord,
    pub source_file: String,
}

/// Loads every `speeches_*.csv` in `path`, or `path` itself when it is a file.
pub fn load_speeches(path: &Path) -> Result<Vec<LoadedSpeech>, AnalysisError> {
    let files = speech_files(path)?;
    let mut speeches = Vec::new();
    for file in &files {
        info!("Loading speeches from {}", file.display());
        let source_file = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let records = IncrementalRecordStore::<SpeechRecord>::open(file).records()?;
        speeches.extend(records.into_iter().map(|record| LoadedSpeech {
            record,
            source_file: source_file.clone(),
        }));
    }
    info!("Loaded {} speeches from {} file(s)", speeches.len(), files.len());
    Ok(speeches)
}

fn speech_files(path: &Path) -> Result<Vec<PathBuf>, AnalysisError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(AnalysisError::NoSpeechFiles {
            path: path.to_path_buf(),
        });
    }
    let io_err = |source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("speeches_") && name.ends_with(".csv") {
            files.push(entry.path());
        }
    }
    if files.is_empty() {
        return Err(AnalysisError::NoSpeechFiles {
            path: path.to_path_buf(),
        });
    }
    files.sort();
    Ok(files)
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeechAnalysis {
    pub speaker_name: String,
    pub speaker_party: Option<String>,
    pub date: NaiveDate,
    pub text_length: usize,
    pub source_file: String,
    pub analysis: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleMetadata {
    pub min_length: usize,
    pub requested_samples: usize,
    pub successful_analyses: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    pub status: String,
    pub metadata: SampleMetadata,
    /// Keyed by the speech's index in the loaded corpus.
    pub analyses: BTreeMap<usize, SpeechAnalysis>,
}

/// Picks up to `n` speeches of at least `min_length` characters with a
/// fixed seed. Returns indices into `speeches`.
pub fn select_sample(speeches: &[LoadedSpeech], n: usize, min_length: usize) -> Vec<usize> {
    let mut eligible: Vec<usize> = speeches
        .iter()
        .enumerate()
        .filter(|(_, s)| s.record.speech_text.chars().count() >= min_length)
        .map(|(index, _)| index)
        .collect();
    info!("Found {} speeches with length >= {min_length} characters", eligible.len());
    if eligible.len() < n {
        warn!(
            "Only {} valid speeches available, reducing sample size",
            eligible.len()
        );
    }
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    eligible.shuffle(&mut rng);
    eligible.truncate(n);
    eligible
}

pub async fn run_sample_analysis(
    analyzer: &Analyzer,
    speeches: &[LoadedSpeech],
    n: usize,
    min_length: usize,
) -> SampleReport {
    let sample = select_sample(speeches, n, min_length);
    let mut analyses = BTreeMap::new();

    for (done, index) in sample.iter().enumerate() {
        let speech = &speeches[*index];
        let text = &speech.record.speech_text;
        let text_length = text.chars().count();
        info!(
            "[{}/{}] Analyzing speech by {} ({text_length} characters)",
            done + 1,
            sample.len(),
            speech.record.speaker_name
        );
        let outcome = analyzer.analyze(text, &speech.source_file).await;
        analyses.insert(
            *index,
            SpeechAnalysis {
                speaker_name: speech.record.speaker_name.clone(),
                speaker_party: speech.record.speaker_party.clone(),
                date: speech.record.date,
                text_length,
                source_file: speech.source_file.clone(),
                analysis: outcome.result,
            },
        );
    }

    SampleReport {
        status: if analyses.is_empty() { "empty" } else { "success" }.to_string(),
        metadata: SampleMetadata {
            min_length,
            requested_samples: n,
            successful_analyses: analyses.len(),
        },
        analyses,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_speeches: usize,
    pub unique_parties: usize,
    pub date_range: Option<String>,
    pub speeches_per_party: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartyAnalysis {
    pub source_file: String,
    pub analysis: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullReport {
    pub statistics: Statistics,
    pub party_analyses: BTreeMap<String, Vec<PartyAnalysis>>,
}

fn party_label(speech: &LoadedSpeech) -> &str {
    speech
        .record
        .speaker_party
        .as_deref()
        .unwrap_or(UNKNOWN_PARTY)
}

/// Corpus statistics. Speeches without a party are not counted as a party.
pub fn statistics(speeches: &[LoadedSpeech]) -> Statistics {
    let mut speeches_per_party = BTreeMap::new();
    for speech in speeches {
        if let Some(party) = &speech.record.speaker_party {
            *speeches_per_party.entry(party.clone()).or_insert(0) += 1;
        }
    }
    let dates = speeches.iter().map(|s| s.record.date);
    let date_range = dates
        .clone()
        .min()
        .zip(dates.max())
        .map(|(first, last)| format!("{first} to {last}"));

    Statistics {
        total_speeches: speeches.len(),
        unique_parties: speeches_per_party.len(),
        date_range,
        speeches_per_party,
    }
}

pub async fn run_full_analysis(analyzer: &Analyzer, speeches: &[LoadedSpeech]) -> FullReport {
    let statistics = statistics(speeches);
    let parties: BTreeSet<&str> = speeches.iter().map(party_label).collect();
    let mut party_analyses: BTreeMap<String, Vec<PartyAnalysis>> = BTreeMap::new();

    for party in parties {
        let party_speeches: Vec<&LoadedSpeech> =
            speeches.iter().filter(|s| party_label(s) == party).collect();
        info!("Analyzing {} speeches for {party}", party_speeches.len());
        for speech in party_speeches {
            let outcome = analyzer
                .analyze(&speech.record.speech_text, &speech.source_file)
                .await;
            party_analyses
                .entry(party.to_string())
                .or_default()
                .push(PartyAnalysis {
                    source_file: speech.source_file.clone(),
                    analysis: outcome.result,
                });
        }
    }

    FullReport {
        statistics,
        party_analyses,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Sample,
    Full,
}

impl ReportKind {
    fn prefix(self) -> &'static str {
        match self {
            ReportKind::Sample => "sample_analysis",
            ReportKind::Full => "analysis",
        }
    }
}

/// Writes `report` as pretty JSON to `{dir}/{prefix}_{YYYYMMDD}.json`.
pub fn write_report<T: Serialize>(
    dir: &Path,
    kind: ReportKind,
    date: NaiveDate,
    report: &T,
) -> Result<PathBuf, AnalysisError> {
    fs::create_dir_all(dir).map_err(|source| AnalysisError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{}_{}.json", kind.prefix(), date.format("%Y%m%d")));
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).map_err(|source| AnalysisError::Io {
        path: path.clone(),
        source,
    })?;
    info!("Analysis results saved to {}", path.display());
    Ok(path)
}
