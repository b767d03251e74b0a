//! Subcommand handlers. Each builds what it needs from [`AppConfig`] and
//! prints a short summary to stdout; details go to the log.

use crate::config::{AppConfig, API_KEY_VAR};
use anyhow::{anyhow, Context, Result};
use chrono::Local;
use handelingen::analysis::runner::{
    load_speeches, run_full_analysis, run_sample_analysis, write_report, ReportKind,
};
use handelingen::audit::{
    audit_downloads, audit_metadata, metadata_coverage, preview as preview_speeches,
};
use handelingen::error_log::ErrorLog;
use handelingen::providers::ai::CompletionsProvider;
use handelingen::types::document_name;
use handelingen::{Analyzer, Harvester, Layout, PromptTemplate, RetryingFetcher, StageReport};
use regex::Regex;
use std::path::PathBuf;
use tracing::{info, warn};

fn layout(config: &AppConfig) -> Layout {
    Layout::new(config.data_dir.clone())
}

fn harvester(config: &AppConfig) -> Result<Harvester> {
    let fetcher = RetryingFetcher::new(config.fetch.policy())?;
    Ok(Harvester::new(layout(config), config.archive.clone(), fetcher)?)
}

fn exclude_pattern(config: &AppConfig) -> Result<Option<Regex>> {
    let pattern = &config.archive.exclude_pattern;
    if pattern.is_empty() {
        return Ok(None);
    }
    let re = Regex::new(pattern).with_context(|| format!("invalid exclude pattern '{pattern}'"))?;
    Ok(Some(re))
}

fn print_reports(stage: &str, reports: &[StageReport]) {
    for r in reports {
        println!(
            "{stage} {}: {} processed, {} skipped, {} failed",
            r.group, r.processed, r.skipped, r.failed
        );
    }
}

pub async fn links(config: &AppConfig) -> Result<()> {
    let reports = harvester(config)?.collect_links(&config.groups).await?;
    print_reports("links", &reports);
    Ok(())
}

pub async fn download(config: &AppConfig) -> Result<()> {
    let reports = harvester(config)?.download(&config.groups).await?;
    print_reports("download", &reports);
    Ok(())
}

pub async fn meta(config: &AppConfig) -> Result<()> {
    let reports = harvester(config)?.scrape_metadata(&config.groups).await?;
    print_reports("meta", &reports);
    Ok(())
}

pub async fn parse(config: &AppConfig) -> Result<()> {
    let reports = harvester(config)?.parse_speeches(&config.groups).await?;
    print_reports("parse", &reports);
    Ok(())
}

pub async fn harvest(config: &AppConfig) -> Result<()> {
    let harvester = harvester(config)?;
    print_reports("links", &harvester.collect_links(&config.groups).await?);
    print_reports("download", &harvester.download(&config.groups).await?);
    print_reports("meta", &harvester.scrape_metadata(&config.groups).await?);
    print_reports("parse", &harvester.parse_speeches(&config.groups).await?);
    Ok(())
}

/// Without explicit names, retries the group's documents that have a
/// logged metadata failure.
pub async fn meta_retry(config: &AppConfig, group: &str, names: Vec<String>) -> Result<()> {
    let layout = layout(config);
    let names = if names.is_empty() {
        let failed = ErrorLog::new(layout.meta_error_log(), "metadata").failed_items()?;
        layout
            .list_documents(group)?
            .iter()
            .map(|id| document_name(id).to_string())
            .filter(|name| failed.contains(name))
            .collect()
    } else {
        names
    };
    if names.is_empty() {
        info!("No metadata failures to retry for {group}.");
        return Ok(());
    }

    let fetcher = RetryingFetcher::new(config.retry_fetch.policy())?;
    let report = harvester(config)?
        .retry_metadata(group, &names, &fetcher)
        .await?;
    print_reports("meta-retry", &[report]);
    Ok(())
}

pub fn validate_downloads(config: &AppConfig) -> Result<()> {
    let layout = layout(config);
    let exclude = exclude_pattern(config)?;
    for group in &config.groups {
        let audit = audit_downloads(&layout, group, exclude.as_ref())?;
        println!(
            "{group}: {} expected, {} downloaded, {} failed with a logged error, {} missing",
            audit.expected,
            audit.downloaded,
            audit.failed.len(),
            audit.missing.len()
        );
        for id in &audit.missing {
            println!("  missing without error: {id}");
        }
    }
    Ok(())
}

pub fn validate_metadata(config: &AppConfig) -> Result<()> {
    let layout = layout(config);
    let mut audits = Vec::with_capacity(config.groups.len());
    for group in &config.groups {
        let audit = audit_metadata(&layout, group)?;
        println!(
            "{group}: {} metadata rows for {} documents",
            audit.rows, audit.documents
        );
        for (column, count) in audit.missing_values.iter().filter(|(_, n)| **n > 0) {
            println!("  missing values in {column}: {count}");
        }
        let findings = [
            ("invalid date", &audit.invalid_dates),
            ("invalid kamer", &audit.invalid_kamer),
            ("duplicate key", &audit.duplicate_keys),
            ("document without metadata", &audit.documents_without_metadata),
            ("metadata without document", &audit.metadata_without_document),
            ("missing without logged error", &audit.missing_without_error),
        ];
        for (label, names) in findings {
            for name in names {
                println!("  {label}: {name}");
            }
        }
        if !audit.is_clean() {
            warn!("Metadata for {group} has problems.");
        }
        audits.push(audit);
    }

    let rows: usize = audits.iter().map(|a| a.rows).sum();
    let documents: usize = audits.iter().map(|a| a.documents).sum();
    let missing: usize = audits.iter().map(|a| a.documents_without_metadata.len()).sum();
    let unexplained: usize = audits.iter().map(|a| a.missing_without_error.len()).sum();
    println!("Total metadata rows: {rows}");
    println!("Total documents: {documents}");
    println!("Total documents missing from metadata: {missing}");
    println!("Missing without a logged error: {unexplained}");
    println!("Overall metadata coverage: {:.1}%", metadata_coverage(&audits));
    Ok(())
}

pub fn preview(
    config: &AppConfig,
    group: Option<&str>,
    count: usize,
    max_chars: usize,
) -> Result<()> {
    let layout = layout(config);
    let groups: Vec<&str> = match group {
        Some(g) => vec![g],
        None => config.groups.iter().map(String::as_str).collect(),
    };
    for group in groups {
        println!("== {group} ==");
        for speech in preview_speeches(&layout, group, count, max_chars)? {
            println!(
                "[{} #{}] {} ({}) {}: {}",
                speech.file_id,
                speech.position,
                speech.speaker_name,
                speech.speaker_party.as_deref().unwrap_or("-"),
                speech.date,
                speech.speech_text
            );
        }
    }
    Ok(())
}

pub struct AnalyzeOptions {
    pub csv_path: Option<PathBuf>,
    pub prompt_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub sample: usize,
    pub min_length: usize,
}

pub async fn analyze(config: &AppConfig, options: AnalyzeOptions) -> Result<()> {
    let settings = &config.analysis;
    let api_key = settings
        .api_key
        .clone()
        .ok_or_else(|| anyhow!("{API_KEY_VAR} is not set"))?;
    let provider = CompletionsProvider::new(api_key, settings.completions())?;

    let prompt_path = options
        .prompt_path
        .unwrap_or_else(|| settings.prompt_path.clone());
    let template = PromptTemplate::from_yaml_file(&prompt_path)
        .with_context(|| format!("failed to load prompt {}", prompt_path.display()))?;
    let analyzer = Analyzer::new(Box::new(provider), template)
        .with_parse_timeout(settings.parse_timeout())
        .with_finding_fields(settings.finding_fields.clone());

    let csv_path = options
        .csv_path
        .unwrap_or_else(|| layout(config).parsed_dir());
    let speeches = load_speeches(&csv_path)?;
    let output_dir = options
        .output_dir
        .unwrap_or_else(|| settings.output_dir.clone());
    let today = Local::now().date_naive();

    let path = if options.sample > 0 {
        let report =
            run_sample_analysis(&analyzer, &speeches, options.sample, options.min_length).await;
        write_report(&output_dir, ReportKind::Sample, today, &report)?
    } else {
        let report = run_full_analysis(&analyzer, &speeches).await;
        write_report(&output_dir, ReportKind::Full, today, &report)?
    };
    println!("Analysis results saved to {}", path.display());
    Ok(())
}
