//! # Harvest Stages
//!
//! The acquisition pipeline, one stage per method:
//!
//! 1. [`Harvester::collect_links`] writes each group's link list.
//! 2. [`Harvester::download`] fetches the XML documents named in the list.
//! 3. [`Harvester::scrape_metadata`] scrapes one detail page per document.
//! 4. [`Harvester::retry_metadata`] re-scrapes an explicit list of names.
//! 5. [`Harvester::parse_speeches`] turns documents into speech records.
//!
//! Every stage walks groups in the configured order and items in enumeration
//! order, one request at a time. A failing item is logged to the stage's
//! error log and skipped. Only local storage failures abort the stage.

use crate::checkpoint::{rename_durably, CheckpointStore, GroupResume, ResumePlan};
use crate::constants::{DEFAULT_BASE_URL, DEFAULT_EXCLUDE_PATTERN, DEFAULT_LISTING_URL_TEMPLATE};
use crate::enumerate::{LinkRewrite, WorkEnumerator};
use crate::error_log::ErrorLog;
use crate::errors::HarvestError;
use crate::extract::DocumentExtractor;
use crate::fetch::{FetchError, RetryingFetcher};
use crate::layout::Layout;
use crate::metadata::{metadata_from_page, MetadataError};
use crate::store::IncrementalRecordStore;
use crate::types::{sequence, LinkRecord, MetadataRecord, SpeechRecord, WorkItem};
use futures::{pin_mut, StreamExt};
use handelingen_html::{parse_detail_page, DetailSelectors, HtmlError, ListingSelectors};
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Where and how to talk to the archive.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArchiveConfig {
    pub base_url: String,
    /// Listing URL with a `{group}` placeholder.
    pub listing_url_template: String,
    /// Regex of item ids to skip. Empty disables exclusion.
    pub exclude_pattern: String,
    pub listing: ListingSelectors,
    pub detail: DetailSelectors,
    pub link_rewrite: LinkRewrite,
    /// After a failed download, request the HTML page once and retry the XML.
    pub warm_up_on_failure: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            listing_url_template: DEFAULT_LISTING_URL_TEMPLATE.to_string(),
            exclude_pattern: DEFAULT_EXCLUDE_PATTERN.to_string(),
            listing: ListingSelectors::default(),
            detail: DetailSelectors::default(),
            link_rewrite: LinkRewrite::default(),
            warm_up_on_failure: true,
        }
    }
}

/// Per-group counters of one stage run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub group: String,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageReport {
    fn new(group: &str) -> Self {
        Self {
            group: group.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Error, Debug)]
enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Html(#[from] HtmlError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[derive(Debug, Clone)]
pub struct Harvester {
    layout: Layout,
    archive: ArchiveConfig,
    fetcher: RetryingFetcher,
    exclude: Option<Regex>,
}

impl Harvester {
    pub fn new(
        layout: Layout,
        archive: ArchiveConfig,
        fetcher: RetryingFetcher,
    ) -> Result<Self, HarvestError> {
        let exclude = if archive.exclude_pattern.is_empty() {
            None
        } else {
            Some(Regex::new(&archive.exclude_pattern)?)
        };
        Ok(Self {
            layout,
            archive,
            fetcher,
            exclude,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn listing_url(&self, group: &str) -> String {
        self.archive.listing_url_template.replace("{group}", group)
    }

    fn base_url(&self) -> &str {
        self.archive.base_url.trim_end_matches('/')
    }

    fn is_excluded(&self, id: &str) -> bool {
        self.exclude.as_ref().is_some_and(|re| re.is_match(id))
    }

    fn enumerator(&self) -> WorkEnumerator {
        WorkEnumerator::new(
            self.fetcher.clone(),
            self.archive.listing.clone(),
            self.archive.link_rewrite.clone(),
            self.exclude.clone(),
        )
    }

    /// Rewrites each group's link list from the live listing.
    ///
    /// A listing failure ends that group; rows written for earlier pages stay.
    #[instrument(skip(self))]
    pub async fn collect_links(&self, groups: &[String]) -> Result<Vec<StageReport>, HarvestError> {
        let enumerator = self.enumerator();
        let mut reports = Vec::with_capacity(groups.len());

        for group in groups {
            info!("Collecting links for {group}");
            let mut report = StageReport::new(group);
            let path = self.layout.link_list(group);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| HarvestError::storage(&path, e))?;
            }
            let mut links = IncrementalRecordStore::<LinkRecord>::open(&path);

            let listing_url = self.listing_url(group);
            let page_count = match enumerator.list_page_count(&listing_url).await {
                Ok(count) => count,
                Err(e) => {
                    error!("Skipping {group}: {e}");
                    report.failed += 1;
                    reports.push(report);
                    continue;
                }
            };

            let mut seen = HashSet::new();
            let items = enumerator.enumerate_items(&listing_url, page_count);
            pin_mut!(items);
            while let Some(item) = items.next().await {
                match item {
                    Ok(id) if !seen.insert(id.clone()) => report.skipped += 1,
                    Ok(id) => {
                        links.append(&LinkRecord {
                            vergaderjaar: group.clone(),
                            id,
                        })?;
                        report.processed += 1;
                    }
                    Err(e) => {
                        error!("Stopping {group} early: {e}");
                        report.failed += 1;
                        break;
                    }
                }
            }
            info!(
                "Collected {} link(s) for {group} into {}",
                report.processed,
                path.display()
            );
            reports.push(report);
        }
        Ok(reports)
    }

    /// Downloads every listed document not yet on disk, resuming after the
    /// download checkpoint.
    #[instrument(skip(self))]
    pub async fn download(&self, groups: &[String]) -> Result<Vec<StageReport>, HarvestError> {
        let checkpoint = CheckpointStore::new(self.layout.download_checkpoint());
        let plan = ResumePlan::new(groups, checkpoint.read_or_start());
        let error_log = ErrorLog::new(self.layout.download_error_log(), "download");
        let mut reports = Vec::with_capacity(groups.len());

        for group in plan.groups() {
            let mut report = StageReport::new(group);
            let resume = plan.for_group(group);
            if resume == GroupResume::Skip {
                info!("Skipping {group}: completed in an earlier run");
                reports.push(report);
                continue;
            }

            let links = IncrementalRecordStore::<LinkRecord>::open(self.layout.link_list(group))
                .records()?;
            if links.is_empty() {
                warn!("No links listed for {group}; run the link stage first");
            }
            let items = sequence(
                group,
                links
                    .into_iter()
                    .map(|link| link.id)
                    .filter(|id| !self.is_excluded(id)),
            );
            let pending = resume.pending(&items);
            report.skipped += items.len() - pending.len();
            info!("Downloading {} of {} document(s) for {group}", pending.len(), items.len());

            for item in pending {
                let path = self.layout.document(group, &item.id);
                if path.exists() {
                    report.skipped += 1;
                    continue;
                }
                let url = format!("{}/{}", self.base_url(), item.id);
                match self.fetch_document(&url, item).await {
                    Ok(body) => {
                        write_atomic(&path, &body)?;
                        checkpoint.advance(&item.checkpoint())?;
                        report.processed += 1;
                        info!("Saved {}", path.display());
                    }
                    Err(e) => {
                        error!("Error retrieving {url}: {e}");
                        error_log.record_or_warn(&item.id, &format!("Error retrieving {url}: {e}"));
                        report.failed += 1;
                    }
                }
            }
            log_report("download", &report);
            reports.push(report);
        }
        Ok(reports)
    }

    async fn fetch_document(&self, url: &str, item: &WorkItem) -> Result<Vec<u8>, FetchError> {
        match self.fetcher.fetch(url).await {
            Ok(fetched) => Ok(fetched.body),
            Err(e) if self.archive.warm_up_on_failure => {
                let html_url = format!("{}/{}.html", self.base_url(), item.document_name());
                warn!("{e}; requesting {html_url} before one more try");
                if let Err(warm_up) = self.fetcher.fetch(&html_url).await {
                    warn!("Warm-up request failed too: {warm_up}");
                }
                Ok(self.fetcher.fetch(url).await?.body)
            }
            Err(e) => Err(e),
        }
    }

    /// Scrapes metadata for every downloaded document without a stored
    /// record, resuming after the metadata checkpoint.
    #[instrument(skip(self))]
    pub async fn scrape_metadata(&self, groups: &[String]) -> Result<Vec<StageReport>, HarvestError> {
        let checkpoint = CheckpointStore::new(self.layout.meta_checkpoint());
        let plan = ResumePlan::new(groups, checkpoint.read_or_start());
        let error_log = ErrorLog::new(self.layout.meta_error_log(), "metadata");
        let mut reports = Vec::with_capacity(groups.len());

        for group in plan.groups() {
            let mut report = StageReport::new(group);
            let resume = plan.for_group(group);
            if resume == GroupResume::Skip {
                info!("Skipping {group}: completed in an earlier run");
                reports.push(report);
                continue;
            }

            let mut store = IncrementalRecordStore::<MetadataRecord>::open(self.layout.meta_store(group));
            let mut existing = store.existing_keys()?;
            info!("Found {} existing entries in the metadata store for {group}", existing.len());

            let items = sequence(group, self.document_names(group)?);
            let pending = resume.pending(&items);
            report.skipped += items.len() - pending.len();

            for item in pending {
                if existing.contains(&item.id) {
                    report.skipped += 1;
                    continue;
                }
                match self.scrape_one(&self.fetcher, &item.id).await {
                    Ok(record) => {
                        store.append(&record)?;
                        existing.insert(record.file);
                        checkpoint.advance(&item.checkpoint())?;
                        report.processed += 1;
                    }
                    Err(e) => {
                        error!("Error processing {}: {e}", item.id);
                        error_log.record_or_warn(&item.id, &e.to_string());
                        report.failed += 1;
                    }
                }
            }
            log_report("metadata", &report);
            reports.push(report);
        }
        Ok(reports)
    }

    /// Re-scrapes `names` of one group with a dedicated fetcher, typically
    /// one with longer timeouts. Names already stored are skipped; the
    /// metadata checkpoint is not touched.
    #[instrument(skip(self, fetcher))]
    pub async fn retry_metadata(
        &self,
        group: &str,
        names: &[String],
        fetcher: &RetryingFetcher,
    ) -> Result<StageReport, HarvestError> {
        let error_log = ErrorLog::new(self.layout.meta_error_log(), "metadata-retry");
        let mut store = IncrementalRecordStore::<MetadataRecord>::open(self.layout.meta_store(group));
        let mut existing = store.existing_keys()?;
        let mut report = StageReport::new(group);

        for name in names {
            if existing.contains(name) {
                info!("{name} already has metadata");
                report.skipped += 1;
                continue;
            }
            match self.scrape_one(fetcher, name).await {
                Ok(record) => {
                    store.append(&record)?;
                    existing.insert(record.file);
                    info!("Recovered metadata for {name}");
                    report.processed += 1;
                }
                Err(e) => {
                    error!("Retry failed for {name}: {e}");
                    error_log.record_or_warn(name, &e.to_string());
                    report.failed += 1;
                }
            }
        }
        log_report("metadata-retry", &report);
        Ok(report)
    }

    async fn scrape_one(
        &self,
        fetcher: &RetryingFetcher,
        name: &str,
    ) -> Result<MetadataRecord, ItemError> {
        let url = format!("{}/{name}.html", self.base_url());
        let fetched = fetcher.fetch(&url).await?;
        let page = parse_detail_page(&fetched.text(), &self.archive.detail)?
            .ok_or(MetadataError::TableNotFound)?;
        Ok(metadata_from_page(name, &page)?)
    }

    /// Parses every downloaded document into speech records, resuming after
    /// the parse checkpoint.
    #[instrument(skip(self))]
    pub async fn parse_speeches(&self, groups: &[String]) -> Result<Vec<StageReport>, HarvestError> {
        let checkpoint = CheckpointStore::new(self.layout.parse_checkpoint());
        let plan = ResumePlan::new(groups, checkpoint.read_or_start());
        let error_log = ErrorLog::new(self.layout.parse_error_log(), "parse");
        let extractor = DocumentExtractor::new(self.base_url());
        let mut reports = Vec::with_capacity(groups.len());

        for group in plan.groups() {
            let mut report = StageReport::new(group);
            let resume = plan.for_group(group);
            if resume == GroupResume::Skip {
                info!("Skipping {group}: completed in an earlier run");
                reports.push(report);
                continue;
            }

            let metadata: HashMap<String, MetadataRecord> =
                IncrementalRecordStore::<MetadataRecord>::open(self.layout.meta_store(group))
                    .records()?
                    .into_iter()
                    .map(|record| (record.file.clone(), record))
                    .collect();

            let mut speeches = IncrementalRecordStore::<SpeechRecord>::open(self.layout.speech_store(group));
            let parsed: HashSet<String> = speeches
                .existing_keys()?
                .into_iter()
                .map(|(file_id, _)| file_id)
                .collect();

            let documents = self
                .layout
                .list_documents(group)
                .map_err(|e| HarvestError::storage(self.layout.documents_dir(group), e))?;
            let items = sequence(group, documents);
            let pending = resume.pending(&items);
            report.skipped += items.len() - pending.len();
            info!("Found {} document(s) to parse for {group}", pending.len());

            let mut total_speeches = 0usize;
            for (done, item) in pending.iter().enumerate() {
                let name = item.document_name();
                if parsed.contains(name) {
                    report.skipped += 1;
                    continue;
                }
                let path = self.layout.document(group, &item.id);
                let records = read_document(&path).and_then(|raw| {
                    extractor
                        .parse(&raw, name, metadata.get(name))
                        .map_err(|e| e.to_string())
                });
                match records {
                    Ok(records) => {
                        speeches.append_all(&records)?;
                        checkpoint.advance(&item.checkpoint())?;
                        total_speeches += records.len();
                        report.processed += 1;
                    }
                    Err(message) => {
                        error!("Error processing document {}: {message}", path.display());
                        error_log.record_or_warn(&item.id, &message);
                        report.failed += 1;
                    }
                }
                if (done + 1) % 10 == 0 {
                    info!(
                        "Processed {}/{} files, {total_speeches} speeches so far",
                        done + 1,
                        pending.len()
                    );
                }
            }
            info!("Completed {group}: {total_speeches} speeches");
            log_report("parse", &report);
            reports.push(report);
        }
        Ok(reports)
    }

    /// Sorted document names (without extension) downloaded for `group`.
    fn document_names(&self, group: &str) -> Result<Vec<String>, HarvestError> {
        let documents = self
            .layout
            .list_documents(group)
            .map_err(|e| HarvestError::storage(self.layout.documents_dir(group), e))?;
        Ok(documents
            .iter()
            .map(|id| crate::types::document_name(id).to_string())
            .collect())
    }
}

fn read_document(path: &Path) -> Result<String, String> {
    let bytes = fs::read(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    String::from_utf8(bytes).map_err(|e| format!("{} is not valid UTF-8: {e}", path.display()))
}

/// Writes `bytes` next to `path` and renames it into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), HarvestError> {
    let storage = |e| HarvestError::storage(path, e);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(storage)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".part");
    let tmp = path.with_file_name(tmp_name);
    {
        let mut file = File::create(&tmp).map_err(storage)?;
        file.write_all(bytes).map_err(storage)?;
        file.sync_all().map_err(storage)?;
    }
    rename_durably(&tmp, path).map_err(storage)
}

fn log_report(stage: &str, report: &StageReport) {
    info!(
        "[{stage}] {}: {} processed, {} skipped, {} failed",
        report.group, report.processed, report.skipped, report.failed
    );
}
