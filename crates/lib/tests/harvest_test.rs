//! # Harvest Stage Tests
//!
//! Each stage runs against a wiremock archive and a temporary data directory.

mod common;

use common::{fast_fetcher, setup_tracing};
use handelingen::checkpoint::CheckpointStore;
use handelingen::error_log::ErrorLog;
use handelingen::harvest::{ArchiveConfig, Harvester};
use handelingen::store::IncrementalRecordStore;
use handelingen::types::{Checkpoint, LinkRecord, MetadataRecord, SpeechRecord};
use handelingen_test_utils::fixtures::{self, detail_html, listing_html, TRANSCRIPT_XML};
use handelingen_test_utils::TestLayout;
use std::fs;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GROUP: &str = "2023-2024";

fn harvester(server: &MockServer, test: &TestLayout) -> Harvester {
    let archive = ArchiveConfig {
        base_url: server.uri(),
        listing_url_template: format!("{}/resultaten?vj={{group}}", server.uri()),
        ..ArchiveConfig::default()
    };
    Harvester::new(test.layout.clone(), archive, fast_fetcher(2)).unwrap()
}

fn groups() -> Vec<String> {
    vec![GROUP.to_string()]
}

#[tokio::test]
async fn test_collect_links_writes_link_list() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    let test = TestLayout::new().unwrap();
    let page = listing_html(
        &[
            "/h-tk-20232024-1-1.html",
            "/h-ek-20232024-1-2.html",
            "/h-tk-20232024-1-3.html",
            "/h-tk-20232024-1-1.html",
        ],
        1,
    );
    Mock::given(method("GET"))
        .and(path("/resultaten"))
        .and(query_param("vj", GROUP))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    // --- 2. Act ---
    let reports = harvester(&server, &test).collect_links(&groups()).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(reports[0].processed, 2);
    assert_eq!(reports[0].skipped, 1);
    let links = IncrementalRecordStore::<LinkRecord>::open(test.layout.link_list(GROUP))
        .records()
        .unwrap();
    let ids: Vec<&str> = links.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["h-tk-20232024-1-1.xml", "h-tk-20232024-1-3.xml"]);
    assert!(links.iter().all(|l| l.vergaderjaar == GROUP));
}

#[tokio::test]
async fn test_collect_links_listing_failure_skips_group() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    let test = TestLayout::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/resultaten"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    // --- 2. Act ---
    let reports = harvester(&server, &test).collect_links(&groups()).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(reports[0].failed, 1);
    assert_eq!(reports[0].processed, 0);
}

#[tokio::test]
async fn test_download_saves_documents_and_resumes_without_refetching() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    let test = TestLayout::new().unwrap();
    test.write_link_list(GROUP, &["a.xml", "h-ek-b.xml", "c.xml"]).unwrap();
    for name in ["/a.xml", "/c.xml"] {
        Mock::given(method("GET"))
            .and(path(name))
            .respond_with(ResponseTemplate::new(200).set_body_string("<handeling/>"))
            .expect(1)
            .mount(&server)
            .await;
    }
    let harvester = harvester(&server, &test);

    // --- 2. Act ---
    let first = harvester.download(&groups()).await.unwrap();
    let second = harvester.download(&groups()).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(first[0].processed, 2);
    assert_eq!(second[0].processed, 0);
    assert!(test.layout.document(GROUP, "a.xml").exists());
    assert!(test.layout.document(GROUP, "c.xml").exists());
    assert!(!test.layout.document(GROUP, "h-ek-b.xml").exists());
    let checkpoint = CheckpointStore::new(test.layout.download_checkpoint());
    assert_eq!(checkpoint.read().unwrap(), Some(Checkpoint::new(GROUP, "c.xml")));
}

#[tokio::test]
async fn test_download_failure_warms_up_logs_and_continues() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    let test = TestLayout::new().unwrap();
    test.write_link_list(GROUP, &["bad.xml", "good.xml"]).unwrap();
    Mock::given(method("GET"))
        .and(path("/bad.xml"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bad.html"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/good.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<handeling/>"))
        .mount(&server)
        .await;

    // --- 2. Act ---
    let reports = harvester(&server, &test).download(&groups()).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(reports[0].failed, 1);
    assert_eq!(reports[0].processed, 1);
    let failed = ErrorLog::new(test.layout.download_error_log(), "download")
        .failed_items()
        .unwrap();
    assert!(failed.contains("bad.xml"));
    assert!(test.layout.document(GROUP, "good.xml").exists());
}

#[tokio::test]
async fn test_scrape_metadata_appends_records_and_logs_failures() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    let test = TestLayout::new().unwrap();
    test.write_document(GROUP, "h-tk-1.xml", "<handeling/>").unwrap();
    test.write_document(GROUP, "h-tk-2.xml", "<handeling/>").unwrap();
    Mock::given(method("GET"))
        .and(path("/h-tk-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_html(
            "05-10-2023",
            "Tweede Kamer der Staten-Generaal",
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/h-tk-2.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body/></html>"))
        .expect(2)
        .mount(&server)
        .await;
    let harvester = harvester(&server, &test);

    // --- 2. Act ---
    let first = harvester.scrape_metadata(&groups()).await.unwrap();
    let second = harvester.scrape_metadata(&groups()).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(first[0].processed, 1);
    assert_eq!(first[0].failed, 1);
    assert_eq!(second[0].processed, 0);
    let records = IncrementalRecordStore::<MetadataRecord>::open(test.layout.meta_store(GROUP))
        .records()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file, "h-tk-1");
    assert_eq!(records[0].date.to_string(), "2023-10-05");
    let failed = ErrorLog::new(test.layout.meta_error_log(), "metadata")
        .failed_items()
        .unwrap();
    assert!(failed.contains("h-tk-2"));
}

#[tokio::test]
async fn test_retry_metadata_skips_known_names() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    let test = TestLayout::new().unwrap();
    IncrementalRecordStore::<MetadataRecord>::open(test.layout.meta_store(GROUP))
        .append(&fixtures::metadata("known"))
        .unwrap();
    Mock::given(method("GET"))
        .and(path("/recovered.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_html(
            "06-10-2023",
            "Verenigde Vergadering der Staten-Generaal",
        )))
        .expect(1)
        .mount(&server)
        .await;
    let harvester = harvester(&server, &test);

    // --- 2. Act ---
    let report = harvester
        .retry_metadata(
            GROUP,
            &["known".to_string(), "recovered".to_string()],
            &fast_fetcher(3),
        )
        .await
        .unwrap();

    // --- 3. Assert ---
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 1);
    assert!(!test.layout.meta_checkpoint().exists());
}

#[tokio::test]
async fn test_parse_speeches_joins_metadata_and_skips_parsed_documents() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    let test = TestLayout::new().unwrap();
    test.write_document(GROUP, "h-tk-1.xml", TRANSCRIPT_XML).unwrap();
    test.write_document(GROUP, "h-tk-2.xml", TRANSCRIPT_XML).unwrap();
    IncrementalRecordStore::<MetadataRecord>::open(test.layout.meta_store(GROUP))
        .append(&fixtures::metadata("h-tk-1"))
        .unwrap();
    let harvester = harvester(&server, &test);

    // --- 2. Act ---
    let first = harvester.parse_speeches(&groups()).await.unwrap();
    fs::remove_file(test.layout.parse_checkpoint()).unwrap();
    let second = harvester.parse_speeches(&groups()).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(first[0].processed, 1);
    assert_eq!(first[0].failed, 1);
    assert_eq!(second[0].skipped, 1);
    let speeches = IncrementalRecordStore::<SpeechRecord>::open(test.layout.speech_store(GROUP))
        .records()
        .unwrap();
    assert_eq!(speeches.len(), 2);
    assert!(speeches.iter().all(|s| s.file_id == "h-tk-1"));
    let failed = ErrorLog::new(test.layout.parse_error_log(), "parse")
        .failed_items()
        .unwrap();
    assert!(failed.contains("h-tk-2.xml"));
}
