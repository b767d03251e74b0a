//! # Shared Constants
//!
//! Defaults for the archive endpoints, on-disk layout and retry policy. Every
//! value here can be overridden through configuration; nothing in the
//! library reads these directly at runtime except to build a `Default`.

/// Base URL of the publications archive. Documents live directly under it.
pub const DEFAULT_BASE_URL: &str = "https://zoek.officielebekendmakingen.nl";

/// The search-results listing for one session year. `{group}` is replaced by
/// the group key (e.g. `2023-2024`).
pub const DEFAULT_LISTING_URL_TEMPLATE: &str = "https://zoek.officielebekendmakingen.nl/resultaten?q=(c.product-area==%22officielepublicaties%22)and((w.publicatienaam==%22Handelingen%22))%20AND%20w.vergaderjaar==%22{group}%22&zv=&pg=1000&col=Handelingen&svel=Publicatiedatum&svol=Aflopend&sf=vj%7c{group}";

/// Item ids matching this pattern belong to the Eerste Kamer and are skipped.
pub const DEFAULT_EXCLUDE_PATTERN: &str = "-ek-";

/// Session years harvested when no explicit order is configured.
pub const DEFAULT_GROUPS: [&str; 3] = ["2023-2024", "2022-2023", "2021-2022"];

pub const DEFAULT_DATA_DIR: &str = "data";

pub const LINKS_DIR: &str = "links";
pub const DOCUMENTS_DIR: &str = "handelingen";
pub const META_DIR: &str = "meta";
pub const PARSED_DIR: &str = "parsed";

pub const DOWNLOAD_CHECKPOINT_FILE: &str = "last_processed.txt";
pub const META_CHECKPOINT_FILE: &str = "last_processed_meta.txt";
pub const PARSE_CHECKPOINT_FILE: &str = "last_processed_parse.txt";

pub const DOWNLOAD_ERROR_LOG: &str = "error_log.txt";
pub const META_ERROR_LOG: &str = "meta_error_log.txt";
pub const PARSE_ERROR_LOG: &str = "parse_error_log.txt";

/// The category column written with every speech record.
pub const SPEECH_CATEGORY: &str = "handelingen";

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BACKOFF_SECS: u64 = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETRYABLE_STATUS: [u16; 1] = [500];
pub const DEFAULT_POLITENESS_MIN_MS: u64 = 1_000;
pub const DEFAULT_POLITENESS_MAX_MS: u64 = 2_000;

pub const USER_AGENT: &str = concat!("handelingen/", env!("CARGO_PKG_VERSION"));
