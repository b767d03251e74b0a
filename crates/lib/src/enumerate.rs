//! # Work Enumerator
//!
//! Discovers the item ids of one group from the archive's paginated search
//! listing. Pages are fetched lazily: page `n` is only requested once the
//! consumer has drained the items of page `n - 1`.

use crate::fetch::{FetchError, RetryingFetcher};
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use handelingen_html::{parse_page_count, parse_result_links, HtmlError, ListingSelectors};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum EnumerateError {
    #[error("Listing page {page} could not be fetched: {source}")]
    ListingPage {
        page: u32,
        #[source]
        source: FetchError,
    },
    #[error("Listing page {page} could not be parsed: {source}")]
    Html {
        page: u32,
        #[source]
        source: HtmlError,
    },
}

/// Turns a result-link `href` into an item id.
///
/// The last path segment is kept (query and fragment dropped) and a trailing
/// `from_suffix` is replaced with `to_suffix`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LinkRewrite {
    pub from_suffix: String,
    pub to_suffix: String,
}

impl Default for LinkRewrite {
    fn default() -> Self {
        Self {
            from_suffix: ".html".to_string(),
            to_suffix: ".xml".to_string(),
        }
    }
}

impl LinkRewrite {
    pub fn apply(&self, href: &str) -> String {
        let without_query = href
            .split(['?', '#'])
            .next()
            .unwrap_or(href)
            .trim_end_matches('/');
        let segment = without_query
            .rsplit('/')
            .next()
            .unwrap_or(without_query);
        match segment.strip_suffix(self.from_suffix.as_str()) {
            Some(stem) => format!("{stem}{}", self.to_suffix),
            None => segment.to_string(),
        }
    }
}

/// Appends the page parameter to a listing URL.
pub fn page_url(listing_url: &str, page: u32) -> String {
    format!("{listing_url}&pagina={page}")
}

#[derive(Debug, Clone)]
pub struct WorkEnumerator {
    fetcher: RetryingFetcher,
    selectors: ListingSelectors,
    rewrite: LinkRewrite,
    exclude: Option<Regex>,
}

impl WorkEnumerator {
    pub fn new(
        fetcher: RetryingFetcher,
        selectors: ListingSelectors,
        rewrite: LinkRewrite,
        exclude: Option<Regex>,
    ) -> Self {
        Self {
            fetcher,
            selectors,
            rewrite,
            exclude,
        }
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        self.exclude.as_ref().is_some_and(|re| re.is_match(id))
    }

    /// Fetches page 1 and returns the highest page number in its pagination
    /// control, or 1 when there is none.
    pub async fn list_page_count(&self, listing_url: &str) -> Result<u32, EnumerateError> {
        let fetched = self
            .fetcher
            .fetch(listing_url)
            .await
            .map_err(|source| EnumerateError::ListingPage { page: 1, source })?;
        let count = parse_page_count(&fetched.text(), &self.selectors)
            .map_err(|source| EnumerateError::Html { page: 1, source })?;
        info!("Listing {listing_url} has {count} page(s)");
        Ok(count)
    }

    /// Streams the item ids of pages `1..=page_count`, in page order.
    ///
    /// Excluded ids are dropped before they are yielded. After an error the
    /// consumer is expected to stop; ids already yielded stay valid.
    pub fn enumerate_items<'a>(
        &'a self,
        listing_url: &'a str,
        page_count: u32,
    ) -> impl Stream<Item = Result<String, EnumerateError>> + 'a {
        stream::iter(1..=page_count)
            .then(move |page| self.page_items(listing_url, page))
            .map_ok(|ids| stream::iter(ids.into_iter().map(Ok::<String, EnumerateError>)))
            .try_flatten()
    }

    async fn page_items(&self, listing_url: &str, page: u32) -> Result<Vec<String>, EnumerateError> {
        let url = page_url(listing_url, page);
        let fetched = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|source| EnumerateError::ListingPage { page, source })?;
        let hrefs = parse_result_links(&fetched.text(), &self.selectors)
            .map_err(|source| EnumerateError::Html { page, source })?;

        let total = hrefs.len();
        let ids: Vec<String> = hrefs
            .iter()
            .map(|href| self.rewrite.apply(href))
            .filter(|id| !id.is_empty() && !self.is_excluded(id))
            .collect();
        debug!("Page {page}: {} of {total} link(s) kept", ids.len());
        Ok(ids)
    }
}
