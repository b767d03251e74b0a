//! # handelingen-html: Archive Page Scraping
//!
//! Pure functions over the HTML served by the publications archive: the
//! search-result listing (pagination control and result links) and the
//! per-document detail page (the "data intro" metadata table and title).
//!
//! Every selector is configuration. The defaults match the live archive
//! layout, but callers may override them when the site changes.

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HtmlError {
    #[error("Invalid CSS selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Selectors for the search-result listing pages.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListingSelectors {
    /// Anchors inside the pagination control. Their text is the page number.
    pub pagination: String,
    /// Anchors whose `href` points at a single publication.
    pub result_links: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            pagination: "div.pagination__index ul li a".to_string(),
            result_links: "div.result--list.result--list--publications > ul > li > h2 a"
                .to_string(),
        }
    }
}

/// Selectors for a publication's HTML detail page.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DetailSelectors {
    pub table: String,
    /// Cells inside the table; each carries its label in `data-before`.
    pub cell: String,
    pub title: String,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            table: ".table--dataintro".to_string(),
            cell: "td".to_string(),
            title: "h1.title".to_string(),
        }
    }
}

/// The raw label/value pairs scraped from a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPage {
    pub fields: HashMap<String, String>,
    pub title: Option<String>,
}

impl DetailPage {
    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(String::as_str)
    }
}

fn selector(raw: &str) -> Result<Selector, HtmlError> {
    Selector::parse(raw).map_err(|e| HtmlError::InvalidSelector {
        selector: raw.to_string(),
        reason: format!("{e:?}"),
    })
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Returns the highest page number shown in the pagination control.
///
/// Anchors whose text is not a number ("volgende", "»") count as page 0.
/// A listing without a pagination control has a single page.
pub fn parse_page_count(html: &str, selectors: &ListingSelectors) -> Result<u32, HtmlError> {
    let sel = selector(&selectors.pagination)?;
    let document = Html::parse_document(html);
    let max = document
        .select(&sel)
        .map(|a| text_of(a).parse::<u32>().unwrap_or(0))
        .max();
    Ok(match max {
        Some(n) if n > 0 => n,
        _ => 1,
    })
}

/// Extracts the `href` of every result link, in page order.
pub fn parse_result_links(html: &str, selectors: &ListingSelectors) -> Result<Vec<String>, HtmlError> {
    let sel = selector(&selectors.result_links)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect())
}

/// Scrapes the metadata table and title of a detail page.
///
/// Returns `Ok(None)` when the page has no metadata table at all, which the
/// caller reports as a per-document failure.
pub fn parse_detail_page(
    html: &str,
    selectors: &DetailSelectors,
) -> Result<Option<DetailPage>, HtmlError> {
    let table_sel = selector(&selectors.table)?;
    let cell_sel = selector(&selectors.cell)?;
    let title_sel = selector(&selectors.title)?;
    let document = Html::parse_document(html);

    let Some(table) = document.select(&table_sel).next() else {
        return Ok(None);
    };

    let fields = table
        .select(&cell_sel)
        .filter_map(|td| {
            td.value()
                .attr("data-before")
                .map(|label| (label.trim().to_string(), text_of(td)))
        })
        .collect();

    let title = document.select(&title_sel).next().map(text_of);

    Ok(Some(DetailPage { fields, title }))
}
