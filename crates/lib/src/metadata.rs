//! Converts a scraped detail page into a [`MetadataRecord`].

use crate::types::{Kamer, MetadataRecord};
use chrono::NaiveDate;
use handelingen_html::DetailPage;
use thiserror::Error;

pub const FIELD_DATE: &str = "Datum vergadering";
pub const FIELD_ORGANISATION: &str = "Organisatie";
pub const FIELD_SESSION_YEAR: &str = "Vergaderjaar";
pub const FIELD_MEETING_NUMBER: &str = "Vergadernummer";
pub const FIELD_DOCUMENT_NUMBER: &str = "Documentnummer";

/// Date format used on the detail page.
pub const DETAIL_DATE_FORMAT: &str = "%d-%m-%Y";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Metadata table not found")]
    TableNotFound,
    #[error("Missing field '{0}'")]
    MissingField(&'static str),
    #[error("Invalid date '{0}'")]
    InvalidDate(String),
    #[error("Unknown organisation '{0}'")]
    UnknownOrganisation(String),
}

/// Builds the record for `name` from its detail page.
///
/// Document number and title are optional and default to empty strings.
pub fn metadata_from_page(name: &str, page: &DetailPage) -> Result<MetadataRecord, MetadataError> {
    let required = |label: &'static str| page.field(label).ok_or(MetadataError::MissingField(label));

    let raw_date = required(FIELD_DATE)?;
    let date = NaiveDate::parse_from_str(raw_date, DETAIL_DATE_FORMAT)
        .map_err(|_| MetadataError::InvalidDate(raw_date.to_string()))?;

    let organisation = required(FIELD_ORGANISATION)?;
    let kamer = Kamer::from_organisation(organisation)
        .ok_or_else(|| MetadataError::UnknownOrganisation(organisation.to_string()))?;

    Ok(MetadataRecord {
        file: name.to_string(),
        kamer,
        jaar: required(FIELD_SESSION_YEAR)?.to_string(),
        nr: required(FIELD_MEETING_NUMBER)?.to_string(),
        date,
        document_nr: page.field(FIELD_DOCUMENT_NUMBER).unwrap_or_default().to_string(),
        title: page.title.clone().unwrap_or_default(),
    })
}
