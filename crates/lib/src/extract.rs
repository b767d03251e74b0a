//! # Document Extractor
//!
//! Turns one transcript XML document into speech records joined with the
//! document's metadata.

use crate::constants::SPEECH_CATEGORY;
use crate::types::{MetadataRecord, SpeechRecord};
use roxmltree::{Document, Node, ParsingOptions};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document {document} is not well-formed XML: {reason}")]
    MalformedInput { document: String, reason: String },
    #[error("No metadata found for {document}")]
    MissingMetadata { document: String },
}

/// Element names of the transcript markup.
mod tags {
    pub const SPEECH: &str = "spreekbeurt";
    pub const SPEAKER: &str = "spreker";
    pub const PREFIXES: &str = "voorvoegsels";
    pub const SURNAME: &str = "achternaam";
    pub const PARTY: &str = "politiek";
    pub const WHO: &str = "wie";
    pub const PARTY_FALLBACK: &str = "partij";
    pub const TEXT: &str = "tekst";
    pub const PARAGRAPH: &str = "al";
}

#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    base_url: String,
}

impl DocumentExtractor {
    /// `base_url` is used to build the `url` and `meta_url` columns.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Extracts every speech in `raw`.
    ///
    /// `position` is the index of the speech element among all speech
    /// elements of the document. Speeches without a speaker are dropped but
    /// still consume a position, so keys stay stable across runs.
    pub fn parse(
        &self,
        raw: &str,
        document_name: &str,
        metadata: Option<&MetadataRecord>,
    ) -> Result<Vec<SpeechRecord>, DocumentError> {
        let Some(meta) = metadata else {
            return Err(DocumentError::MissingMetadata {
                document: document_name.to_string(),
            });
        };

        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(raw, options).map_err(|e| {
            DocumentError::MalformedInput {
                document: document_name.to_string(),
                reason: e.to_string(),
            }
        })?;

        let records = doc
            .descendants()
            .filter(|n| is(n, tags::SPEECH))
            .enumerate()
            .filter_map(|(position, speech)| {
                let speaker = child(speech, tags::SPEAKER)?;
                Some(SpeechRecord {
                    file_id: document_name.to_string(),
                    position,
                    speaker_name: speaker_name(speaker),
                    speaker_party: party(speech),
                    speech_text: speech_text(speech),
                    jaar: meta.jaar.clone(),
                    date: meta.date,
                    kamer: meta.kamer,
                    category: SPEECH_CATEGORY.to_string(),
                    title: meta.title.clone(),
                    document_number: meta.document_nr.clone(),
                    url: format!("{}/{document_name}.html", self.base_url),
                    meta_url: format!("{}/{document_name}.xml", self.base_url),
                    vergadernummer: meta.nr.clone(),
                })
            })
            .collect();
        Ok(records)
    }
}

fn is(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| is(n, name))
}

fn descendant<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.descendants().skip(1).find(|n| is(n, name))
}

fn text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn speaker_name(speaker: Node<'_, '_>) -> String {
    let prefixes = child(speaker, tags::PREFIXES).map(text).unwrap_or_default();
    let surname = descendant(speaker, tags::SURNAME).map(text).unwrap_or_default();
    format!("{prefixes} {surname}").trim().to_string()
}

/// `spreker/politiek` first, then `wie/partij`. Blank values fall through.
fn party(speech: Node<'_, '_>) -> Option<String> {
    let nested = |outer: &str, inner: &str| {
        speech
            .descendants()
            .filter(|n| is(n, outer))
            .filter_map(|n| child(n, inner))
            .map(text)
            .find(|value| !value.is_empty())
    };
    nested(tags::SPEAKER, tags::PARTY).or_else(|| nested(tags::WHO, tags::PARTY_FALLBACK))
}

fn speech_text(speech: Node<'_, '_>) -> String {
    let in_text_block = |node: &Node<'_, '_>| {
        node.ancestors()
            .skip(1)
            .take_while(|a| a.id() != speech.id())
            .any(|a| is(&a, tags::TEXT))
    };
    speech
        .descendants()
        .filter(|n| is(n, tags::PARAGRAPH) && in_text_block(n))
        .map(text)
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
