use anyhow::Result;
use async_trait::async_trait;
use handelingen::errors::PromptError;
use handelingen::providers::ai::AiProvider;
use handelingen::{Kamer, Layout, MetadataRecord};
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// --- Test Setup ---

/// An isolated data directory that is removed when dropped.
pub struct TestLayout {
    pub dir: TempDir,
    pub layout: Layout,
}

impl TestLayout {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let layout = Layout::new(dir.path());
        Ok(Self { dir, layout })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Places a downloaded document for `group` on disk.
    pub fn write_document(&self, group: &str, id: &str, content: &str) -> Result<()> {
        let path = self.layout.document(group, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Writes a link list with the given ids in order.
    pub fn write_link_list(&self, group: &str, ids: &[&str]) -> Result<()> {
        let path = self.layout.link_list(group);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut content = String::from("vergaderjaar,id\n");
        for id in ids {
            content.push_str(&format!("{group},{id}\n"));
        }
        fs::write(path, content)?;
        Ok(())
    }
}

// --- Mock AI Provider ---

#[derive(Clone, Debug)]
pub struct MockAiProvider {
    responses: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockAiProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pre-programs a response for a specific prompt.
    /// The key should be a unique substring of the user prompt (the speech).
    pub fn add_response(&self, key: &str, response: &str) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(key.to_string(), response.to_string());
    }

    /// Retrieves the recorded calls for assertion.
    pub fn get_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, PromptError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((system_prompt.to_string(), user_prompt.to_string()));

        let responses = self.responses.lock().unwrap();
        for (key, response) in responses.iter() {
            if user_prompt.contains(key) {
                return Ok(response.clone());
            }
        }

        Err(PromptError::AiApi(format!(
            "MockAiProvider: No response programmed for user prompt. Got: '{user_prompt}'"
        )))
    }
}

// --- Fixtures ---

pub mod fixtures {
    use super::*;
    use chrono::NaiveDate;

    /// A metadata record for a Tweede Kamer sitting on 2023-10-05.
    pub fn metadata(name: &str) -> MetadataRecord {
        MetadataRecord {
            file: name.to_string(),
            kamer: Kamer::Tk,
            jaar: "2023-2024".to_string(),
            nr: "12".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 10, 5).unwrap(),
            document_nr: "HAN123".to_string(),
            title: "Debat over de begroting".to_string(),
        }
    }

    /// A transcript with three speeches:
    /// 0. "de Vries" (VVD via `spreker/politiek`), two paragraphs;
    /// 1. no speaker, skipped;
    /// 2. "Jansen" (party via `wie/partij`), empty text block.
    pub const TRANSCRIPT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<handeling>
  <agendapunt>
    <spreekbeurt>
      <spreker>
        <voorvoegsels>de</voorvoegsels>
        <naam><achternaam>Vries</achternaam></naam>
        <politiek>VVD</politiek>
      </spreker>
      <tekst>
        <al>Voorzitter, ik begin.</al>
        <al>   </al>
        <al>Dank u wel.</al>
      </tekst>
    </spreekbeurt>
    <spreekbeurt>
      <tekst><al>Applaus.</al></tekst>
    </spreekbeurt>
    <spreekbeurt>
      <spreker>
        <naam><achternaam>Jansen</achternaam></naam>
      </spreker>
      <wie><partij>SP</partij></wie>
      <tekst></tekst>
    </spreekbeurt>
  </agendapunt>
</handeling>
"#;

    /// A listing page with the given result hrefs and pagination up to `pages`.
    pub fn listing_html(hrefs: &[&str], pages: u32) -> String {
        let items: String = hrefs
            .iter()
            .map(|href| format!("<li><h2><a href=\"{href}\">Handelingen</a></h2></li>"))
            .collect();
        let pagination: String = (1..=pages)
            .map(|p| format!("<li><a href=\"?pagina={p}\">{p}</a></li>"))
            .collect();
        format!(
            "<html><body>\
             <div class=\"result--list result--list--publications\"><ul>{items}</ul></div>\
             <div class=\"pagination__index\"><ul>{pagination}<li><a>volgende</a></li></ul></div>\
             </body></html>"
        )
    }

    /// A detail page with a complete metadata table.
    pub fn detail_html(date: &str, organisation: &str) -> String {
        format!(
            "<html><body><h1 class=\"title\">Debat over de begroting</h1>\
             <table class=\"table--dataintro\"><tr>\
             <td data-before=\"Datum vergadering\">{date}</td>\
             <td data-before=\"Organisatie\">{organisation}</td>\
             <td data-before=\"Vergaderjaar\">2023-2024</td>\
             <td data-before=\"Vergadernummer\">12</td>\
             <td data-before=\"Documentnummer\">HAN123</td>\
             </tr></table></body></html>"
        )
    }
}
