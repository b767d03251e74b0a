use crate::analysis::AnalysisError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

const TEXT_PLACEHOLDER: &str = "{text}";

#[derive(Deserialize)]
struct PromptFile {
    prompt_template: Option<String>,
}

/// An instruction template with a `{text}` placeholder.
///
/// Doubled braces (`{{`, `}}`) render as single braces so the template can
/// show JSON examples to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Loads the `prompt_template` key of a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, AnalysisError> {
        let content = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, AnalysisError> {
        let file: PromptFile = serde_yaml::from_str(content)?;
        file.prompt_template
            .map(Self::new)
            .ok_or(AnalysisError::MissingPromptTemplate)
    }

    pub fn render(&self, text: &str) -> String {
        self.template
            .split(TEXT_PLACEHOLDER)
            .map(|part| part.replace("{{", "{").replace("}}", "}"))
            .collect::<Vec<_>>()
            .join(text)
    }
}
