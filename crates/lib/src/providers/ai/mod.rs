pub mod completions;

use crate::errors::PromptError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

pub use completions::{CompletionsConfig, CompletionsProvider};

/// A trait for interacting with an AI provider.
///
/// Implementations take a system prompt (the rendered instruction template)
/// and a user prompt (the text under analysis) and return the raw completion
/// text. Parsing that text is the caller's job.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, PromptError>;
}

dyn_clone::clone_trait_object!(AiProvider);
