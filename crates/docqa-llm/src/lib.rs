//! docqa-llm
//!
//! Language model providers: an OpenAI-compatible chat client and an offline extractive model.
use async_trait::async_trait;
use std::sync::Arc;

use docqa_core::config::{GenerationSettings, Provider};
use docqa_core::traits::LanguageModel;
use docqa_core::types::SamplingParams;
use docqa_core::Result;

pub mod openai;

pub use openai::RemoteChatModel;

/// Header that introduces the retrieved passages in a prompt.
pub const CONTEXT_HEADER: &str = "Context:";
/// Header that introduces the user question in a prompt.
pub const QUESTION_HEADER: &str = "Question:";
pub const NOT_AVAILABLE: &str = "The answer is not available in the provided context.";

/// Offline model that answers with the first passage of the prompt's context section.
///
/// Passages are separated by blank lines between `CONTEXT_HEADER` and the last
/// `QUESTION_HEADER`. Prompts without those headers are echoed back.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveModel;

impl ExtractiveModel {
    fn answer(prompt: &str) -> String {
        let Some(start) = prompt.find(CONTEXT_HEADER) else { return prompt.trim().to_string() };
        let after = &prompt[start + CONTEXT_HEADER.len()..];
        let context = match after.rfind(QUESTION_HEADER) { Some(end) => &after[..end], None => after };
        match context.split("\n\n").map(str::trim).find(|p| !p.is_empty()) {
            Some(passage) => format!("According to the provided context: {}", passage),
            None => NOT_AVAILABLE.to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for ExtractiveModel {
    fn model_id(&self) -> &str { "extractive" }
    async fn generate(&self, prompt: &str, _params: &SamplingParams) -> Result<String> {
        Ok(Self::answer(prompt))
    }
}

/// Select the language model described by `settings`.
///
/// `APP_USE_FAKE_LLM=1` forces the `ExtractiveModel`.
pub fn get_default_language_model(settings: &GenerationSettings) -> Result<Arc<dyn LanguageModel>> {
    let use_fake = std::env::var("APP_USE_FAKE_LLM").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake || settings.provider == Provider::Fake {
        tracing::info!("using ExtractiveModel");
        return Ok(Arc::new(ExtractiveModel));
    }
    let model = RemoteChatModel::from_settings(settings)?;
    tracing::info!(model = %settings.model, base_url = %settings.base_url, "using remote chat model");
    Ok(Arc::new(model))
}
