//! Prompt assembly and the language model call that produces the final answer.
use std::time::Duration;

use docqa_core::config::GenerationSettings;
use docqa_core::service::{with_timeout, ServiceKind};
use docqa_core::traits::LanguageModel;
use docqa_core::types::{AnswerRequest, AnswerResponse, SamplingParams};
use docqa_core::Result;

/// Instruction + `{context}` + `{question}`. The headers match what `ExtractiveModel` parses.
pub const DEFAULT_TEMPLATE: &str = concat!(
    "Answer the question as detailed as possible from the provided context. ",
    "If the answer is not in the provided context, say that it is not available in the context.\n\n",
    "Context:\n{context}\n\n",
    "Question:\n{question}\n\n",
    "Answer:"
);

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

pub struct AnswerSynthesizer {
    template: String,
    params: SamplingParams,
    timeout: Option<Duration>,
}

impl Default for AnswerSynthesizer {
    fn default() -> Self {
        Self { template: DEFAULT_TEMPLATE.to_string(), params: SamplingParams::default(), timeout: None }
    }
}

impl AnswerSynthesizer {
    pub fn from_settings(settings: &GenerationSettings) -> Self {
        Self {
            template: settings.prompt_template.clone().unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            params: SamplingParams { temperature: settings.temperature, max_tokens: settings.max_tokens },
            timeout: Some(settings.timeout()),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_deadline(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn params(&self) -> &SamplingParams { &self.params }

    /// Fill the template; context passages are separated by a blank line.
    ///
    /// Placeholders are substituted in a single pass, so braces inside the passages or the
    /// question are left alone.
    pub fn format_prompt(&self, request: &AnswerRequest) -> String {
        let context = request.context.join("\n\n");
        let mut out = String::with_capacity(self.template.len() + context.len() + request.question.len());
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
                out.push_str(&context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_SLOT) {
                out.push_str(&request.question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }

    /// Ask `model` to answer from the given context. The model's output is returned verbatim,
    /// and an empty context still reaches the model.
    pub async fn synthesize(&self, request: &AnswerRequest, model: &dyn LanguageModel) -> Result<AnswerResponse> {
        let prompt = self.format_prompt(request);
        tracing::debug!(passages = request.context.len(), prompt_chars = prompt.chars().count(), model = model.model_id(), "generating answer");
        let text = with_timeout(ServiceKind::Generation, self.timeout, model.generate(&prompt, &self.params)).await?;
        Ok(AnswerResponse { text })
    }
}
