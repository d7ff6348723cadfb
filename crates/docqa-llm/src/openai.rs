//! Chat model backed by an OpenAI-compatible `/chat/completions` endpoint.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docqa_core::config::GenerationSettings;
use docqa_core::traits::LanguageModel;
use docqa_core::types::SamplingParams;
use docqa_core::{Error, Result};

pub struct RemoteChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl RemoteChatModel {
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let api_key = settings.resolve_api_key()?;
        Self::new(&settings.base_url, &settings.model, &api_key, settings.timeout())
    }
}

#[async_trait]
impl LanguageModel for RemoteChatModel {
    fn model_id(&self) -> &str { &self.model }

    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::GenerationService(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| Error::GenerationService(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::GenerationService(format!("HTTP {}: {}", status, body)));
        }
        parse_completion(&body)
    }
}

pub(crate) fn parse_completion(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| Error::GenerationService(format!("invalid response: {}", e)))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::GenerationService("response contained no message content".to_string()))
}
