//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RETRIEVAL__TOP_K=6`). Every field has a default,
//! so a missing config file yields a runnable setup.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Build from an explicit figment; defaults are layered underneath.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the full settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub segmenter: SegmenterSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub index_dir: String,
    pub index_name: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { index_dir: "indexes".to_string(), index_name: "faiss_index".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self { chunk_size: 10_000, chunk_overlap: 1_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Remote,
    Fake,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Remote,
            model: "text-embedding-004".to_string(),
            base_url: GEMINI_OPENAI_BASE_URL.to_string(),
            api_key: None,
            api_key_env: "GOOGLE_API_KEY".to_string(),
            dimension: 768,
            batch_size: 100,
            concurrency: 4,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_api_key(self.api_key.as_deref(), &self.api_key_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
    /// Overrides the built-in prompt; must contain `{context}` and `{question}`.
    pub prompt_template: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Remote,
            model: "gemini-1.5-flash".to_string(),
            base_url: GEMINI_OPENAI_BASE_URL.to_string(),
            api_key: None,
            api_key_env: "GOOGLE_API_KEY".to_string(),
            temperature: 0.3,
            max_tokens: None,
            timeout_secs: 60,
            prompt_template: None,
        }
    }
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_api_key(self.api_key.as_deref(), &self.api_key_env)
    }
}

pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let s = &self.segmenter;
        if s.chunk_size == 0 || s.chunk_overlap >= s.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "segmenter.chunk_size ({}) must be greater than segmenter.chunk_overlap ({})",
                s.chunk_size, s.chunk_overlap
            )));
        }
        if self.retrieval.top_k == 0 { return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into())); }
        let e = &self.embedding;
        if e.dimension == 0 { return Err(Error::InvalidConfig("embedding.dimension must be at least 1".into())); }
        if e.batch_size == 0 { return Err(Error::InvalidConfig("embedding.batch_size must be at least 1".into())); }
        if e.concurrency == 0 { return Err(Error::InvalidConfig("embedding.concurrency must be at least 1".into())); }
        if let Some(template) = &self.generation.prompt_template {
            if !template.contains("{context}") || !template.contains("{question}") {
                return Err(Error::InvalidConfig("generation.prompt_template must contain {context} and {question}".into()));
            }
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(Error::InvalidConfig(format!("generation.temperature {} is outside 0.0..=2.0", self.generation.temperature)));
        }
        Ok(())
    }

    /// Index directory after `~`/`$VAR` expansion, relative paths resolved against `base`.
    pub fn index_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.data.index_dir)
    }
}

fn resolve_api_key(inline: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(key) = inline.filter(|k| !k.is_empty()) { return Ok(key.to_string()); }
    env::var(env_var)
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::InvalidConfig(format!("no API key configured; set {} or api_key", env_var)))
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
