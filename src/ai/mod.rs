//! LLM capability layer
//!
//! `CapabilityProvider` is the one entry point agents use for completions.
//! It bounds concurrency with a semaphore, caches responses with a TTL, and
//! never surfaces provider errors to callers: text completions degrade to an
//! empty string, structured completions to `None`. An unset API key leaves
//! the provider in an unconfigured state where every call degrades.

pub mod anthropic_client;

pub use anthropic_client::{AnthropicClient, ProviderError};

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::Credentials;

/// Cache entry expiration (10 minutes)
const CACHE_EXPIRY_SECS: u64 = 600;
/// Sweep threshold for the response cache
const CACHE_MAX_ENTRIES: usize = 256;
/// Maximum in-flight provider calls
const MAX_CONCURRENT_CALLS: usize = 4;

/// Model selector. `Fast` serves the rule-adjacent extraction prompts,
/// `Reasoning` the holistic/vision ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Fast,
    Reasoning,
}

impl Model {
    pub fn id(&self) -> &'static str {
        match self {
            Model::Fast => "claude-3-5-haiku-20241022",
            Model::Reasoning => "claude-sonnet-4-5-20250929",
        }
    }
}

/// One completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub image_base64: Option<String>,
    pub model: Model,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            image_base64: None,
            model: Model::Fast,
            temperature: 0.0,
            max_tokens: 1024,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_image(mut self, base64_png: impl Into<String>) -> Self {
        self.image_base64 = Some(base64_png.into());
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Cache key over everything that affects the completion. Images are
    /// hashed rather than embedded to keep keys small.
    fn cache_key(&self, shape: &str) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.prompt.hash(&mut hasher);
        if let Some(system) = &self.system {
            system.hash(&mut hasher);
        }
        if let Some(image) = &self.image_base64 {
            image.hash(&mut hasher);
        }
        format!(
            "{}|{:.2}|{}|{}|{:x}",
            self.model.id(),
            self.temperature,
            self.max_tokens,
            shape,
            hasher.finish()
        )
    }
}

struct CachedCompletion {
    body: String,
    cached_at: u64,
}

/// Injected capability handle shared by all agents
pub struct CapabilityProvider {
    client: Option<AnthropicClient>,
    semaphore: Semaphore,
    cache: Mutex<HashMap<String, CachedCompletion>>,
}

impl CapabilityProvider {
    pub fn new(credentials: &Credentials) -> Self {
        let client = credentials
            .anthropic_api_key
            .as_deref()
            .and_then(|key| match AnthropicClient::new(key) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!("Failed to build Anthropic client: {}", e);
                    None
                }
            });

        Self {
            client,
            semaphore: Semaphore::new(MAX_CONCURRENT_CALLS),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Provider without a backing client; every call degrades. Used when no
    /// API key is configured, and in tests.
    pub fn unconfigured() -> Self {
        Self {
            client: None,
            semaphore: Semaphore::new(MAX_CONCURRENT_CALLS),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Free-text completion. Degrades to an empty string on any failure.
    pub async fn complete_text(&self, request: &ChatRequest) -> String {
        self.complete_raw(request, "text").await.unwrap_or_default()
    }

    /// Structured completion: extracts the first JSON object from the
    /// response and deserializes it. `None` on any failure, including
    /// unparseable model output. The caller's system prompt describes the
    /// expected fields; a bare-JSON instruction is appended here.
    pub async fn complete_structured<T: DeserializeOwned>(
        &self,
        request: &ChatRequest,
    ) -> Option<T> {
        let mut request = request.clone();
        let json_instruction =
            "Respond ONLY with a valid JSON object containing the requested fields. \
             No markdown, no prose outside the object.";
        request.system = Some(match request.system.take() {
            Some(system) => format!("{}\n\n{}", system, json_instruction),
            None => json_instruction.to_string(),
        });

        let raw = self
            .complete_raw(&request, std::any::type_name::<T>())
            .await?;
        let json = extract_json(&raw)?;
        match serde_json::from_str::<T>(&json) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Structured completion did not match expected shape: {}", e);
                None
            }
        }
    }

    async fn complete_raw(&self, request: &ChatRequest, shape: &str) -> Option<String> {
        let client = self.client.as_ref()?;
        let key = request.cache_key(shape);

        if let Some(cached) = self.cache_lookup(&key) {
            debug!("Using cached completion");
            return Some(cached);
        }

        let _permit = self.semaphore.acquire().await.ok()?;

        match client.complete(request).await {
            Ok(text) => {
                self.cache_store(&key, &text);
                Some(text)
            }
            Err(e) => {
                warn!("Provider call failed: {}", e);
                None
            }
        }
    }

    fn cache_lookup(&self, key: &str) -> Option<String> {
        let cache = self.cache.lock().ok()?;
        let entry = cache.get(key)?;
        if now_secs().saturating_sub(entry.cached_at) < CACHE_EXPIRY_SECS {
            Some(entry.body.clone())
        } else {
            None
        }
    }

    fn cache_store(&self, key: &str, body: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                key.to_string(),
                CachedCompletion {
                    body: body.to_string(),
                    cached_at: now_secs(),
                },
            );

            // Sweep expired entries once the cache grows past its bound
            if cache.len() > CACHE_MAX_ENTRIES {
                let now = now_secs();
                cache.retain(|_, v| now.saturating_sub(v.cached_at) < CACHE_EXPIRY_SECS);
            }
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Extract a JSON object from model output. Handles markdown code fences
/// and leading/trailing prose around the object.
pub fn extract_json(text: &str) -> Option<String> {
    // Markdown code blocks first
    if let Some(start) = text.find("```json") {
        let inner = &text[start + 7..];
        if let Some(end) = inner.find("```") {
            return Some(inner[..end].trim().to_string());
        }
    }
    if let Some(start) = text.find("```") {
        let inner = &text[start + 3..];
        if let Some(end) = inner.find("```") {
            let candidate = inner[..end].trim();
            if candidate.starts_with('{') {
                return Some(candidate.to_string());
            }
        }
    }

    // Balanced-brace scan for a bare object
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_extract_json_from_fence() {
        let text = "Here you go:\n```json\n{\"score\": 42}\n```\nDone.";
        assert_eq!(extract_json(text).unwrap(), r#"{"score": 42}"#);
    }

    #[test]
    fn test_extract_json_bare_object_with_prose() {
        let text = r#"The answer is {"a": {"b": "c}"}, "d": 1} as requested"#;
        assert_eq!(extract_json(text).unwrap(), r#"{"a": {"b": "c}"}, "d": 1}"#);
    }

    #[test]
    fn test_extract_json_none_when_absent() {
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn test_cache_key_distinguishes_shape_and_model() {
        let req = ChatRequest::new("hello");
        let a = req.cache_key("text");
        let b = req.cache_key("Verdict");
        assert_ne!(a, b);

        let reasoning = ChatRequest::new("hello").with_model(Model::Reasoning);
        assert_ne!(req.cache_key("text"), reasoning.cache_key("text"));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_degrades() {
        #[derive(Deserialize)]
        struct Shape {
            #[allow(dead_code)]
            score: i32,
        }

        let provider = CapabilityProvider::unconfigured();
        assert!(!provider.is_configured());

        let req = ChatRequest::new("anything");
        assert_eq!(provider.complete_text(&req).await, "");
        assert!(provider.complete_structured::<Shape>(&req).await.is_none());
    }
}
