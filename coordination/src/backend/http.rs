//! OpenAI-compatible chat-completions adapter
//!
//! Every backend id is sent as the `model` field. Requests go to the shared
//! endpoint unless the backend has a URL override (e.g. a local Ollama
//! server for small models and a proxy for hosted ones).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::task::TaskContext;

use super::{BackendAdapter, BackendError, BackendResponse, BackendResult};

/// Endpoint settings for [`HttpBackend`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpBackendConfig {
    /// Chat-completions URL used when no override matches
    pub url: String,
    /// Per-backend URL overrides
    pub backend_urls: BTreeMap<String, String>,
    /// Bearer token, if the endpoint needs one
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: Option<String>,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/v1/chat/completions".to_string(),
            backend_urls: BTreeMap::new(),
            api_key: None,
            request_timeout_secs: 120,
            max_tokens: 2048,
            temperature: 0.3,
            system_prompt: None,
        }
    }
}

impl HttpBackendConfig {
    pub fn url_for(&self, backend_id: &str) -> &str {
        self.backend_urls
            .get(backend_id)
            .map(String::as_str)
            .unwrap_or(&self.url)
    }
}

/// Adapter over an OpenAI-compatible HTTP endpoint
pub struct HttpBackend {
    http: reqwest::Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    async fn complete(&self, query: &str, backend_id: &str, context: &TaskContext) -> BackendResult<String> {
        #[derive(Serialize)]
        struct ChatMessage<'a> {
            role: &'static str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            max_tokens: u32,
            temperature: f32,
            stream: bool,
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
            reasoning_content: Option<String>,
        }

        let system_prompt = context
            .get("system_prompt")
            .and_then(|v| v.as_str())
            .or(self.config.system_prompt.as_deref());

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: query,
        });

        let request = ChatRequest {
            model: backend_id,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        let url = self.config.url_for(backend_id);
        debug!(backend = %backend_id, url = %url, "Sending chat completion");

        let mut builder = self.http.post(url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                backend: backend_id.to_string(),
                status,
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        let message = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| BackendError::EmptyResponse(backend_id.to_string()))?;

        // Reasoning models sometimes put the whole answer in reasoning_content
        match (message.content, message.reasoning_content) {
            (Some(content), _) if !content.trim().is_empty() => Ok(content),
            (_, Some(reasoning)) if !reasoning.trim().is_empty() => Ok(reasoning),
            _ => Err(BackendError::EmptyResponse(backend_id.to_string())),
        }
    }
}

#[async_trait]
impl BackendAdapter for HttpBackend {
    async fn execute(
        &self,
        query: &str,
        backend_id: &str,
        context: &TaskContext,
    ) -> BackendResult<BackendResponse> {
        let start = Instant::now();
        let outcome = self.complete(query, backend_id, context).await;
        let elapsed = start.elapsed().as_secs_f64();
        Ok(match outcome {
            Ok(text) => BackendResponse::success(backend_id, text, elapsed),
            Err(e) => BackendResponse::failure(backend_id, e.to_string(), elapsed),
        })
    }
}
