use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use lecturebuddy_core::{
    Availability, LlmProvider, LlmRequest, LlmResponse, ProgressFn, TokenStream,
};

use crate::ndjson;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama local model server.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    pulling: Arc<Mutex<HashSet<String>>>,
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            pulling: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn is_pulling(&self, model: &str) -> bool {
        self.pulling
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(model)
    }

    async fn installed_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .context("Ollama HTTP request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Ollama returned {}", status);
        }
        let tags: OllamaTags = response
            .json()
            .await
            .context("Failed to parse Ollama model list")?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn chat_body(request: &LlmRequest, stream: bool) -> OllamaChatRequest {
        let mut messages = Vec::new();
        if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(OllamaChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
                images: Vec::new(),
            });
        }
        messages.extend(request.messages.iter().map(|m| OllamaChatMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
            images: m.images.clone(),
        }));

        OllamaChatRequest {
            model: request.model.clone(),
            messages,
            stream,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    async fn post_chat(&self, request: &LlmRequest, stream: bool) -> Result<reqwest::Response> {
        let body = Self::chat_body(request, stream);
        debug!(model = %body.model, stream, "Sending request to Ollama");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Ollama HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {}: {}", status, error_body);
        }
        Ok(response)
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// `llama3.2` matches an installed `llama3.2:latest`; tagged names must match exactly.
pub fn model_matches(installed: &str, wanted: &str) -> bool {
    if installed == wanted {
        return true;
    }
    !wanted.contains(':') && installed == format!("{wanted}:latest")
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

#[derive(Deserialize)]
struct OllamaTag {
    name: String,
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize, Deserialize)]
struct OllamaChatMessage {
    role: String,
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
    eval_count: Option<u64>,
    prompt_eval_count: Option<u64>,
}

/// One line of a streaming `/api/chat` response.
#[derive(Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaChatMessage>,
    #[serde(default)]
    error: Option<String>,
}

/// One line of a streaming `/api/pull` response.
#[derive(Deserialize, Debug, PartialEq)]
struct OllamaPullStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaPullStatus {
    fn fraction(&self) -> Option<f32> {
        match (self.completed, self.total) {
            (Some(done), Some(total)) if total > 0 => Some((done as f32 / total as f32).min(1.0)),
            _ => None,
        }
    }
}

/// Removes the model from the in-flight set however the pull ends.
struct PullGuard {
    pulling: Arc<Mutex<HashSet<String>>>,
    model: String,
}

impl Drop for PullGuard {
    fn drop(&mut self) {
        self.pulling
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.model);
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn availability(&self, model: &str) -> Availability {
        if self.is_pulling(model) {
            return Availability::Downloading;
        }
        match self.installed_models().await {
            Ok(models) if models.iter().any(|m| model_matches(m, model)) => Availability::Available,
            Ok(_) => Availability::Downloadable,
            Err(e) => {
                debug!(error = %e, "Ollama unreachable");
                Availability::Unavailable
            }
        }
    }

    async fn acquire(&self, model: &str, progress: Option<ProgressFn>) -> Result<()> {
        {
            let mut pulling = self.pulling.lock().unwrap_or_else(|e| e.into_inner());
            if !pulling.insert(model.to_string()) {
                anyhow::bail!("Model {} is already being downloaded", model);
            }
        }
        let _guard = PullGuard {
            pulling: self.pulling.clone(),
            model: model.to_string(),
        };

        info!(model, "Pulling model from Ollama");
        let response = self
            .client
            .post(format!("{}/api/pull", self.base_url))
            .json(&serde_json::json!({ "model": model, "stream": true }))
            .send()
            .await
            .context("Ollama pull request failed")?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {}: {}", status, error_body);
        }

        let mut updates = Box::pin(ndjson::decode::<OllamaPullStatus, _, _, _>(Box::pin(
            response.bytes_stream(),
        )));
        let mut succeeded = false;
        while let Some(update) = updates.next().await {
            let update = update?;
            if let Some(error) = update.error {
                anyhow::bail!("Ollama pull failed: {}", error);
            }
            if let (Some(cb), Some(fraction)) = (&progress, update.fraction()) {
                cb(fraction);
            }
            if update.status == "success" {
                succeeded = true;
            }
        }
        if !succeeded {
            warn!(model, "Ollama pull stream ended without success status");
            anyhow::bail!("Model download for {} did not complete", model);
        }
        if let Some(cb) = &progress {
            cb(1.0);
        }
        info!(model, "Model pulled");
        Ok(())
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let start = Instant::now();
        let response = self.post_chat(request, false).await?;

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        let tokens_used = chat_response.eval_count.unwrap_or(0)
            + chat_response.prompt_eval_count.unwrap_or(0);

        Ok(LlmResponse {
            content: chat_response.message.content,
            provider: "ollama".to_string(),
            model: request.model.clone(),
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> Result<TokenStream> {
        let response = self.post_chat(request, true).await?;
        let chunks = ndjson::decode::<OllamaChatChunk, _, _, _>(Box::pin(response.bytes_stream()))
            .filter_map(|chunk| async move {
                match chunk {
                    Err(e) => Some(Err(e)),
                    Ok(OllamaChatChunk {
                        error: Some(error), ..
                    }) => Some(Err(anyhow::anyhow!("Ollama stream error: {}", error))),
                    Ok(OllamaChatChunk {
                        message: Some(message),
                        ..
                    }) if !message.content.is_empty() => Some(Ok(message.content)),
                    Ok(_) => None,
                }
            });
        Ok(Box::pin(chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lecturebuddy_core::{ChatRole, ImagePayload, LlmMessage};

    #[test]
    fn untagged_model_matches_latest() {
        assert!(model_matches("llama3.2:latest", "llama3.2"));
        assert!(model_matches("llava:7b", "llava:7b"));
        assert!(!model_matches("llava:13b", "llava:7b"));
        assert!(!model_matches("llama3.2:1b", "llama3.2"));
    }

    #[test]
    fn chat_body_carries_system_and_images() {
        let image = ImagePayload::new("image/png", vec![9, 9]);
        let request = LlmRequest::new("llava")
            .with_system_prompt("explain slides")
            .with_message(LlmMessage::new(ChatRole::User, "what is this?").with_image(&image));
        let body = serde_json::to_value(OllamaProvider::chat_body(&request, true)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["images"][0], image.to_base64());
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn images_omitted_when_absent() {
        let request = LlmRequest::new("llama3.2")
            .with_message(LlmMessage::new(ChatRole::User, "hi"));
        let body = serde_json::to_value(OllamaProvider::chat_body(&request, false)).unwrap();
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert!(body["messages"][0].get("images").is_none());
    }

    #[test]
    fn pull_progress_fraction() {
        let status: OllamaPullStatus = serde_json::from_str(
            r#"{"status":"pulling abc","digest":"abc","total":200,"completed":50}"#,
        )
        .unwrap();
        assert_eq!(status.fraction(), Some(0.25));
        let status: OllamaPullStatus = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert_eq!(status.fraction(), None);
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let provider = OllamaProvider::new().with_base_url("http://127.0.0.1:9");
        assert_eq!(provider.availability("llama3.2").await, Availability::Unavailable);
    }
}
