use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use lecturebuddy_core::{
    Availability, LlmProvider, LlmRequest, LlmResponse, ProgressFn, TokenStream,
};

/// A mock provider that returns canned responses.
pub struct MockProvider {
    name: String,
    fixed_response: Option<String>,
    availability: Mutex<Availability>,
    failure: Option<String>,
    acquire_failure: Option<String>,
    acquire_delay: Duration,
    latency: Duration,
    stream_failure: Option<(usize, String)>,
    acquisitions: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed_response: None,
            availability: Mutex::new(Availability::Available),
            failure: None,
            acquire_failure: None,
            acquire_delay: Duration::ZERO,
            latency: Duration::ZERO,
            stream_failure: None,
            acquisitions: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    pub fn with_availability(self, availability: Availability) -> Self {
        self.set_availability(availability);
        self
    }

    /// Every completion and stream fails with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn failing_acquire(mut self, message: impl Into<String>) -> Self {
        self.acquire_failure = Some(message.into());
        self
    }

    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    /// Delay before every completion and before each streamed chunk.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Streams stop with `message` after `chunks` chunks.
    pub fn failing_mid_stream(mut self, chunks: usize, message: impl Into<String>) -> Self {
        self.stream_failure = Some((chunks, message.into()));
        self
    }

    pub fn set_availability(&self, availability: Availability) {
        *self.availability.lock().unwrap_or_else(|e| e.into_inner()) = availability;
    }

    /// How many times `acquire` was entered.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn response_text(&self) -> String {
        self.fixed_response
            .clone()
            .unwrap_or_else(|| "Mock response".to_string())
    }

    fn record(&self, request: &LlmRequest) -> Result<()> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        match &self.failure {
            Some(message) => anyhow::bail!("{}", message),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn availability(&self, _model: &str) -> Availability {
        *self.availability.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn acquire(&self, _model: &str, progress: Option<ProgressFn>) -> Result<()> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.set_availability(Availability::Downloading);
        if let Some(cb) = &progress {
            cb(0.5);
        }
        if !self.acquire_delay.is_zero() {
            tokio::time::sleep(self.acquire_delay).await;
        }
        if let Some(message) = &self.acquire_failure {
            self.set_availability(Availability::Downloadable);
            anyhow::bail!("{}", message);
        }
        self.set_availability(Availability::Available);
        if let Some(cb) = &progress {
            cb(1.0);
        }
        Ok(())
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.record(request)?;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(LlmResponse {
            content: self.response_text(),
            provider: self.name.clone(),
            model: request.model.clone(),
            tokens_used: 0,
            latency_ms: 0,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> Result<TokenStream> {
        self.record(request)?;
        let mut chunks: Vec<Result<String>> = self
            .response_text()
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        if let Some((after, message)) = &self.stream_failure {
            chunks.truncate(*after);
            chunks.push(Err(anyhow::anyhow!("{}", message)));
        }
        let latency = self.latency;
        if latency.is_zero() {
            return Ok(Box::pin(stream::iter(chunks)));
        }
        Ok(Box::pin(stream::iter(chunks).then(move |chunk| async move {
            tokio::time::sleep(latency).await;
            chunk
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lecturebuddy_core::{ChatRole, LlmMessage};

    #[tokio::test]
    async fn stream_reassembles_response() {
        let provider = MockProvider::new("mock").with_response("one two three");
        let request = LlmRequest::new("m").with_message(LlmMessage::new(ChatRole::User, "hi"));
        let chunks: Vec<String> = provider
            .stream(&request)
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), "one two three");
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn acquire_makes_model_available() {
        let provider = MockProvider::new("mock").with_availability(Availability::Downloadable);
        provider.acquire("m", None).await.unwrap();
        assert_eq!(provider.availability("m").await, Availability::Available);
        assert_eq!(provider.acquisitions(), 1);
    }

    #[tokio::test]
    async fn failing_provider_errors() {
        let provider = MockProvider::new("mock").failing("model crashed");
        let err = provider.complete(&LlmRequest::new("m")).await.unwrap_err();
        assert!(err.to_string().contains("model crashed"));
    }

    #[tokio::test]
    async fn stream_can_fail_after_first_chunk() {
        let provider = MockProvider::new("mock")
            .with_response("one two three")
            .failing_mid_stream(1, "connection reset");
        let chunks: Vec<Result<String>> = provider
            .stream(&LlmRequest::new("m"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_deref().unwrap(), "one ");
        assert!(chunks[1].is_err());
    }
}
