use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use futures::StreamExt;
use lecturebuddy_core::{BuddyError, Capability, Notifier, SummaryOptions, Summarizer};
use lecturebuddy_workflow::{Liveness, WorkflowStore};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Summarizes the optimized lecture text.
pub struct SummarizerTool {
    store: Arc<WorkflowStore>,
    summarizer: Arc<dyn Summarizer>,
    notifier: Notifier,
    options: Mutex<SummaryOptions>,
    summary: watch::Sender<String>,
    busy: AtomicBool,
    liveness: Liveness,
}

impl SummarizerTool {
    pub fn new(store: Arc<WorkflowStore>, summarizer: Arc<dyn Summarizer>, notifier: Notifier) -> Self {
        let (summary, _) = watch::channel(String::new());
        Self {
            store,
            summarizer,
            notifier,
            options: Mutex::new(SummaryOptions::default()),
            summary,
            busy: AtomicBool::new(false),
            liveness: Liveness::new(),
        }
    }

    pub fn options(&self) -> SummaryOptions {
        *self.options.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_options(&self, options: SummaryOptions) {
        *self.options.lock().unwrap_or_else(|e| e.into_inner()) = options;
    }

    pub fn summary(&self) -> String {
        self.summary.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.summary.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Drop the current summary. Options are kept; a summary still
    /// streaming is discarded.
    pub fn clear(&self) {
        self.liveness.invalidate();
        self.summary.send_replace(String::new());
    }

    /// Stream a summary of the processed text with the current options.
    pub async fn summarize(&self) -> Result<String, BuddyError> {
        let Some(text) = self
            .store
            .with_state(|s| s.processed_text().map(str::to_string))
            .filter(|t| !t.is_empty())
        else {
            self.notifier.error("No text to summarize", "Process some input first");
            return Err(BuddyError::OperationFailed {
                operation: "summarize".into(),
                message: "no text to summarize".into(),
            });
        };
        if !self.summarizer.availability().await.is_ready() {
            self.notifier
                .error("Summarizer is not available", "Wait for the model to finish downloading");
            return Err(BuddyError::CapabilityUnavailable {
                capability: Capability::Summarizer,
            });
        }
        if self.busy.swap(true, Ordering::SeqCst) {
            return Ok(self.summary());
        }

        let ticket = self.liveness.begin();
        let options = self.options();
        let previous = self.summary.send_replace(String::new());
        let had_changes = self.store.with_state(|s| s.has_tools_changes);
        self.store.set_tools_changes(true);

        let result = self.stream_summary(&text, &options, ticket).await;
        self.busy.store(false, Ordering::SeqCst);
        if !self.liveness.is_current(ticket) {
            debug!("Summary was cleared, discarding result");
            return Err(BuddyError::OperationFailed {
                operation: "summarize".into(),
                message: "summary discarded".into(),
            });
        }
        match result {
            Ok(summary) => {
                info!(kind = ?options.kind, length = ?options.length, chars = summary.len(), "Summary generated");
                self.notifier.success("Summary generated");
                Ok(summary)
            }
            Err(e) => {
                warn!(error = %e, "Summarization failed");
                self.summary.send_replace(previous);
                self.store.set_tools_changes(had_changes);
                self.notifier.error("Summarization failed", e.to_string());
                Err(BuddyError::OperationFailed {
                    operation: "summarize".into(),
                    message: e.to_string(),
                })
            }
        }
    }

    async fn stream_summary(
        &self,
        text: &str,
        options: &SummaryOptions,
        ticket: u64,
    ) -> anyhow::Result<String> {
        let mut stream = self.summarizer.summarize_stream(text, options).await?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let applied = self.summary.send_if_modified(|summary| {
                if !self.liveness.is_current(ticket) {
                    return false;
                }
                summary.push_str(&chunk);
                true
            });
            if !applied {
                break;
            }
        }
        Ok(self.summary())
    }

    /// Write the summary into `dir` as `summary.md` or `summary.txt`.
    pub async fn export(&self, dir: &Path) -> Result<PathBuf, BuddyError> {
        let summary = self.summary();
        if summary.is_empty() {
            return Err(BuddyError::OperationFailed {
                operation: "export".into(),
                message: "no summary to export".into(),
            });
        }
        let path = dir.join(self.options().format.file_name());
        tokio::fs::write(&path, summary.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Summary exported");
        self.notifier.success("Downloaded");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lecturebuddy_core::{Availability, InputData, OptimizedData, SummaryFormat, SummaryType};
    use lecturebuddy_models::{LlmSummarizer, MockProvider};
    use std::time::Duration;

    fn tool(provider: MockProvider) -> (Arc<WorkflowStore>, Arc<MockProvider>, SummarizerTool) {
        let store = Arc::new(WorkflowStore::in_memory());
        let provider = Arc::new(provider);
        let summarizer = Arc::new(LlmSummarizer::new(provider.clone(), "llama3.2"));
        let tool = SummarizerTool::new(store.clone(), summarizer, Notifier::silent());
        (store, provider, tool)
    }

    fn optimize(store: &WorkflowStore, text: &str) {
        let input = InputData::text(text);
        store.set_input(input.clone());
        store.set_optimized_data(Some(OptimizedData::passthrough(&input)));
    }

    #[tokio::test]
    async fn streams_summary_and_marks_changes() {
        let (store, provider, tool) =
            tool(MockProvider::new("mock").with_response("- Entropy never decreases"));
        optimize(&store, "The second law of thermodynamics ...");
        tool.set_options(SummaryOptions {
            kind: SummaryType::Tldr,
            ..SummaryOptions::default()
        });

        let summary = tool.summarize().await.unwrap();
        assert_eq!(summary, "- Entropy never decreases");
        assert_eq!(tool.summary(), summary);
        assert!(store.snapshot().has_tools_changes);
        assert!(!tool.is_busy());
        assert_eq!(provider.requests().len(), 1);

        tool.clear();
        assert!(tool.summary().is_empty());
        assert_eq!(tool.options().kind, SummaryType::Tldr);
    }

    #[tokio::test]
    async fn missing_text_is_reported() {
        let store = Arc::new(WorkflowStore::in_memory());
        let (notifier, mut rx) = Notifier::channel();
        let provider = Arc::new(MockProvider::new("mock"));
        let tool = SummarizerTool::new(store, Arc::new(LlmSummarizer::new(provider, "m")), notifier);
        assert!(tool.summarize().await.is_err());
        assert_eq!(rx.recv().await.unwrap().title, "No text to summarize");
    }

    #[tokio::test]
    async fn unavailable_summarizer_is_reported() {
        let (store, provider, tool) =
            tool(MockProvider::new("mock").with_availability(Availability::Downloadable));
        optimize(&store, "notes");
        let err = tool.summarize().await.unwrap_err();
        assert!(matches!(
            err,
            BuddyError::CapabilityUnavailable { capability: Capability::Summarizer }
        ));
        assert!(provider.requests().is_empty());
        assert!(!store.snapshot().has_tools_changes);
    }

    #[tokio::test]
    async fn failure_mid_stream_rolls_back() {
        let store = Arc::new(WorkflowStore::in_memory());
        let (notifier, mut rx) = Notifier::channel();
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_response("Entropy never decreases")
                .failing_mid_stream(1, "connection reset"),
        );
        let tool = SummarizerTool::new(
            store.clone(),
            Arc::new(LlmSummarizer::new(provider, "llama3.2")),
            notifier,
        );
        optimize(&store, "notes");

        assert!(tool.summarize().await.is_err());
        assert!(tool.summary().is_empty());
        assert!(!store.snapshot().has_tools_changes);
        assert!(!tool.is_busy());
        assert_eq!(rx.recv().await.unwrap().title, "Summarization failed");
    }

    #[tokio::test]
    async fn failure_keeps_earlier_changes_marked() {
        let (store, _provider, tool) = tool(MockProvider::new("mock").failing("boom"));
        optimize(&store, "notes");
        store.set_tools_changes(true);
        assert!(tool.summarize().await.is_err());
        assert!(store.snapshot().has_tools_changes);
    }

    #[tokio::test(start_paused = true)]
    async fn summary_finishing_after_clear_is_discarded() {
        let provider = MockProvider::new("mock")
            .with_response("A long and slow summary")
            .with_latency(Duration::from_millis(500));
        let (store, _provider, tool) = tool(provider);
        optimize(&store, "notes");
        let tool = Arc::new(tool);

        let pending = tokio::spawn({
            let tool = tool.clone();
            async move { tool.summarize().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(tool.is_busy());

        tool.clear();
        store.set_tools_changes(false);

        assert!(pending.await.unwrap().is_err());
        assert!(tool.summary().is_empty());
        assert!(!store.snapshot().has_tools_changes);
        assert!(!tool.is_busy());
    }

    #[tokio::test]
    async fn export_uses_format_file_name() {
        let (store, _provider, tool) = tool(MockProvider::new("mock").with_response("Short summary"));
        optimize(&store, "notes");
        let dir = tempfile::tempdir().unwrap();
        assert!(tool.export(dir.path()).await.is_err());

        tool.summarize().await.unwrap();
        tool.set_options(SummaryOptions {
            format: SummaryFormat::PlainText,
            ..tool.options()
        });
        let path = tool.export(dir.path()).await.unwrap();
        assert!(path.ends_with("summary.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Short summary");
    }
}
