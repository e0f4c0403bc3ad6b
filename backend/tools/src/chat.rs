//! Chat about the lecture material.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use lecturebuddy_core::{
    BuddyError, Capability, ChatMessage, ChatRole, ContextMode, ImagePayload, InputData,
    LlmMessage, LlmProvider, LlmRequest, Notifier,
};
use lecturebuddy_workflow::{Liveness, WorkflowStore};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which models answer chat turns.
#[derive(Debug, Clone)]
pub struct ChatModels {
    pub text: String,
    /// Used whenever an image is attached to the turn.
    pub vision: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ChatModels {
    fn default() -> Self {
        Self {
            text: "llama3.2".into(),
            vision: "llava".into(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

/// System prompt for a context mode. `context` is the optimized lecture text.
pub fn system_prompt(mode: ContextMode, context: Option<&str>) -> String {
    match (mode, context) {
        (ContextMode::Text, Some(text)) => format!(
            "You are a study assistant helping a student understand lecture material.\n\n\
             Your job:\n\
             - Answer questions about the text below clearly and concisely\n\
             - Explain hard concepts in simple terms\n\
             - Give examples where they help\n\
             - Break complex topics into smaller parts\n\
             - Encourage the student to think critically\n\n\
             Lecture material:\n{text}\n\n\
             Base your answers on this material when it is relevant. If a question goes \
             beyond it, say so."
        ),
        (ContextMode::Image, _) => "You are a study assistant helping a student analyse a lecture image.\n\n\
             Your job:\n\
             - Describe what the image shows\n\
             - Point out diagrams, charts, formulas and other key visual elements\n\
             - Explain the material shown\n\
             - Answer questions about it and link it to the underlying concepts\n\n\
             Give detailed, educational answers based on the image."
            .to_string(),
        (ContextMode::Both, Some(text)) => format!(
            "You are a study assistant helping a student with lecture material that has both \
             text and an image.\n\n\
             Your job:\n\
             - Combine the text and the image to give complete answers\n\
             - Refer to specific parts of either when explaining\n\
             - Explain how the image relates to the text\n\n\
             Lecture text:\n{text}\n\n\
             An image of the material may also be attached. Use both sources."
        ),
        _ => "You are a study assistant helping a student learn.\n\n\
             Your job:\n\
             - Answer questions clearly and helpfully\n\
             - Explain concepts in an accessible way\n\
             - Ask clarifying questions when needed"
            .to_string(),
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ChatTool {
    store: Arc<WorkflowStore>,
    provider: Arc<dyn LlmProvider>,
    notifier: Notifier,
    models: ChatModels,
    mode: Mutex<ContextMode>,
    messages: watch::Sender<Vec<ChatMessage>>,
    busy: AtomicBool,
    liveness: Liveness,
}

impl ChatTool {
    pub fn new(
        store: Arc<WorkflowStore>,
        provider: Arc<dyn LlmProvider>,
        notifier: Notifier,
        models: ChatModels,
    ) -> Self {
        let (messages, _) = watch::channel(Vec::new());
        Self {
            store,
            provider,
            notifier,
            models,
            mode: Mutex::new(ContextMode::default()),
            messages,
            busy: AtomicBool::new(false),
            liveness: Liveness::new(),
        }
    }

    pub fn context_mode(&self) -> ContextMode {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_context_mode(&self, mode: ContextMode) {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Drop the conversation. A reply still streaming is discarded.
    pub fn clear(&self) {
        self.liveness.invalidate();
        self.messages.send_replace(Vec::new());
    }

    fn attached_image(&self, mode: ContextMode) -> Option<ImagePayload> {
        if !mode.uses_image() {
            return None;
        }
        let state = self.store.snapshot();
        match state.input_data {
            Some(InputData::Image { data, .. }) => match ImagePayload::from_data_uri(&data) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(error = %e, "Could not attach lecture image");
                    None
                }
            },
            _ => None,
        }
    }

    /// Send one user turn and stream the reply into the conversation.
    ///
    /// Blank input and sends while a reply is streaming are ignored.
    pub async fn send(&self, text: &str) -> Result<(), BuddyError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        if self.busy.swap(true, Ordering::SeqCst) {
            debug!("Chat is busy, ignoring send");
            return Ok(());
        }
        let _busy = BusyGuard(&self.busy);

        let mode = self.context_mode();
        let image = self.attached_image(mode);
        let model = if image.is_some() {
            &self.models.vision
        } else {
            &self.models.text
        };
        if !self.provider.availability(model).await.is_ready() {
            let capability = if image.is_some() {
                Capability::LanguageModelImage
            } else {
                Capability::LanguageModel
            };
            self.notifier.error(
                format!("{capability} is not available"),
                "Wait for the model to finish downloading",
            );
            return Err(BuddyError::CapabilityUnavailable { capability });
        }

        let context = self.store.with_state(|s| s.processed_text().map(str::to_string));
        let mut request = LlmRequest::new(model.as_str())
            .with_system_prompt(system_prompt(mode, context.as_deref()))
            .with_limits(self.models.max_tokens, self.models.temperature);
        for past in self.messages.borrow().iter() {
            request = request.with_message(LlmMessage::new(past.role, past.content.clone()));
        }
        let mut turn = LlmMessage::new(ChatRole::User, text);
        if let Some(image) = &image {
            turn = turn.with_image(image);
        }
        request = request.with_message(turn);

        let ticket = self.liveness.begin();
        let placeholder = ChatMessage::assistant("");
        let placeholder_id = placeholder.id;
        self.messages.send_modify(|messages| {
            messages.push(ChatMessage::user(text));
            messages.push(placeholder);
        });

        let result = self.stream_reply(&request, placeholder_id, ticket).await;
        if !self.liveness.is_current(ticket) {
            debug!("Chat was cleared, discarding reply");
            return Ok(());
        }
        match result {
            Ok(()) => {
                self.update(placeholder_id, |content| *content = content.trim().to_string());
                info!(model = %request.model, mode = ?mode, image = image.is_some(), "Chat reply streamed");
                self.store.set_tools_changes(true);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Chat reply failed");
                self.messages
                    .send_modify(|messages| messages.retain(|m| m.id != placeholder_id));
                self.notifier.error("Failed to send message", e.to_string());
                Err(BuddyError::OperationFailed {
                    operation: "chat".into(),
                    message: e.to_string(),
                })
            }
        }
    }

    async fn stream_reply(&self, request: &LlmRequest, id: Uuid, ticket: u64) -> anyhow::Result<()> {
        let mut stream = self.provider.stream(request).await?;
        while let Some(chunk) = stream.next().await {
            if !self.liveness.is_current(ticket) {
                break;
            }
            let chunk = chunk?;
            self.update(id, |content| content.push_str(&chunk));
        }
        Ok(())
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut String)) {
        self.messages.send_modify(|messages| {
            if let Some(message) = messages.iter_mut().find(|m| m.id == id) {
                f(&mut message.content);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lecturebuddy_core::{Availability, ImageSource, OptimizedData};
    use lecturebuddy_models::MockProvider;
    use std::time::Duration;

    fn tool(provider: MockProvider) -> (Arc<WorkflowStore>, Arc<MockProvider>, ChatTool) {
        let store = Arc::new(WorkflowStore::in_memory());
        let provider = Arc::new(provider);
        let chat = ChatTool::new(
            store.clone(),
            provider.clone(),
            Notifier::silent(),
            ChatModels::default(),
        );
        (store, provider, chat)
    }

    fn with_text_input(store: &WorkflowStore, text: &str) {
        let input = InputData::text(text);
        store.set_input(input.clone());
        store.set_optimized_data(Some(OptimizedData::passthrough(&input)));
    }

    #[test]
    fn prompts_follow_context_mode() {
        let text = system_prompt(ContextMode::Text, Some("entropy"));
        assert!(text.contains("entropy"));
        let image = system_prompt(ContextMode::Image, Some("entropy"));
        assert!(!image.contains("entropy"));
        let fallback = system_prompt(ContextMode::Both, None);
        assert!(fallback.contains("study assistant"));
    }

    #[tokio::test]
    async fn reply_is_streamed_and_trimmed() {
        let (store, provider, chat) = tool(MockProvider::new("mock").with_response("Entropy grows.  "));
        with_text_input(&store, "Second law");

        chat.send("What grows?").await.unwrap();
        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].content, "Entropy grows.");
        assert!(store.snapshot().has_tools_changes);

        let request = &provider.requests()[0];
        assert_eq!(request.model, "llama3.2");
        assert!(request.system_prompt.as_deref().unwrap().contains("Second law"));
        assert!(!request.has_images());
    }

    #[tokio::test]
    async fn history_is_sent_with_next_turn() {
        let (store, provider, chat) = tool(MockProvider::new("mock").with_response("ok"));
        with_text_input(&store, "notes");
        chat.send("first").await.unwrap();
        chat.send("second").await.unwrap();
        let request = &provider.requests()[1];
        let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "ok", "second"]);
    }

    #[tokio::test]
    async fn image_is_attached_in_image_modes() {
        let (store, provider, chat) = tool(MockProvider::new("mock"));
        let image = ImagePayload::new("image/png", vec![1, 2, 3]);
        store.set_input(InputData::image(image.to_data_uri(), ImageSource::Camera));

        chat.send("describe").await.unwrap();
        let request = &provider.requests()[0];
        assert_eq!(request.model, "llava");
        assert!(request.has_images());

        chat.set_context_mode(ContextMode::Text);
        chat.send("again").await.unwrap();
        assert!(!provider.requests()[1].has_images());
    }

    #[tokio::test]
    async fn failed_reply_removes_placeholder() {
        let store = Arc::new(WorkflowStore::in_memory());
        let (notifier, mut rx) = Notifier::channel();
        let chat = ChatTool::new(
            store.clone(),
            Arc::new(MockProvider::new("mock").failing("model crashed")),
            notifier,
            ChatModels::default(),
        );
        assert!(chat.send("hello").await.is_err());
        let messages = chat.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::User);
        assert!(!store.snapshot().has_tools_changes);
        assert_eq!(rx.recv().await.unwrap().title, "Failed to send message");
        assert!(!chat.is_busy());
    }

    #[tokio::test]
    async fn unavailable_model_refuses_send() {
        let store = Arc::new(WorkflowStore::in_memory());
        let (notifier, mut rx) = Notifier::channel();
        let provider = Arc::new(MockProvider::new("mock").with_availability(Availability::Unavailable));
        let chat = ChatTool::new(store, provider.clone(), notifier, ChatModels::default());

        let err = chat.send("hi").await.unwrap_err();
        assert!(matches!(
            err,
            BuddyError::CapabilityUnavailable { capability: Capability::LanguageModel }
        ));
        assert!(chat.messages().is_empty());
        assert!(provider.requests().is_empty());
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.level, lecturebuddy_core::NoticeLevel::Error);
        assert_eq!(notice.title, "AI Chat is not available");
        assert!(!chat.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn reply_finishing_after_clear_is_discarded() {
        let provider = MockProvider::new("mock")
            .with_response("A slow answer")
            .with_latency(Duration::from_millis(500));
        let (store, _provider, chat) = tool(provider);
        with_text_input(&store, "notes");
        let chat = Arc::new(chat);

        let pending = tokio::spawn({
            let chat = chat.clone();
            async move { chat.send("question").await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(chat.messages().len(), 2);

        // Leaving the tools step wipes the conversation and the dirty flag.
        chat.clear();
        store.set_tools_changes(false);

        pending.await.unwrap().unwrap();
        assert!(chat.messages().is_empty());
        assert!(!store.snapshot().has_tools_changes);
        assert!(!chat.is_busy());
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let (_store, provider, chat) = tool(MockProvider::new("mock"));
        chat.send("   ").await.unwrap();
        assert!(chat.messages().is_empty());
        assert!(provider.requests().is_empty());
    }
}
