//! Translation of the optimized text, with language detection for the source
//! and locale/location hints for the target.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use lecturebuddy_core::language::{base_language, language_name};
use lecturebuddy_core::{
    Availability, BuddyError, Capability, DetectedLanguage, Geolocator, LanguageDetector, Notifier,
    ProgressFn, Translator,
};
use lecturebuddy_understanding::{country_language_by_code, country_language_by_name, CountryLanguage};
use lecturebuddy_workflow::{Liveness, WorkflowStore};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Detection candidates below this confidence are not offered.
pub const MIN_DETECTION_CONFIDENCE: f32 = 0.01;
const MAX_DETECTIONS: usize = 10;

/// Everything the translator pane shows.
#[derive(Debug, Clone, Default)]
pub struct TranslatorState {
    pub detections: Vec<DetectedLanguage>,
    pub detecting: bool,
    pub source: Option<String>,
    pub target: Option<String>,
    /// Availability of the selected pair.
    pub pair: Option<Availability>,
    pub locale_language: Option<String>,
    pub location: Option<CountryLanguage>,
    pub country_result: Option<CountryLanguage>,
    pub country_error: Option<String>,
    pub translated: String,
    pub error: Option<String>,
    pub translating: bool,
    /// Model download progress in percent, capped at 99 until done.
    pub progress: Option<u8>,
}

/// A suggested target language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCandidate {
    pub code: String,
    pub label: String,
}

impl TranslatorState {
    /// Target suggestions: the locale language, the location language when it
    /// differs, and the last country search result.
    pub fn target_candidates(&self) -> Vec<TargetCandidate> {
        let mut out = Vec::new();
        let location_code = self.location.as_ref().map(|l| l.language_code.as_str());

        if let Some(code) = &self.locale_language {
            let origin = if location_code == Some(code.as_str()) {
                "from browser & location"
            } else {
                "from browser"
            };
            out.push(TargetCandidate {
                code: code.clone(),
                label: format!("{} ({origin})", language_name(code)),
            });
        }
        if let Some(location) = &self.location {
            if self.locale_language.as_deref() != Some(location.language_code.as_str()) {
                out.push(TargetCandidate {
                    code: location.language_code.clone(),
                    label: format!("{} (from location)", location.language_name),
                });
            }
        }
        if let Some(country) = &self.country_result {
            out.push(TargetCandidate {
                code: country.language_code.clone(),
                label: format!("{} (from {})", country.language_name, country.country_name),
            });
        }
        out
    }
}

pub struct TranslatorTool {
    store: Arc<WorkflowStore>,
    translator: Arc<dyn Translator>,
    detector: Arc<dyn LanguageDetector>,
    geolocator: Option<Arc<dyn Geolocator>>,
    notifier: Notifier,
    state: Arc<watch::Sender<TranslatorState>>,
    busy: AtomicBool,
    detected_for: Mutex<Option<String>>,
    liveness: Liveness,
}

impl TranslatorTool {
    pub fn new(
        store: Arc<WorkflowStore>,
        translator: Arc<dyn Translator>,
        detector: Arc<dyn LanguageDetector>,
        notifier: Notifier,
    ) -> Self {
        let (state, _) = watch::channel(TranslatorState::default());
        Self {
            store,
            translator,
            detector,
            geolocator: None,
            notifier,
            state: Arc::new(state),
            busy: AtomicBool::new(false),
            detected_for: Mutex::new(None),
            liveness: Liveness::new(),
        }
    }

    pub fn with_geolocator(mut self, geolocator: Arc<dyn Geolocator>) -> Self {
        self.geolocator = Some(geolocator);
        self
    }

    pub fn with_locale_language(self, code: Option<String>) -> Self {
        self.state
            .send_modify(|s| s.locale_language = code.map(|c| base_language(&c)));
        self
    }

    pub fn state(&self) -> TranslatorState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TranslatorState> {
        self.state.subscribe()
    }

    /// Forget detections, selections and results. Locale and location survive;
    /// detections and translations still running are discarded.
    pub fn reset(&self) {
        self.liveness.invalidate();
        *self.detected_for.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.state.send_modify(|s| {
            *s = TranslatorState {
                locale_language: s.locale_language.take(),
                location: s.location.take(),
                ..TranslatorState::default()
            };
        });
    }

    fn processed_text(&self) -> Option<String> {
        self.store
            .with_state(|s| s.processed_text().map(str::to_string))
            .filter(|t| !t.is_empty())
    }

    /// Detect the language of the processed text once per text and
    /// pre-select the best candidate as source. Failures only get logged.
    pub async fn detect_source(&self) {
        let Some(text) = self.processed_text() else {
            return;
        };
        {
            let mut seen = self.detected_for.lock().unwrap_or_else(|e| e.into_inner());
            if seen.as_deref() == Some(text.as_str()) {
                return;
            }
            *seen = Some(text.clone());
        }
        if !self.detector.availability().await.is_ready() {
            debug!("Language detector not ready");
            *self.detected_for.lock().unwrap_or_else(|e| e.into_inner()) = None;
            return;
        }

        let ticket = self.liveness.current();
        self.state.send_modify(|s| s.detecting = true);
        let detections = match self.detector.detect(&text).await {
            Ok(results) => results
                .into_iter()
                .filter(|d| d.confidence >= MIN_DETECTION_CONFIDENCE)
                .take(MAX_DETECTIONS)
                .collect::<Vec<_>>(),
            Err(e) => {
                warn!(error = %e, "Language detection failed");
                Vec::new()
            }
        };
        if !self.liveness.is_current(ticket) {
            debug!("Translator was reset, discarding detection");
            return;
        }
        let source = detections.first().map(|d| d.language.clone());
        debug!(candidates = detections.len(), ?source, "Language detected");
        self.state.send_modify(|s| {
            s.detecting = false;
            s.detections = detections;
            if source.is_some() {
                s.source = source;
            }
        });
        self.refresh_pair().await;
    }

    /// Resolve the user's location into a target-language suggestion.
    pub async fn locate(&self) {
        let Some(geolocator) = &self.geolocator else {
            return;
        };
        match geolocator.locate().await {
            Ok(position) => {
                let location = position
                    .country_code
                    .as_deref()
                    .and_then(country_language_by_code);
                debug!(country = ?position.country_code, found = location.is_some(), "Location resolved");
                self.state.send_modify(|s| s.location = location);
            }
            Err(e) => {
                warn!(error = %e, "Location lookup failed");
                self.notifier.error("Location error", e.to_string());
            }
        }
    }

    pub fn search_country(&self, query: &str) -> Option<CountryLanguage> {
        if query.trim().is_empty() {
            self.state
                .send_modify(|s| s.country_error = Some("Please enter a country name".into()));
            return None;
        }
        match country_language_by_name(query) {
            Some(found) => {
                self.notifier
                    .success(format!("Country found: {}", found.country_name));
                self.state.send_modify(|s| {
                    s.country_result = Some(found.clone());
                    s.country_error = None;
                });
                Some(found)
            }
            None => {
                self.state.send_modify(|s| {
                    s.country_result = None;
                    s.country_error = Some(format!("Country \"{query}\" not found"));
                });
                None
            }
        }
    }

    pub async fn set_source(&self, code: &str) {
        let code = base_language(code);
        self.state.send_modify(|s| s.source = Some(code));
        self.refresh_pair().await;
    }

    pub async fn set_target(&self, code: &str) {
        let code = base_language(code);
        self.state.send_modify(|s| s.target = Some(code));
        self.refresh_pair().await;
    }

    async fn refresh_pair(&self) {
        let (source, target) = {
            let s = self.state.borrow();
            (s.source.clone(), s.target.clone())
        };
        let pair = match (source, target) {
            (Some(source), Some(target)) => {
                Some(self.translator.pair_availability(&source, &target).await)
            }
            _ => None,
        };
        self.state.send_modify(|s| s.pair = pair);
    }

    fn fail(&self, message: String) -> BuddyError {
        self.state.send_modify(|s| s.error = Some(message.clone()));
        self.notifier.error(message.clone(), "");
        BuddyError::OperationFailed {
            operation: "translate".into(),
            message,
        }
    }

    /// Translate the processed text from the selected source to target.
    pub async fn translate(&self) -> Result<String, BuddyError> {
        let (source, target) = {
            let s = self.state.borrow();
            (s.source.clone(), s.target.clone())
        };
        let (Some(source), Some(target)) = (source, target) else {
            self.notifier
                .error("Please select both source and target languages", "");
            return Err(BuddyError::OperationFailed {
                operation: "translate".into(),
                message: "source and target languages are required".into(),
            });
        };
        let Some(text) = self.processed_text() else {
            self.notifier.error("No text to translate", "");
            return Err(BuddyError::OperationFailed {
                operation: "translate".into(),
                message: "no text to translate".into(),
            });
        };
        if !self.translator.availability().await.is_supported() {
            self.notifier.error("Translator is not available", "");
            return Err(BuddyError::CapabilityUnavailable {
                capability: Capability::Translator,
            });
        }
        if self.busy.swap(true, Ordering::SeqCst) {
            return Ok(self.state().translated);
        }
        let ticket = self.liveness.current();

        self.state.send_modify(|s| {
            s.translating = true;
            s.error = None;
            s.translated.clear();
            s.progress = Some(0);
        });

        let pair = self.translator.pair_availability(&source, &target).await;
        let result = if pair == Availability::Unavailable {
            Err(format!("The language pair ({source} → {target}) is not supported"))
        } else {
            let state = self.state.clone();
            let liveness = self.liveness.clone();
            let on_progress: ProgressFn = Arc::new(move |fraction: f32| {
                if !liveness.is_current(ticket) {
                    return;
                }
                let percent = (fraction.clamp(0.0, 1.0) * 100.0).min(99.0) as u8;
                state.send_modify(|s| s.progress = Some(percent));
            });
            self.translator
                .translate(&source, &target, &text, Some(on_progress))
                .await
                .map_err(|e| format!("Translation error: {e}"))
        };

        self.busy.store(false, Ordering::SeqCst);
        if !self.liveness.is_current(ticket) {
            debug!(%source, %target, "Translator was reset, discarding translation");
            return Err(BuddyError::OperationFailed {
                operation: "translate".into(),
                message: "translation discarded".into(),
            });
        }
        self.state.send_modify(|s| {
            s.translating = false;
            s.progress = None;
            s.pair = Some(pair);
        });
        match result {
            Ok(translated) => {
                info!(%source, %target, chars = translated.len(), "Text translated");
                self.state.send_modify(|s| s.translated = translated.clone());
                self.notifier.success("Text translated successfully");
                self.store.set_tools_changes(true);
                Ok(translated)
            }
            Err(message) => {
                warn!(%source, %target, error = %message, "Translation failed");
                Err(self.fail(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use lecturebuddy_core::{GeoPosition, InputData, NoticeLevel, OptimizedData};
    use lecturebuddy_models::{LlmLanguageDetector, LlmTranslator, MockProvider};
    use std::time::Duration;

    struct FixedLocation(&'static str);

    #[async_trait]
    impl Geolocator for FixedLocation {
        async fn locate(&self) -> Result<GeoPosition> {
            Ok(GeoPosition {
                latitude: 0.0,
                longitude: 0.0,
                accuracy: None,
                country_code: Some(self.0.to_string()),
            })
        }
    }

    const DETECTED: &str = r#"[{"language":"de","confidence":0.92},{"language":"nl","confidence":0.05},{"language":"fr","confidence":0.001}]"#;

    fn tool(translation: MockProvider) -> (Arc<WorkflowStore>, TranslatorTool) {
        let store = Arc::new(WorkflowStore::in_memory());
        let translator = Arc::new(LlmTranslator::new(Arc::new(translation), "translate"));
        let detector = Arc::new(LlmLanguageDetector::new(
            Arc::new(MockProvider::new("detect").with_response(DETECTED)),
            "detect",
        ));
        let tool = TranslatorTool::new(store.clone(), translator, detector, Notifier::silent());
        (store, tool)
    }

    fn optimize(store: &WorkflowStore, text: &str) {
        let input = InputData::text(text);
        store.set_input(input.clone());
        store.set_optimized_data(Some(OptimizedData::passthrough(&input)));
    }

    #[tokio::test]
    async fn detection_preselects_source() {
        let (store, tool) = tool(MockProvider::new("t"));
        optimize(&store, "Der zweite Hauptsatz");
        tool.detect_source().await;
        let state = tool.state();
        assert_eq!(state.source.as_deref(), Some("de"));
        assert_eq!(state.detections.len(), 2);
        assert!(!state.detecting);
    }

    #[tokio::test]
    async fn translates_and_marks_changes() {
        let (store, tool) = tool(MockProvider::new("t").with_response(" The second law \n"));
        optimize(&store, "Der zweite Hauptsatz");
        tool.detect_source().await;
        tool.set_target("en-US").await;
        assert_eq!(tool.state().pair, Some(Availability::Available));

        let out = tool.translate().await.unwrap();
        assert_eq!(out, "The second law");
        let state = tool.state();
        assert_eq!(state.translated, "The second law");
        assert!(!state.translating);
        assert_eq!(state.progress, None);
        assert!(store.snapshot().has_tools_changes);
    }

    #[tokio::test]
    async fn reset_keeps_locale_and_allows_new_detection() {
        let (store, tool) = tool(MockProvider::new("t").with_response("Hello"));
        let tool = tool.with_locale_language(Some("en-GB".into()));
        optimize(&store, "Der zweite Hauptsatz");
        tool.detect_source().await;
        tool.set_target("en").await;
        tool.translate().await.unwrap();

        tool.reset();
        let state = tool.state();
        assert!(state.source.is_none() && state.target.is_none());
        assert!(state.translated.is_empty());
        assert_eq!(state.locale_language.as_deref(), Some("en"));

        tool.detect_source().await;
        assert_eq!(tool.state().source.as_deref(), Some("de"));
    }

    #[tokio::test(start_paused = true)]
    async fn translation_finishing_after_reset_is_discarded() {
        let translation = MockProvider::new("t")
            .with_response("The second law")
            .with_latency(Duration::from_millis(500));
        let (store, tool) = tool(translation);
        optimize(&store, "Der zweite Hauptsatz");
        tool.set_source("de").await;
        tool.set_target("en").await;
        let tool = Arc::new(tool);

        let pending = tokio::spawn({
            let tool = tool.clone();
            async move { tool.translate().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(tool.state().translating);

        tool.reset();
        store.set_tools_changes(false);

        assert!(pending.await.unwrap().is_err());
        let state = tool.state();
        assert!(state.translated.is_empty());
        assert!(!state.translating);
        assert!(state.error.is_none());
        assert!(!store.snapshot().has_tools_changes);
    }

    #[tokio::test]
    async fn requires_both_languages() {
        let store = Arc::new(WorkflowStore::in_memory());
        let (notifier, mut rx) = Notifier::channel();
        let translation = Arc::new(MockProvider::new("t"));
        let tool = TranslatorTool::new(
            store.clone(),
            Arc::new(LlmTranslator::new(translation.clone(), "m")),
            Arc::new(LlmLanguageDetector::new(translation, "m")),
            notifier,
        );
        optimize(&store, "text");
        tool.set_target("fr").await;
        assert!(tool.translate().await.is_err());
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.title, "Please select both source and target languages");
    }

    #[tokio::test]
    async fn unsupported_pair_is_an_error() {
        let (store, tool) = tool(MockProvider::new("t"));
        optimize(&store, "hello");
        tool.set_source("en").await;
        tool.set_target("en-GB").await;
        assert_eq!(tool.state().pair, Some(Availability::Unavailable));

        assert!(tool.translate().await.is_err());
        assert_eq!(
            tool.state().error.as_deref(),
            Some("The language pair (en → en) is not supported")
        );
        assert!(!store.snapshot().has_tools_changes);
    }

    #[tokio::test]
    async fn location_and_locale_suggest_targets() {
        let (_store, tool) = tool(MockProvider::new("t"));
        let tool = tool
            .with_locale_language(Some("en_US.UTF-8".into()))
            .with_geolocator(Arc::new(FixedLocation("fr")));
        tool.locate().await;
        tool.search_country("Japan");

        let candidates = tool.state().target_candidates();
        let labels: Vec<&str> = candidates.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["English (from browser)", "French (from location)", "Japanese (from Japan)"]
        );
    }

    #[tokio::test]
    async fn matching_locale_and_location_merge() {
        let (_store, tool) = tool(MockProvider::new("t"));
        let tool = tool
            .with_locale_language(Some("de".into()))
            .with_geolocator(Arc::new(FixedLocation("AT")));
        tool.locate().await;
        let candidates = tool.state().target_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].label, "German (from browser & location)");
    }

    #[test]
    fn country_search_errors() {
        let (_store, tool) = tool(MockProvider::new("t"));
        assert!(tool.search_country("  ").is_none());
        assert_eq!(
            tool.state().country_error.as_deref(),
            Some("Please enter a country name")
        );
        assert!(tool.search_country("Atlantis").is_none());
        assert_eq!(
            tool.state().country_error.as_deref(),
            Some("Country \"Atlantis\" not found")
        );
    }
}
