//! Session Wiring
//!
//! Builds the store, controllers and tools for one run from a prepared
//! `BuddyConfig`. Shared by the wizard and the headless commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use lecturebuddy_config::{defaults, BuddyConfig, OcrEngineKind, ProviderKind};
use lecturebuddy_core::{
    Geolocator, LanguageDetector, LlmProvider, Notice, Notifier, OcrEngine, Summarizer, Translator,
};
use lecturebuddy_models::{LlmLanguageDetector, LlmSummarizer, LlmTranslator, MockProvider, OllamaProvider};
use lecturebuddy_steps::{FrameSourceFactory, InputController, OptimizerController};
use lecturebuddy_tools::{
    CapabilityProbe, ChatModels, ChatTool, DetectorProbe, LanguageModelProbe, SummarizerProbe,
    SummarizerTool, TranslatorProbe, TranslatorTool,
};
use lecturebuddy_understanding::{
    locale_language, CommandFrameSource, FrameSource, IpGeolocator, TesseractOcr, VisionOcr,
};
use lecturebuddy_workflow::{FilePreferenceStore, Navigator, WorkflowStore};
use logging::{EventLogger, WorkflowEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const PREFERENCES_FILE: &str = "preferences.json";

pub struct Session {
    pub store: Arc<WorkflowStore>,
    pub navigator: Navigator,
    pub notices: mpsc::UnboundedReceiver<Notice>,
    pub ocr: Arc<dyn OcrEngine>,
    pub input: Arc<InputController>,
    pub optimizer: Arc<OptimizerController>,
    pub chat: Arc<ChatTool>,
    pub summarizer: Arc<SummarizerTool>,
    pub translator: Arc<TranslatorTool>,
    pub probes: Vec<Arc<dyn CapabilityProbe>>,
    pub poll_interval: Duration,
    pub storage_dir: PathBuf,
}

fn model_or(value: Option<String>, fallback: &str) -> String {
    value.unwrap_or_else(|| fallback.to_string())
}

impl Session {
    pub fn build(config: &BuddyConfig, config_dir: &Path) -> Result<Self> {
        let storage_dir = config.storage_dir(config_dir);
        std::fs::create_dir_all(&storage_dir)
            .with_context(|| format!("Failed to create storage directory {}", storage_dir.display()))?;

        let prefs = Arc::new(FilePreferenceStore::open(storage_dir.join(PREFERENCES_FILE)));
        let store = Arc::new(WorkflowStore::new(prefs));
        let navigator = Navigator::new(store.clone());
        let (notifier, notices) = Notifier::channel();

        let models = config.models();
        let provider: Arc<dyn LlmProvider> = match config.provider() {
            ProviderKind::Ollama => {
                let url = model_or(models.base_url.clone(), defaults::DEFAULT_OLLAMA_URL);
                info!(url = %url, "Using Ollama provider");
                Arc::new(OllamaProvider::new().with_base_url(url))
            }
            ProviderKind::Mock => {
                info!("Using mock provider");
                Arc::new(MockProvider::new("mock"))
            }
        };

        let chat_model = model_or(models.chat_model.clone(), defaults::DEFAULT_CHAT_MODEL);
        let vision_model = model_or(models.vision_model.clone(), defaults::DEFAULT_VISION_MODEL);
        let max_tokens = models.max_tokens.unwrap_or(defaults::DEFAULT_MAX_TOKENS);
        let temperature = models.temperature.unwrap_or(defaults::DEFAULT_TEMPERATURE);

        let ocr_config = config.ocr.clone().unwrap_or_default();
        let ocr: Arc<dyn OcrEngine> = match config.ocr_engine() {
            OcrEngineKind::Tesseract => Arc::new(TesseractOcr::new(
                model_or(ocr_config.binary, defaults::DEFAULT_TESSERACT_BINARY),
                model_or(ocr_config.language, defaults::DEFAULT_OCR_LANGUAGE),
            )),
            OcrEngineKind::Vision => Arc::new(VisionOcr::new(provider.clone(), vision_model.clone())),
        };

        let mut input = InputController::new(store.clone(), notifier.clone());
        if let Some(argv) = config.camera_command() {
            let argv = argv.to_vec();
            debug!(command = ?argv, "Camera capture command configured");
            let factory: FrameSourceFactory = Arc::new(move || {
                Ok(Box::new(CommandFrameSource::new(argv.clone())) as Box<dyn FrameSource>)
            });
            input = input.with_camera(factory);
        }
        let optimizer = OptimizerController::new(store.clone(), ocr.clone(), notifier.clone());

        let summarizer_backend: Arc<dyn Summarizer> = Arc::new(
            LlmSummarizer::new(
                provider.clone(),
                model_or(models.summarizer_model.clone(), &chat_model),
            )
            .with_max_tokens(max_tokens),
        );
        let translator_backend: Arc<dyn Translator> = Arc::new(
            LlmTranslator::new(
                provider.clone(),
                model_or(models.translator_model.clone(), &chat_model),
            )
            .with_max_tokens(max_tokens),
        );
        let detector_backend: Arc<dyn LanguageDetector> = Arc::new(LlmLanguageDetector::new(
            provider.clone(),
            model_or(models.detector_model.clone(), &chat_model),
        ));

        let chat = ChatTool::new(
            store.clone(),
            provider.clone(),
            notifier.clone(),
            ChatModels {
                text: chat_model.clone(),
                vision: vision_model.clone(),
                max_tokens,
                temperature,
            },
        );
        let summarizer = SummarizerTool::new(store.clone(), summarizer_backend.clone(), notifier.clone());

        let mut translator = TranslatorTool::new(
            store.clone(),
            translator_backend.clone(),
            detector_backend.clone(),
            notifier.clone(),
        )
        .with_locale_language(locale_language());
        if let Some(endpoint) = config.geolocation_endpoint() {
            match IpGeolocator::new(endpoint) {
                Ok(geo) => {
                    let geo: Arc<dyn Geolocator> = Arc::new(geo);
                    translator = translator.with_geolocator(geo);
                }
                Err(e) => warn!(error = %e, "Geolocation disabled"),
            }
        }

        let probes: Vec<Arc<dyn CapabilityProbe>> = vec![
            Arc::new(LanguageModelProbe::text(provider.clone(), chat_model)),
            Arc::new(LanguageModelProbe::image(provider, vision_model)),
            Arc::new(SummarizerProbe(summarizer_backend)),
            Arc::new(DetectorProbe(detector_backend)),
            Arc::new(TranslatorProbe(translator_backend)),
        ];

        info!(
            session = %store.session_id(),
            ocr = %ocr.name(),
            storage = %storage_dir.display(),
            "Session ready"
        );

        Ok(Self {
            store,
            navigator,
            notices,
            ocr,
            input: Arc::new(input),
            optimizer: Arc::new(optimizer),
            chat: Arc::new(chat),
            summarizer: Arc::new(summarizer),
            translator: Arc::new(translator),
            probes,
            poll_interval: config.poll_interval(),
            storage_dir,
        })
    }

    /// Notices queued since the last call.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        let mut out = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            EventLogger::log_event(
                self.store.session_id(),
                WorkflowEvent::Notice {
                    level: format!("{:?}", notice.level).to_lowercase(),
                    message: notice.title.clone(),
                },
            );
            out.push(notice);
        }
        out
    }
}
