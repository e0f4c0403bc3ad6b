use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lecturebuddy_core::{
    ImagePayload, InputData, Notifier, OcrEngine, OptimizationMetadata, OptimizedData, ProgressFn,
    WorkflowStep,
};
use lecturebuddy_workflow::{Liveness, StepLock, WorkflowStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;

/// Delay before a manual edit of extracted text is saved.
pub const EDIT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    NoInput,
    /// Text input passed through unchanged.
    Passthrough,
    /// Saved OCR text for the same image was reused.
    Reused,
    OcrStarted,
}

/// Drives the optimizer step: passthrough for text, OCR for images.
pub struct OptimizerController {
    store: Arc<WorkflowStore>,
    ocr: Arc<dyn OcrEngine>,
    notifier: Notifier,
    liveness: Liveness,
    progress: Arc<watch::Sender<u8>>,
    edits: Debouncer,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl OptimizerController {
    pub fn new(store: Arc<WorkflowStore>, ocr: Arc<dyn OcrEngine>, notifier: Notifier) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            store,
            ocr,
            notifier,
            liveness: Liveness::new(),
            progress: Arc::new(progress),
            edits: Debouncer::new(EDIT_DEBOUNCE),
            task: Mutex::new(None),
        }
    }

    pub fn engine_name(&self) -> &str {
        self.ocr.name()
    }

    /// OCR progress in percent.
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    /// Called when the optimizer step becomes current.
    pub fn enter(&self) -> EnterOutcome {
        let state = self.store.snapshot();
        let Some(input) = state.input_data else {
            return EnterOutcome::NoInput;
        };
        match &input {
            InputData::Image { .. } => {
                let reusable = state.optimized_data.as_ref().is_some_and(|saved| {
                    saved.matches_input(&input) && !saved.processed_text.is_empty()
                });
                if reusable {
                    debug!("Reusing saved OCR text");
                    EnterOutcome::Reused
                } else {
                    self.start_ocr(input);
                    EnterOutcome::OcrStarted
                }
            }
            _ => {
                if state.optimized_data.is_none() {
                    self.store
                        .set_optimized_data(Some(OptimizedData::passthrough(&input)));
                }
                EnterOutcome::Passthrough
            }
        }
    }

    /// "Re-run OCR". Refused while a run is in flight.
    pub fn rerun(&self) -> bool {
        let state = self.store.snapshot();
        if state.is_processing {
            return false;
        }
        match state.input_data {
            Some(input @ InputData::Image { .. }) => {
                self.start_ocr(input);
                true
            }
            _ => false,
        }
    }

    fn start_ocr(&self, input: InputData) {
        let ticket = self.liveness.begin();
        self.edits.cancel();
        self.progress.send_replace(0);

        let guard = StepLock::acquire(self.store.clone(), WorkflowStep::Optimizer)
            .bound_to(&self.liveness, ticket);
        let store = self.store.clone();
        let ocr = self.ocr.clone();
        let notifier = self.notifier.clone();
        let liveness = self.liveness.clone();
        let progress_tx = self.progress.clone();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();

            let progress_liveness = liveness.clone();
            let on_progress: ProgressFn = Arc::new(move |fraction: f32| {
                if progress_liveness.is_current(ticket) {
                    progress_tx.send_replace((fraction.clamp(0.0, 1.0) * 100.0).round() as u8);
                }
            });

            let result = match input.image_data().map(ImagePayload::from_data_uri) {
                Some(Ok(image)) => ocr.recognize(&image, Some(on_progress)).await,
                Some(Err(e)) => Err(e),
                None => Err(anyhow::anyhow!("Input is not an image")),
            };

            let still_wanted = liveness.is_current(ticket)
                && store.with_state(|s| {
                    s.input_data
                        .as_ref()
                        .is_some_and(|current| current.same_content(&input))
                });
            if !still_wanted {
                debug!(ticket, "Discarding superseded OCR result");
                return;
            }

            match result {
                Ok(output) => {
                    let elapsed = started.elapsed().as_millis() as u64;
                    info!(
                        chars = output.text.len(),
                        confidence = ?output.confidence,
                        elapsed_ms = elapsed,
                        "OCR completed"
                    );
                    store.set_optimized_data(Some(OptimizedData {
                        original_input: input,
                        processed_text: output.text,
                        metadata: OptimizationMetadata {
                            ocr_confidence: Some(output.confidence.unwrap_or(0.0)),
                            processing_time_ms: Some(elapsed),
                            edited_manually: Some(false),
                        },
                    }));
                    notifier.success("OCR processing completed");
                }
                Err(e) => {
                    warn!(error = %e, "OCR failed");
                    notifier.error("OCR processing failed", e.to_string());
                }
            }
        });

        if let Some(previous) = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle)
        {
            debug!(finished = previous.is_finished(), "Superseding previous OCR run");
        }
    }

    /// Wait for the current OCR run, if any, to finish.
    pub async fn join(&self) {
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "OCR task ended abnormally");
            }
        }
    }

    /// Save a manual edit of the extracted text once typing settles.
    pub fn edit_text(&self, text: &str) {
        let unchanged = self.store.with_state(|s| {
            s.optimized_data
                .as_ref()
                .map_or(true, |o| o.processed_text == text)
        });
        if text.is_empty() || unchanged {
            self.edits.cancel();
            return;
        }
        let store = self.store.clone();
        let text = text.to_string();
        self.edits.schedule(async move {
            let state = store.snapshot();
            let (Some(input), Some(saved)) = (state.input_data, state.optimized_data) else {
                return;
            };
            if state.is_processing || !saved.matches_input(&input) {
                return;
            }
            store.set_optimized_data(Some(OptimizedData {
                original_input: saved.original_input,
                processed_text: text,
                metadata: OptimizationMetadata {
                    edited_manually: Some(true),
                    ..saved.metadata
                },
            }));
        });
    }

    /// Called when the optimizer step stops being current. An in-flight run
    /// keeps going but its result is dropped; the lock is released now.
    pub fn leave(&self) {
        self.edits.cancel();
        let had_run = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some_and(|h| !h.is_finished());
        self.liveness.invalidate();
        if had_run || self.store.with_state(|s| s.is_locked(WorkflowStep::Optimizer)) {
            self.store.unlock_step(WorkflowStep::Optimizer);
            self.store.set_processing(false);
        }
    }
}

impl Drop for OptimizerController {
    fn drop(&mut self) {
        self.leave();
    }
}
