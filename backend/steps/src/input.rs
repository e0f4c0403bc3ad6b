use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use lecturebuddy_core::{
    BuddyError, ImageSource, InputData, InputKind, InputRejection, Notice, NoticeLevel, Notifier,
};
use lecturebuddy_understanding::{load_image_file, probe_image_file, CameraSession, FrameSource};
use lecturebuddy_workflow::{validate_image_file, validate_text_input, WorkflowStore};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::debounce::Debouncer;

/// Delay before typed text is committed as input.
pub const TEXT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Builds a fresh frame source each time the camera is started.
pub type FrameSourceFactory = Arc<dyn Fn() -> Result<Box<dyn FrameSource>> + Send + Sync>;

/// Drives the input step: type selection, file upload, camera, text.
pub struct InputController {
    store: Arc<WorkflowStore>,
    notifier: Notifier,
    camera_factory: Option<FrameSourceFactory>,
    camera: Mutex<Option<CameraSession>>,
    text_debounce: Debouncer,
}

impl InputController {
    pub fn new(store: Arc<WorkflowStore>, notifier: Notifier) -> Self {
        Self {
            store,
            notifier,
            camera_factory: None,
            camera: Mutex::new(None),
            text_debounce: Debouncer::new(TEXT_DEBOUNCE),
        }
    }

    pub fn with_camera(mut self, factory: FrameSourceFactory) -> Self {
        self.camera_factory = Some(factory);
        self
    }

    pub fn has_camera(&self) -> bool {
        self.camera_factory.is_some()
    }

    fn reject(&self, rejection: InputRejection) -> BuddyError {
        self.notifier
            .notify(Notice::new(NoticeLevel::Error, rejection.to_string()));
        BuddyError::InputRejected(rejection)
    }

    pub fn select_type(&self, kind: InputKind) {
        self.store.set_selected_input_type(Some(kind));
    }

    /// "Clear Selection": back to the type chooser with a fresh workflow.
    pub async fn clear_selection(&self) {
        self.stop_camera().await;
        self.text_debounce.cancel();
        self.store.set_selected_input_type(None);
        self.store.reset();
    }

    /// Validate and load an image file as the current input.
    pub async fn upload_file(&self, path: &Path) -> Result<(), BuddyError> {
        let file = match probe_image_file(path).await {
            Ok(file) => file,
            Err(e) => {
                self.notifier.error("Failed to read file", e.to_string());
                return Err(e.into());
            }
        };
        if let Err(rejection) = validate_image_file(file.mime_type, file.size) {
            return Err(self.reject(rejection));
        }

        let payload = match load_image_file(path).await {
            Ok(payload) => payload,
            Err(e) => {
                self.notifier.error("Failed to read file", e.to_string());
                return Err(e.into());
            }
        };

        self.stop_camera().await;
        self.store.set_image_input_source(Some(ImageSource::Upload));
        self.store
            .set_input(InputData::image(payload.to_data_uri(), ImageSource::Upload));
        self.notifier.success("Image uploaded successfully");
        Ok(())
    }

    /// Open the camera. An uploaded image is discarded first.
    pub async fn start_camera(&self) -> Result<(), BuddyError> {
        let state = self.store.snapshot();
        if state.image_input_source == Some(ImageSource::Upload) && state.input_data.is_some() {
            debug!("Clearing uploaded image before starting camera");
            self.store.clear_input();
        }

        let Some(factory) = &self.camera_factory else {
            self.notifier
                .error("Camera access denied", "No camera command is configured");
            return Err(BuddyError::OperationFailed {
                operation: "camera".into(),
                message: "no camera configured".into(),
            });
        };

        let mut camera = self.camera.lock().await;
        if camera.as_ref().is_some_and(|c| c.is_active()) {
            return Ok(());
        }
        let session = match factory() {
            Ok(source) => CameraSession::start(source).await,
            Err(e) => Err(e),
        };
        match session {
            Ok(session) => {
                *camera = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Camera failed to start");
                self.notifier.error("Camera access denied", e.to_string());
                Err(e.into())
            }
        }
    }

    pub async fn camera_active(&self) -> bool {
        self.camera
            .lock()
            .await
            .as_ref()
            .is_some_and(|c| c.is_active())
    }

    pub async fn stop_camera(&self) {
        if let Some(session) = self.camera.lock().await.take() {
            session.stop();
        }
    }

    /// Grab a frame, release the camera and use the frame as input.
    pub async fn capture_photo(&self) -> Result<(), BuddyError> {
        let mut camera = self.camera.lock().await;
        let Some(session) = camera.as_ref() else {
            return Err(BuddyError::OperationFailed {
                operation: "capture".into(),
                message: "camera is not running".into(),
            });
        };
        let frame = match session.capture().await {
            Ok(frame) => frame,
            Err(e) => {
                self.notifier.error("Failed to capture photo", e.to_string());
                return Err(e.into());
            }
        };
        if let Some(session) = camera.take() {
            session.stop();
        }
        drop(camera);

        self.store.set_image_input_source(Some(ImageSource::Camera));
        self.store
            .set_input(InputData::image(frame.to_data_uri(), ImageSource::Camera));
        self.notifier.success("Photo captured successfully");
        Ok(())
    }

    /// "Remove image" on the preview.
    pub fn remove_image(&self) {
        self.store.clear_input();
    }

    /// Commit text immediately.
    pub fn submit_text(&self, text: &str) -> Result<(), BuddyError> {
        self.text_debounce.cancel();
        if let Err(rejection) = validate_text_input(text) {
            return Err(self.reject(rejection));
        }
        self.store.set_input(InputData::text(text.trim()));
        Ok(())
    }

    /// Commit text after typing settles. Invalid text is silently held back.
    pub fn edit_text(&self, text: &str) {
        if validate_text_input(text).is_err() {
            self.text_debounce.cancel();
            return;
        }
        let store = self.store.clone();
        let trimmed = text.trim().to_string();
        self.text_debounce.schedule(async move {
            store.set_input(InputData::text(trimmed));
        });
    }
}
