//! Image capture: files picked by the user and frames from a camera.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use lecturebuddy_core::ImagePayload;
use tokio::process::Command;
use tracing::{debug, info};

/// MIME type by file extension. Non-image extensions fall through to
/// `application/octet-stream` so admission rejects them.
pub fn detect_image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "avif" => "image/avif",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Metadata of a file the user selected, read before its contents.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub mime_type: &'static str,
    pub size: u64,
}

/// Stat `path` and derive its MIME type without reading it.
pub async fn probe_image_file(path: &Path) -> Result<ImageFile> {
    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    if !meta.is_file() {
        anyhow::bail!("Not a file: {}", path.display());
    }
    Ok(ImageFile {
        mime_type: detect_image_mime(path),
        size: meta.len(),
    })
}

/// Read the whole file as an image payload.
pub async fn load_image_file(path: &Path) -> Result<ImagePayload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    Ok(ImagePayload::new(detect_image_mime(path), bytes))
}

/// A camera-like device producing still frames.
#[async_trait]
pub trait FrameSource: Send + Sync {
    fn name(&self) -> &str;

    async fn open(&self) -> Result<()>;

    /// Grab one frame as PNG.
    async fn capture(&self) -> Result<ImagePayload>;

    /// Release the device. Must be idempotent.
    fn close(&self);
}

/// Captures by running an external command that writes a PNG to stdout,
/// e.g. `fswebcam -q --no-banner --png 9 -`.
pub struct CommandFrameSource {
    argv: Vec<String>,
}

impl CommandFrameSource {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[async_trait]
impl FrameSource for CommandFrameSource {
    fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("camera")
    }

    async fn open(&self) -> Result<()> {
        if self.argv.is_empty() {
            anyhow::bail!("No camera command configured");
        }
        Ok(())
    }

    async fn capture(&self) -> Result<ImagePayload> {
        let (program, args) = self
            .argv
            .split_first()
            .context("No camera command configured")?;
        debug!(program, ?args, "Capturing frame");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to start camera command `{program}`"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Camera command exited with {}: {}", output.status, stderr.trim());
        }
        if !output.stdout.starts_with(&PNG_MAGIC) {
            anyhow::bail!("Camera command did not produce a PNG image");
        }
        Ok(ImagePayload::new("image/png", output.stdout))
    }

    fn close(&self) {}
}

/// Exclusive use of a frame source. The device is closed on `stop` or drop.
pub struct CameraSession {
    source: Box<dyn FrameSource>,
    active: AtomicBool,
}

impl CameraSession {
    pub async fn start(source: Box<dyn FrameSource>) -> Result<Self> {
        source.open().await?;
        info!(source = source.name(), "Camera started");
        Ok(Self {
            source,
            active: AtomicBool::new(true),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn capture(&self) -> Result<ImagePayload> {
        if !self.is_active() {
            anyhow::bail!("Camera is not running");
        }
        self.source.capture().await
    }

    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.source.close();
            info!(source = self.source.name(), "Camera stopped");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FrameSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }
        async fn open(&self) -> Result<()> {
            Ok(())
        }
        async fn capture(&self) -> Result<ImagePayload> {
            Ok(ImagePayload::new("image/png", PNG_MAGIC.to_vec()))
        }
        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(detect_image_mime(Path::new("slide.PNG")), "image/png");
        assert_eq!(detect_image_mime(Path::new("board.jpeg")), "image/jpeg");
        assert_eq!(detect_image_mime(Path::new("notes.pdf")), "application/pdf");
        assert_eq!(detect_image_mime(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn probe_reports_size() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("slide.png");
        std::fs::write(&path, vec![0u8; 1234]).unwrap();
        let file = probe_image_file(&path).await.unwrap();
        assert_eq!(file.size, 1234);
        assert_eq!(file.mime_type, "image/png");

        let payload = load_image_file(&path).await.unwrap();
        assert_eq!(payload.bytes.len(), 1234);
    }

    #[tokio::test]
    async fn session_closes_exactly_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let session = CameraSession::start(Box::new(CountingSource {
            closes: closes.clone(),
        }))
        .await
        .unwrap();
        assert!(session.capture().await.is_ok());
        session.stop();
        assert!(session.capture().await.is_err());
        drop(session);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_session_releases_device() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let _session = CameraSession::start(Box::new(CountingSource {
                closes: closes.clone(),
            }))
            .await
            .unwrap();
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_command_cannot_open() {
        assert!(CameraSession::start(Box::new(CommandFrameSource::new(Vec::new())))
            .await
            .is_err());
    }
}
