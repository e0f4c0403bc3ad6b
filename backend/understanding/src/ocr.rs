//! Optical Character Recognition (OCR)
//!
//! Two engines: the local Tesseract binary (TSV output, word confidences) and
//! a vision-capable local model asked to transcribe the image.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lecturebuddy_core::{
    Availability, ChatRole, ImagePayload, LlmMessage, LlmProvider, LlmRequest, OcrEngine,
    OcrOutput, ProgressFn,
};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs `tesseract stdin stdout -l <lang> tsv`.
pub struct TesseractOcr {
    binary: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

#[derive(Debug, Default)]
struct Line {
    words: Vec<String>,
}

/// Rebuild text and mean word confidence from Tesseract TSV output.
///
/// Words on the same line are joined by spaces, lines by newlines and
/// paragraphs by a blank line. Confidence is `None` when no word was scored.
pub fn parse_tesseract_tsv(tsv: &str) -> OcrOutput {
    // (block, paragraph) -> line number -> words
    let mut paragraphs: BTreeMap<(u32, u32), BTreeMap<u32, Line>> = BTreeMap::new();
    let mut confidence_sum = 0.0f64;
    let mut scored = 0usize;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let level: u32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let text = cols[11].trim();
        let conf: f64 = cols[10].parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let block: u32 = cols[2].parse().unwrap_or(0);
        let par: u32 = cols[3].parse().unwrap_or(0);
        let line: u32 = cols[4].parse().unwrap_or(0);

        paragraphs
            .entry((block, par))
            .or_default()
            .entry(line)
            .or_default()
            .words
            .push(text.to_string());
        confidence_sum += conf;
        scored += 1;
    }

    let text = paragraphs
        .values()
        .map(|lines| {
            lines
                .values()
                .map(|l| l.words.join(" "))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    OcrOutput {
        text,
        confidence: (scored > 0).then(|| (confidence_sum / scored as f64) as f32),
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    /// Available when the binary runs and reports a version.
    async fn availability(&self) -> Availability {
        let status = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;
        match status {
            Ok(status) if status.success() => Availability::Available,
            Ok(status) => {
                warn!(binary = %self.binary, %status, "OCR engine check failed");
                Availability::Unavailable
            }
            Err(e) => {
                warn!(binary = %self.binary, error = %e, "OCR engine not found");
                Availability::Unavailable
            }
        }
    }

    async fn recognize(&self, image: &ImagePayload, progress: Option<ProgressFn>) -> Result<OcrOutput> {
        let report = |p: f32| {
            if let Some(cb) = &progress {
                cb(p);
            }
        };
        report(0.0);
        info!(binary = %self.binary, language = %self.language, bytes = image.bytes.len(), "Running Tesseract");

        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", self.language.as_str(), "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start OCR engine `{}`", self.binary))?;
        report(0.1);

        let mut stdin = child.stdin.take().context("OCR engine stdin unavailable")?;
        let bytes = image.bytes.clone();
        let writer = tokio::spawn(async move {
            stdin.write_all(&bytes).await?;
            stdin.shutdown().await
        });

        let output = child
            .wait_with_output()
            .await
            .context("OCR engine did not finish")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("OCR engine exited with {}: {}", output.status, stderr.trim());
        }
        writer
            .await
            .context("OCR input writer panicked")?
            .context("Failed to send image to OCR engine")?;
        report(0.9);

        let result = parse_tesseract_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(chars = result.text.len(), confidence = ?result.confidence, "Tesseract finished");
        report(1.0);
        Ok(result)
    }
}

const TRANSCRIBE_PROMPT: &str = "Transcribe all text visible in this image exactly as written, \
keeping line breaks and list structure. Output only the transcribed text. If there is no text, \
output nothing.";

/// OCR via a vision-capable local model.
pub struct VisionOcr {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl VisionOcr {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    fn name(&self) -> &str {
        "vision"
    }

    async fn availability(&self) -> Availability {
        self.provider.availability(&self.model).await
    }

    async fn recognize(&self, image: &ImagePayload, progress: Option<ProgressFn>) -> Result<OcrOutput> {
        if let Some(cb) = &progress {
            cb(0.0);
        }
        let request = LlmRequest::new(&self.model)
            .with_message(LlmMessage::new(ChatRole::User, TRANSCRIBE_PROMPT).with_image(image))
            .with_limits(2048, 0.0);
        let response = self
            .provider
            .complete(&request)
            .await
            .context("Vision model transcription failed")?;
        if let Some(cb) = &progress {
            cb(1.0);
        }
        Ok(OcrOutput {
            text: response.content.trim().to_string(),
            confidence: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word(block: u32, par: u32, line: u32, n: u32, conf: f32, text: &str) -> String {
        format!("5\t1\t{block}\t{par}\t{line}\t{n}\t0\t0\t10\t10\t{conf}\t{text}")
    }

    #[test]
    fn rebuilds_lines_and_paragraphs() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t".to_string(),
            word(1, 1, 1, 1, 90.0, "Second"),
            word(1, 1, 1, 2, 80.0, "Law"),
            word(1, 1, 2, 1, 70.0, "entropy"),
            word(1, 2, 1, 1, 60.0, "Summary"),
        ]
        .join("\n");
        let out = parse_tesseract_tsv(&tsv);
        assert_eq!(out.text, "Second Law\nentropy\n\nSummary");
        assert_eq!(out.confidence, Some(75.0));
    }

    #[test]
    fn empty_output_has_no_confidence() {
        let out = parse_tesseract_tsv(HEADER);
        assert_eq!(out.text, "");
        assert_eq!(out.confidence, None);
    }

    #[test]
    fn unscored_words_are_skipped() {
        let tsv = [HEADER.to_string(), word(1, 1, 1, 1, -1.0, "ghost"), word(1, 1, 1, 2, 50.0, "real")].join("\n");
        let out = parse_tesseract_tsv(&tsv);
        assert_eq!(out.text, "real");
        assert_eq!(out.confidence, Some(50.0));
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let engine = TesseractOcr::new("definitely-not-a-real-ocr-binary", "eng");
        let image = ImagePayload::new("image/png", vec![0u8; 4]);
        let err = engine.recognize(&image, None).await.unwrap_err();
        assert!(err.to_string().contains("Failed to start OCR engine"));
        assert_eq!(engine.availability().await, Availability::Unavailable);
    }
}
