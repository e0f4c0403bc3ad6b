//! Capability polling.
//!
//! Each tool watches the availability of the model it depends on. A poller
//! re-checks on a fixed interval and, the first time it sees a model that can
//! be downloaded, starts exactly one acquisition. The loop stops when its
//! handle is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use lecturebuddy_core::{
    Availability, Capability, LanguageDetector, LlmProvider, ProgressFn, Summarizer, Translator,
};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// One model-backed capability that can be checked and, if needed, fetched.
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    fn capability(&self) -> Capability;

    async fn check(&self) -> Availability;

    /// Whether the poller should fetch the model itself. Capabilities that
    /// download lazily on first use return `false`.
    fn acquirable(&self) -> bool {
        true
    }

    async fn acquire(&self, progress: ProgressFn) -> Result<()>;
}

/// Chat model, text-only or image-capable.
pub struct LanguageModelProbe {
    provider: Arc<dyn LlmProvider>,
    model: String,
    capability: Capability,
}

impl LanguageModelProbe {
    pub fn text(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            capability: Capability::LanguageModel,
        }
    }

    pub fn image(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            capability: Capability::LanguageModelImage,
        }
    }
}

#[async_trait]
impl CapabilityProbe for LanguageModelProbe {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn check(&self) -> Availability {
        self.provider.availability(&self.model).await
    }

    async fn acquire(&self, progress: ProgressFn) -> Result<()> {
        self.provider.acquire(&self.model, Some(progress)).await
    }
}

pub struct SummarizerProbe(pub Arc<dyn Summarizer>);

#[async_trait]
impl CapabilityProbe for SummarizerProbe {
    fn capability(&self) -> Capability {
        Capability::Summarizer
    }

    async fn check(&self) -> Availability {
        self.0.availability().await
    }

    async fn acquire(&self, progress: ProgressFn) -> Result<()> {
        self.0.acquire(Some(progress)).await
    }
}

/// Translation models are fetched per language pair when a translation runs.
pub struct TranslatorProbe(pub Arc<dyn Translator>);

#[async_trait]
impl CapabilityProbe for TranslatorProbe {
    fn capability(&self) -> Capability {
        Capability::Translator
    }

    async fn check(&self) -> Availability {
        self.0.availability().await
    }

    fn acquirable(&self) -> bool {
        false
    }

    async fn acquire(&self, _progress: ProgressFn) -> Result<()> {
        Ok(())
    }
}

pub struct DetectorProbe(pub Arc<dyn LanguageDetector>);

#[async_trait]
impl CapabilityProbe for DetectorProbe {
    fn capability(&self) -> Capability {
        Capability::LanguageDetector
    }

    async fn check(&self) -> Availability {
        self.0.availability().await
    }

    fn acquirable(&self) -> bool {
        false
    }

    async fn acquire(&self, _progress: ProgressFn) -> Result<()> {
        Ok(())
    }
}

/// One-shot availability of every probe, in order.
pub async fn check_all(probes: &[Arc<dyn CapabilityProbe>]) -> Vec<(Capability, Availability)> {
    let checks = probes.iter().map(|probe| async move {
        (probe.capability(), probe.check().await)
    });
    futures::future::join_all(checks).await
}

/// Live view of a running poller. Dropping it stops the loop; an acquisition
/// already under way runs to completion.
pub struct PollerHandle {
    capability: Capability,
    status: watch::Receiver<Availability>,
    progress: watch::Receiver<Option<u8>>,
    acquiring: Arc<AtomicBool>,
    _stop: DropGuard,
}

impl PollerHandle {
    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn availability(&self) -> Availability {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Availability> {
        self.status.clone()
    }

    /// Download progress in percent while an acquisition is running.
    pub fn download_progress(&self) -> Option<u8> {
        *self.progress.borrow()
    }

    pub fn is_acquiring(&self) -> bool {
        self.acquiring.load(Ordering::SeqCst)
    }
}

pub struct CapabilityPoller;

impl CapabilityPoller {
    pub fn spawn(probe: Arc<dyn CapabilityProbe>, interval: Duration) -> PollerHandle {
        let capability = probe.capability();
        let (status_tx, status_rx) = watch::channel(Availability::Unavailable);
        let (progress_tx, progress_rx) = watch::channel(None);
        let acquiring = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();

        tokio::spawn(poll_loop(
            probe,
            interval,
            token.child_token(),
            Arc::new(status_tx),
            Arc::new(progress_tx),
            acquiring.clone(),
        ));

        PollerHandle {
            capability,
            status: status_rx,
            progress: progress_rx,
            acquiring,
            _stop: token.drop_guard(),
        }
    }
}

async fn poll_loop(
    probe: Arc<dyn CapabilityProbe>,
    interval: Duration,
    cancel: CancellationToken,
    status: Arc<watch::Sender<Availability>>,
    progress: Arc<watch::Sender<Option<u8>>>,
    acquiring: Arc<AtomicBool>,
) {
    let capability = probe.capability();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let availability = tokio::select! {
            _ = cancel.cancelled() => break,
            a = probe.check() => a,
        };
        let downloading = acquiring.load(Ordering::SeqCst) && availability == Availability::Downloadable;
        publish(
            &status,
            capability,
            if downloading { Availability::Downloading } else { availability },
        );

        if availability != Availability::Downloadable || !probe.acquirable() {
            continue;
        }
        if acquiring
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            continue;
        }

        info!(%capability, "Starting model download");
        publish(&status, capability, Availability::Downloading);
        let probe = probe.clone();
        let status = status.clone();
        let progress = progress.clone();
        let acquiring = acquiring.clone();
        tokio::spawn(async move {
            let progress_tx = progress.clone();
            let on_progress: ProgressFn = Arc::new(move |fraction: f32| {
                let percent = (fraction.clamp(0.0, 1.0) * 100.0).min(99.0) as u8;
                progress_tx.send_replace(Some(percent));
            });
            progress.send_replace(Some(0));

            match probe.acquire(on_progress).await {
                Ok(()) => {
                    info!(%capability, "Model download finished");
                    publish(&status, capability, probe.check().await);
                }
                Err(e) => {
                    warn!(%capability, error = %e, "Model download failed");
                    publish(&status, capability, probe.check().await);
                }
            }
            progress.send_replace(None);
            acquiring.store(false, Ordering::SeqCst);
        });
    }
    debug!(%capability, "Capability poller stopped");
}

fn publish(status: &watch::Sender<Availability>, capability: Capability, availability: Availability) {
    status.send_if_modified(|current| {
        if *current == availability {
            return false;
        }
        debug!(%capability, from = %current, to = %availability, "Availability changed");
        *current = availability;
        true
    });
}
