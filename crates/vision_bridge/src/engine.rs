//! OCR orchestration engine
//!
//! Drives the retry loop across preprocessing variants against the remote
//! vision API, with linear backoff between attempts, and falls back to the
//! local heuristic pipeline when every attempt fails. The engine's contract
//! is total: every run terminates with an [`OcrRun`], never an error — all
//! failure paths are absorbed into degraded-confidence outcomes.
//!
//! The state machine is explicit (`Phase`/`Event`/`next_phase`) and the
//! sleep source is injected, so the control flow is unit-testable without
//! wall-clock delays or a network.

use crate::client::{RemoteOcr, RemoteText};
use async_trait::async_trait;
use ocr_core::preprocess::{self, PreprocessAttempt};
use ocr_core::{local, quality, OcrOutcome, QualityReport};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Injected sleep source for inter-attempt backoff.
#[async_trait]
pub trait Sleep: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Cooperative cancellation flag, checked between attempts and before the
/// local fallback. Cloneable; all clones share the same flag.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Remote attempts before falling back, one preprocessing variant each.
    pub max_attempts: u32,
    /// Backoff after attempt k is `k * backoff_unit` (linear).
    pub backoff_unit: Duration,
    /// Per-attempt ceiling on the remote call.
    pub attempt_timeout: Duration,
    /// Language hints forwarded to the remote API.
    pub language_hints: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_unit: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(20),
            language_hints: vec!["ko".to_string(), "en".to_string()],
        }
    }
}

/// Orchestrator states. There is no error terminal state: every path ends
/// in `Done` with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Assessing,
    Attempting(u32),
    Succeeded,
    Exhausted,
    FallbackLocal,
    Done,
}

/// Events feeding the transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Assessed,
    RemoteSucceeded,
    RemoteFailed,
    FallbackStarted,
    FallbackFinished,
}

/// Pure transition function for the orchestrator state machine. Unmatched
/// pairs leave the phase unchanged.
pub fn next_phase(phase: Phase, event: Event, max_attempts: u32) -> Phase {
    match (phase, event) {
        (Phase::Idle, Event::Start) => Phase::Assessing,
        (Phase::Assessing, Event::Assessed) => Phase::Attempting(1),
        (Phase::Attempting(_), Event::RemoteSucceeded) => Phase::Succeeded,
        (Phase::Attempting(k), Event::RemoteFailed) if k < max_attempts => Phase::Attempting(k + 1),
        (Phase::Attempting(_), Event::RemoteFailed) => Phase::Exhausted,
        (Phase::Exhausted, Event::FallbackStarted) => Phase::FallbackLocal,
        (Phase::FallbackLocal, Event::FallbackFinished) => Phase::Done,
        (Phase::Succeeded, Event::FallbackFinished) => Phase::Done,
        (unchanged, _) => unchanged,
    }
}

/// Which path produced the final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionOrigin {
    /// Remote vision API answered on some attempt.
    Remote,
    /// Local heuristic pipeline after remote exhaustion.
    LocalFallback,
    /// Diagnostic outcome (undecodable input or cancellation).
    Diagnostic,
}

/// Result of one orchestrated OCR run.
#[derive(Debug, Clone, Serialize)]
pub struct OcrRun {
    pub outcome: OcrOutcome,
    pub quality: QualityReport,
    /// Remote attempts actually spent.
    pub attempts: u32,
    pub origin: RecognitionOrigin,
}

/// The OCR orchestrator. `remote: None` skips straight to the local
/// pipeline (offline mode).
pub struct Engine<R: RemoteOcr, S: Sleep = TokioSleep> {
    remote: Option<R>,
    sleeper: S,
    config: EngineConfig,
}

impl<R: RemoteOcr> Engine<R> {
    pub fn new(remote: Option<R>, config: EngineConfig) -> Self {
        Self {
            remote,
            sleeper: TokioSleep,
            config,
        }
    }
}

impl<R: RemoteOcr, S: Sleep> Engine<R, S> {
    pub fn with_sleeper(remote: Option<R>, config: EngineConfig, sleeper: S) -> Self {
        Self {
            remote,
            sleeper,
            config,
        }
    }

    /// The injected remote client, if any.
    pub fn remote_ref(&self) -> Option<&R> {
        self.remote.as_ref()
    }

    /// The injected sleep source.
    pub fn sleeper_ref(&self) -> &S {
        &self.sleeper
    }

    /// Run the full OCR flow with the configured language hints.
    pub async fn run(&self, image_bytes: &[u8], cancel: &CancelFlag) -> OcrRun {
        self.run_with_hints(image_bytes, None, cancel).await
    }

    /// Run the full OCR flow, optionally overriding language hints for this
    /// call. Always returns an [`OcrRun`].
    pub async fn run_with_hints(
        &self,
        image_bytes: &[u8],
        hints: Option<&[String]>,
        cancel: &CancelFlag,
    ) -> OcrRun {
        let max = self.config.max_attempts;
        let hints = hints.unwrap_or(&self.config.language_hints);

        let image = match image::load_from_memory(image_bytes) {
            Ok(img) => img,
            Err(err) => {
                tracing::warn!("input image undecodable: {err}");
                return OcrRun {
                    outcome: OcrOutcome::processing_failed(),
                    quality: QualityReport::load_failure(),
                    attempts: 0,
                    origin: RecognitionOrigin::Diagnostic,
                };
            }
        };

        let mut phase = next_phase(Phase::Idle, Event::Start, max);
        debug_assert_eq!(phase, Phase::Assessing);
        let quality = quality::assess(&image);
        if quality.is_poor() {
            tracing::warn!(
                score = quality.score,
                issues = ?quality.issues,
                "image quality is poor, OCR may be unreliable"
            );
        }
        phase = next_phase(phase, Event::Assessed, max);

        let mut attempts_spent = 0u32;
        if let Some(remote) = &self.remote {
            while let Phase::Attempting(k) = phase {
                if cancel.is_cancelled() {
                    return self.cancelled_run(quality, attempts_spent);
                }
                attempts_spent = k;

                match self.attempt(remote, &image, k, hints).await {
                    Some(remote_text) => {
                        phase = next_phase(phase, Event::RemoteSucceeded, max);
                        debug_assert_eq!(phase, Phase::Succeeded);
                        tracing::info!(attempt = k, "remote OCR succeeded");
                        return OcrRun {
                            outcome: OcrOutcome::new(remote_text.text, remote_text.confidence),
                            quality,
                            attempts: k,
                            origin: RecognitionOrigin::Remote,
                        };
                    }
                    None => {
                        phase = next_phase(phase, Event::RemoteFailed, max);
                        if matches!(phase, Phase::Attempting(_)) {
                            self.sleeper.sleep(self.config.backoff_unit * k).await;
                        }
                    }
                }
            }
        } else {
            tracing::debug!("no remote client configured, going straight to local pipeline");
            phase = Phase::Exhausted;
        }

        if cancel.is_cancelled() {
            return self.cancelled_run(quality, attempts_spent);
        }

        phase = next_phase(phase, Event::FallbackStarted, max);
        debug_assert_eq!(phase, Phase::FallbackLocal);
        let outcome = local::recognize_local(&image);
        let _done = next_phase(phase, Event::FallbackFinished, max);
        debug_assert_eq!(_done, Phase::Done);
        tracing::info!(
            confidence = outcome.confidence,
            attempts = attempts_spent,
            "local fallback produced final outcome"
        );
        OcrRun {
            outcome,
            quality,
            attempts: attempts_spent,
            origin: RecognitionOrigin::LocalFallback,
        }
    }

    /// One remote attempt: preprocess variant k, encode, call under the
    /// per-attempt timeout. Any failure, timeout or empty answer is None.
    async fn attempt(
        &self,
        remote: &R,
        image: &image::DynamicImage,
        k: u32,
        hints: &[String],
    ) -> Option<RemoteText> {
        let variant = PreprocessAttempt::for_attempt(k);
        let gray = preprocess::preprocess(image, variant);
        let payload = match preprocess::encode_jpeg(&gray) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(attempt = k, "variant encoding failed: {err}");
                return None;
            }
        };

        tracing::debug!(attempt = k, variant = variant.label(), "remote attempt");
        match tokio::time::timeout(self.config.attempt_timeout, remote.recognize(&payload, hints))
            .await
        {
            Ok(Ok(text)) if !text.text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => {
                tracing::warn!(attempt = k, "remote returned empty text");
                None
            }
            Ok(Err(err)) => {
                tracing::warn!(attempt = k, "remote attempt failed: {err}");
                None
            }
            Err(_) => {
                tracing::warn!(attempt = k, "remote attempt timed out");
                None
            }
        }
    }

    fn cancelled_run(&self, quality: QualityReport, attempts: u32) -> OcrRun {
        tracing::info!(attempts, "OCR run cancelled by caller");
        OcrRun {
            outcome: OcrOutcome::cancelled(),
            quality,
            attempts,
            origin: RecognitionOrigin::Diagnostic,
        }
    }
}
