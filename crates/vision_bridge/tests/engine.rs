//! Orchestrator behavior tests against a scripted remote and an
//! instrumented sleeper: no network, no wall-clock delays.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageBuffer, Luma};
use ocr_core::{CANCELLED, NO_TEXT_FOUND, PROCESSING_FAILED};
use vision_bridge::engine::Sleep;
use vision_bridge::{
    CancelFlag, Engine, EngineConfig, RecognitionOrigin, RemoteError, RemoteOcr, RemoteText,
};

/// Remote that replays a fixed script of responses.
struct ScriptedRemote {
    script: Mutex<VecDeque<Result<RemoteText, RemoteError>>>,
    calls: AtomicU32,
}

impl ScriptedRemote {
    fn new(script: Vec<Result<RemoteText, RemoteError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    fn always_failing() -> Self {
        Self::new(Vec::new())
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteOcr for ScriptedRemote {
    async fn recognize(
        &self,
        _image: &[u8],
        _hints: &[String],
    ) -> Result<RemoteText, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(RemoteError::Timeout))
    }
}

/// Sleeper that records requested backoff instead of waiting.
#[derive(Default)]
struct RecordingSleep {
    total: Mutex<Duration>,
}

impl RecordingSleep {
    fn total(&self) -> Duration {
        *self.total.lock().unwrap()
    }
}

#[async_trait]
impl Sleep for RecordingSleep {
    async fn sleep(&self, duration: Duration) {
        *self.total.lock().unwrap() += duration;
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        backoff_unit: Duration::from_millis(1),
        attempt_timeout: Duration::from_millis(200),
        ..EngineConfig::default()
    }
}

fn white_png(w: u32, h: u32) -> Vec<u8> {
    let img: image::GrayImage = ImageBuffer::from_pixel(w, h, Luma([255u8]));
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )
    .unwrap();
    bytes
}

fn textlike_png() -> Vec<u8> {
    let mut img: image::GrayImage = ImageBuffer::from_pixel(200, 60, Luma([255u8]));
    for y in 20..40 {
        for x in 0..200 {
            if x % 10 < 5 {
                img.put_pixel(x, y, Luma([30u8]));
            }
        }
    }
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )
    .unwrap();
    bytes
}

#[tokio::test]
async fn always_failing_remote_still_yields_an_outcome() {
    let remote = ScriptedRemote::always_failing();
    let sleeper = RecordingSleep::default();
    let engine = Engine::with_sleeper(Some(remote), fast_config(), sleeper);

    let run = engine.run(&white_png(100, 100), &CancelFlag::new()).await;

    // Total-failure guarantee: never a panic or error, a diagnostic text
    // with zero confidence instead.
    assert_eq!(run.outcome.text, NO_TEXT_FOUND);
    assert_eq!(run.outcome.confidence, 0.0);
    assert_eq!(run.attempts, 5);
    assert_eq!(run.origin, RecognitionOrigin::LocalFallback);
}

#[tokio::test]
async fn all_attempts_are_spent_with_linear_backoff() {
    let remote = ScriptedRemote::always_failing();
    let engine = Engine::with_sleeper(Some(remote), fast_config(), RecordingSleep::default());

    let run = engine.run(&white_png(50, 50), &CancelFlag::new()).await;
    assert_eq!(run.attempts, 5);
    assert_eq!(engine_remote(&engine).calls(), 5);
    // Backoff after attempts 1..4 only: (1+2+3+4) * unit.
    assert_eq!(engine_sleeper(&engine).total(), Duration::from_millis(10));
}

// Accessors keep the Engine fields private while letting the tests inspect
// the injected collaborators.
fn engine_remote<'a>(
    engine: &'a Engine<ScriptedRemote, RecordingSleep>,
) -> &'a ScriptedRemote {
    engine.remote_ref().expect("remote configured")
}

fn engine_sleeper<'a>(engine: &'a Engine<ScriptedRemote, RecordingSleep>) -> &'a RecordingSleep {
    engine.sleeper_ref()
}

#[tokio::test]
async fn remote_success_short_circuits_remaining_attempts() {
    let remote = ScriptedRemote::new(vec![
        Err(RemoteError::Status(503)),
        Ok(RemoteText {
            text: "MODEL X-200\nSN 12345".to_string(),
            confidence: 0.9,
        }),
    ]);
    let engine = Engine::with_sleeper(Some(remote), fast_config(), RecordingSleep::default());

    let run = engine.run(&textlike_png(), &CancelFlag::new()).await;

    assert_eq!(run.origin, RecognitionOrigin::Remote);
    assert_eq!(run.attempts, 2);
    assert_eq!(engine_remote(&engine).calls(), 2);
    assert_eq!(run.outcome.text, "MODEL X-200\nSN 12345");
    assert_eq!(run.outcome.confidence, 0.9);
}

#[tokio::test]
async fn whitespace_remote_text_counts_as_failure() {
    let remote = ScriptedRemote::new(vec![Ok(RemoteText {
        text: "   \n ".to_string(),
        confidence: 0.9,
    })]);
    let engine = Engine::with_sleeper(Some(remote), fast_config(), RecordingSleep::default());

    let run = engine.run(&textlike_png(), &CancelFlag::new()).await;
    assert_eq!(run.origin, RecognitionOrigin::LocalFallback);
    // Local heuristics still produced something for a text-like image.
    assert!(!run.outcome.text.is_empty());
    assert!(run.outcome.confidence < 0.5);
}

#[tokio::test]
async fn no_remote_configured_goes_straight_to_local() {
    let engine: Engine<ScriptedRemote, RecordingSleep> =
        Engine::with_sleeper(None, fast_config(), RecordingSleep::default());

    let run = engine.run(&textlike_png(), &CancelFlag::new()).await;
    assert_eq!(run.origin, RecognitionOrigin::LocalFallback);
    assert_eq!(run.attempts, 0);
    assert!(!run.outcome.text.is_empty());
}

#[tokio::test]
async fn cancelled_run_returns_diagnostic_outcome() {
    let remote = ScriptedRemote::always_failing();
    let engine = Engine::with_sleeper(Some(remote), fast_config(), RecordingSleep::default());

    let cancel = CancelFlag::new();
    cancel.cancel();
    let run = engine.run(&white_png(50, 50), &cancel).await;

    assert_eq!(run.outcome.text, CANCELLED);
    assert_eq!(run.origin, RecognitionOrigin::Diagnostic);
    assert_eq!(engine_remote(&engine).calls(), 0);
}

#[tokio::test]
async fn undecodable_input_yields_processing_failed() {
    let remote = ScriptedRemote::always_failing();
    let engine = Engine::with_sleeper(Some(remote), fast_config(), RecordingSleep::default());

    let run = engine.run(b"not an image", &CancelFlag::new()).await;

    assert_eq!(run.outcome.text, PROCESSING_FAILED);
    assert_eq!(run.outcome.confidence, 0.0);
    assert_eq!(run.origin, RecognitionOrigin::Diagnostic);
    assert_eq!(run.quality.score, 0.0);
    // No remote quota wasted on an undecodable upload.
    assert_eq!(engine_remote(&engine).calls(), 0);
}

#[tokio::test]
async fn per_request_language_hints_reach_the_remote() {
    struct HintCapture {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteOcr for HintCapture {
        async fn recognize(
            &self,
            _image: &[u8],
            hints: &[String],
        ) -> Result<RemoteText, RemoteError> {
            *self.seen.lock().unwrap() = hints.to_vec();
            Ok(RemoteText {
                text: "OK".to_string(),
                confidence: 0.9,
            })
        }
    }

    let remote = HintCapture {
        seen: Mutex::new(Vec::new()),
    };
    let engine = Engine::with_sleeper(Some(remote), fast_config(), RecordingSleep::default());

    let hints = vec!["en".to_string()];
    let run = engine
        .run_with_hints(&textlike_png(), Some(&hints), &CancelFlag::new())
        .await;
    assert_eq!(run.origin, RecognitionOrigin::Remote);
    assert_eq!(*engine.remote_ref().unwrap().seen.lock().unwrap(), hints);
}
