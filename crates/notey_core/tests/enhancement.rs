use async_trait::async_trait;
use notey_core::enhance::{EnhanceError, EnhancementOutcome, EnhancementState, SUCCESS_MESSAGE};
use notey_core::{
    EnhancementConfig, EnhancementSession, EnhancementSink, GeneratedText, GenerationError,
    ProgressPlan, TextGenerator,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

const FAILURE_PREFIX: &str = "AI Polishing failed. Please try again later. Error: ";

/// Answers after `delay` of (possibly paused) Tokio time.
struct DelayedGenerator {
    delay: Duration,
    reply: Result<GeneratedText, GenerationError>,
    prompts: Mutex<Vec<String>>,
}

impl DelayedGenerator {
    fn new(delay: Duration, reply: Result<GeneratedText, GenerationError>) -> Arc<Self> {
        Arc::new(Self {
            delay,
            reply,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TextGenerator for DelayedGenerator {
    async fn generate(&self, prompt: &str) -> Result<GeneratedText, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        tokio::time::sleep(self.delay).await;
        self.reply.clone()
    }
}

/// Answers only after the test releases the gate.
struct GatedGenerator {
    gate: Arc<Notify>,
    reply: String,
}

#[async_trait]
impl TextGenerator for GatedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<GeneratedText, GenerationError> {
        self.gate.notified().await;
        Ok(GeneratedText::new(self.reply.as_str()))
    }
}

#[derive(Default)]
struct RecordingSink {
    applied: Mutex<Vec<String>>,
}

#[async_trait]
impl EnhancementSink for RecordingSink {
    async fn apply(&self, text: &str) -> Result<(), String> {
        self.applied.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Signals entry, then waits for the test before recording.
#[derive(Default)]
struct GatedSink {
    entered: Notify,
    release: Notify,
    applied: Mutex<Vec<String>>,
}

#[async_trait]
impl EnhancementSink for GatedSink {
    async fn apply(&self, text: &str) -> Result<(), String> {
        self.entered.notify_one();
        self.release.notified().await;
        self.applied.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl EnhancementSink for FailingSink {
    async fn apply(&self, _text: &str) -> Result<(), String> {
        Err("database is locked".to_string())
    }
}

fn fast_config(result_hold: Duration) -> EnhancementConfig {
    EnhancementConfig {
        progress: ProgressPlan {
            budget: Duration::from_millis(200),
            steps: 10,
            ceiling: 0.9,
        },
        result_hold,
        ..EnhancementConfig::default()
    }
}

fn gated(reply: &str) -> (Arc<Notify>, Arc<GatedGenerator>) {
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(GatedGenerator {
        gate: Arc::clone(&gate),
        reply: reply.to_string(),
    });
    (gate, generator)
}

#[tokio::test(start_paused = true)]
async fn progress_rises_monotonically_then_completes() {
    let generator = DelayedGenerator::new(Duration::from_secs(2), Ok(GeneratedText::new("Fixed text.")));
    let session = EnhancementSession::new(generator.clone(), EnhancementConfig::default(), "");

    let mut run = session.start("fixd txt").unwrap();
    let mut observed = vec![run.status()];
    while let Some(status) = run.changed().await {
        let done = status.state == EnhancementState::Idle;
        observed.push(status);
        if done {
            break;
        }
    }

    let running: Vec<f32> = observed
        .iter()
        .filter(|status| status.state == EnhancementState::Running)
        .map(|status| status.progress)
        .collect();
    assert!(running.len() > 1);
    assert!(running.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(running.iter().all(|progress| *progress <= 0.9));

    let succeeded = observed
        .iter()
        .find(|status| status.state == EnhancementState::Succeeded)
        .unwrap();
    assert_eq!(succeeded.progress, 1.0);
    assert_eq!(succeeded.message.as_deref(), Some(SUCCESS_MESSAGE));

    let last = observed.last().unwrap();
    assert_eq!(last.state, EnhancementState::Idle);
    assert_eq!(last.progress, 0.0);

    assert_eq!(
        run.outcome().await,
        EnhancementOutcome::Succeeded {
            text: "Fixed text.".to_string()
        }
    );
    assert_eq!(session.draft(), "Fixed text.");
    let prompts = generator.prompts.lock().unwrap();
    assert!(prompts[0].ends_with("Text: \"\"\"fixd txt\"\"\""));
}

#[tokio::test(start_paused = true)]
async fn slow_call_holds_progress_at_ceiling() {
    let generator = DelayedGenerator::new(Duration::from_secs(30), Ok(GeneratedText::new("done")));
    let session = EnhancementSession::new(generator, EnhancementConfig::default(), "");

    let mut run = session.start("draft").unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;

    let status = run.status();
    assert_eq!(status.state, EnhancementState::Running);
    assert!((status.progress - 0.9).abs() < 1e-6);

    assert!(matches!(
        run.outcome().await,
        EnhancementOutcome::Succeeded { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn call_exceeding_timeout_fails_and_keeps_draft() {
    let generator = DelayedGenerator::new(Duration::from_secs(10), Ok(GeneratedText::new("late")));
    let config = EnhancementConfig {
        call_timeout: Duration::from_secs(1),
        ..EnhancementConfig::default()
    };
    let session = EnhancementSession::new(generator, config, "");

    let mut run = session.start("original words").unwrap();
    let outcome = run.outcome().await;

    assert_eq!(
        outcome,
        EnhancementOutcome::Failed {
            message: format!("{FAILURE_PREFIX}no response within 1s")
        }
    );
    assert_eq!(run.status().state, EnhancementState::Failed);
    assert_eq!(run.status().progress, 1.0);
    assert_eq!(session.draft(), "original words");
}

#[tokio::test(start_paused = true)]
async fn failure_message_is_truncated_and_draft_kept() {
    let generator = DelayedGenerator::new(
        Duration::from_millis(10),
        Err(GenerationError::Transport("x".repeat(200))),
    );
    let session = EnhancementSession::new(generator, EnhancementConfig::default(), "");

    let mut run = session.start("keep me").unwrap();
    let outcome = run.outcome().await;

    let message = outcome.user_message().unwrap();
    let detail = message.strip_prefix(FAILURE_PREFIX).unwrap();
    assert_eq!(detail.chars().count(), 53);
    assert!(detail.starts_with("request failed: "));
    assert!(detail.ends_with("..."));
    assert_eq!(session.draft(), "keep me");

    run.wait_idle().await;
    assert_eq!(session.status().state, EnhancementState::Idle);
}

#[tokio::test(start_paused = true)]
async fn empty_response_falls_back_to_original_text() {
    let generator = DelayedGenerator::new(Duration::from_millis(10), Ok(GeneratedText::default()));
    let sink = Arc::new(RecordingSink::default());
    let session = EnhancementSession::new(generator, EnhancementConfig::default(), "")
        .with_sink(sink.clone());

    let mut run = session.start("as written").unwrap();

    assert_eq!(
        run.outcome().await,
        EnhancementOutcome::Succeeded {
            text: "as written".to_string()
        }
    );
    assert_eq!(*sink.applied.lock().unwrap(), vec!["as written".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn blank_response_also_falls_back_to_original_text() {
    let generator =
        DelayedGenerator::new(Duration::from_millis(10), Ok(GeneratedText::new("  \n ")));
    let session = EnhancementSession::new(generator, EnhancementConfig::default(), "");

    let mut run = session.start("as written").unwrap();

    assert_eq!(
        run.outcome().await,
        EnhancementOutcome::Succeeded {
            text: "as written".to_string()
        }
    );
    assert_eq!(session.draft(), "as written");
}

#[tokio::test]
async fn second_start_is_busy_until_result_hold_ends() {
    let (gate, generator) = gated("polished");
    let session = EnhancementSession::new(generator, fast_config(Duration::from_millis(300)), "");

    let mut run = session.start("rough").unwrap();
    assert_eq!(run.status().state, EnhancementState::Running);
    assert_eq!(
        session.start("again").unwrap_err(),
        EnhanceError::Busy(session.id())
    );

    gate.notify_one();
    assert_eq!(
        run.outcome().await,
        EnhancementOutcome::Succeeded {
            text: "polished".to_string()
        }
    );
    assert!(matches!(session.start("again"), Err(EnhanceError::Busy(_))));

    run.wait_idle().await;
    gate.notify_one();
    let mut second = session.start("again").unwrap();
    assert!(matches!(
        second.outcome().await,
        EnhancementOutcome::Succeeded { .. }
    ));
}

#[tokio::test]
async fn cancelled_run_never_applies_late_result() {
    let (gate, generator) = gated("should not land");
    let sink = Arc::new(RecordingSink::default());
    let session = EnhancementSession::new(generator, fast_config(Duration::from_millis(20)), "")
        .with_sink(sink.clone());

    let mut run = session.start("original").unwrap();
    session.cancel();
    assert_eq!(run.outcome().await, EnhancementOutcome::Cancelled);
    assert_eq!(run.outcome().await.user_message(), None);

    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;
    run.wait_idle().await;

    assert!(sink.applied.lock().unwrap().is_empty());
    assert_eq!(session.draft(), "original");
    assert_eq!(session.status().state, EnhancementState::Idle);

    // The session stays usable; the stored permit releases the next call.
    let mut retry = session.start("original").unwrap();
    assert_eq!(
        retry.outcome().await,
        EnhancementOutcome::Succeeded {
            text: "should not land".to_string()
        }
    );
    assert_eq!(sink.applied.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn closing_session_cancels_run_and_rejects_new_starts() {
    let (gate, generator) = gated("late");
    let sink = Arc::new(RecordingSink::default());
    let session = EnhancementSession::new(generator, fast_config(Duration::from_millis(20)), "")
        .with_sink(sink.clone());

    let mut run = session.start("text").unwrap();
    session.close();
    gate.notify_one();

    assert_eq!(run.outcome().await, EnhancementOutcome::Cancelled);
    assert!(session.is_closed());
    assert_eq!(
        session.start("text").unwrap_err(),
        EnhanceError::SessionClosed(session.id())
    );
    assert!(sink.applied.lock().unwrap().is_empty());
}

#[tokio::test]
async fn result_overwrites_edits_made_while_running() {
    let (gate, generator) = gated("from the model");
    let session = EnhancementSession::new(generator, fast_config(Duration::from_millis(20)), "");

    let mut run = session.start("typed before").unwrap();
    session.set_draft("typed during");
    assert_eq!(session.draft(), "typed during");

    gate.notify_one();
    run.outcome().await;

    assert_eq!(session.draft(), "from the model");
}

#[tokio::test]
async fn sink_failure_marks_run_failed() {
    let (gate, generator) = gated("polished");
    let session = EnhancementSession::new(generator, fast_config(Duration::from_millis(20)), "")
        .with_sink(Arc::new(FailingSink));

    let mut run = session.start("rough").unwrap();
    gate.notify_one();

    assert_eq!(
        run.outcome().await,
        EnhancementOutcome::Failed {
            message: format!("{FAILURE_PREFIX}database is locked")
        }
    );
    assert_eq!(session.draft(), "rough");
}

#[tokio::test]
async fn cancel_during_commit_keeps_draft_in_step_with_sink() {
    let (gate, generator) = gated("committed text");
    let sink = Arc::new(GatedSink::default());
    let session = EnhancementSession::new(generator, fast_config(Duration::from_millis(20)), "")
        .with_sink(sink.clone());

    let mut run = session.start("rough").unwrap();
    gate.notify_one();
    sink.entered.notified().await;
    session.cancel();
    sink.release.notify_one();

    assert_eq!(
        run.outcome().await,
        EnhancementOutcome::Succeeded {
            text: "committed text".to_string()
        }
    );
    assert_eq!(
        *sink.applied.lock().unwrap(),
        vec!["committed text".to_string()]
    );
    assert_eq!(session.draft(), "committed text");
    run.wait_idle().await;
}
