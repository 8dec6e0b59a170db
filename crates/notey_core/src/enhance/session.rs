//! Per-session enhancement controller.
//!
//! # Responsibility
//! - Run at most one enhancement per editing session.
//! - Drive the external call and the progress simulator concurrently under
//!   one cancellation token, then reconcile a single terminal outcome.
//!
//! # Invariants
//! - `start` is rejected unless the session is `Idle`.
//! - A run cancelled before its result is committed never touches the draft
//!   or the sink. Commit starts when the sink is entered; from then on the
//!   run finishes as `Succeeded` or `Failed` so the draft matches the sink.
//! - Progress is `1.0` only together with a `Succeeded`/`Failed` state.

use super::generator::{GenerationError, TextGenerator};
use super::progress::simulate_progress;
use super::{
    build_prompt, failure_message, EnhanceError, EnhancementOutcome, EnhancementState,
    EnhancementStatus, SessionId, SUCCESS_MESSAGE,
};
use crate::config::EnhancementConfig;
use async_trait::async_trait;
use log::{info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Destination for successfully enhanced text (e.g. the stored note).
#[async_trait]
pub trait EnhancementSink: Send + Sync {
    /// Persists `text`; an error turns the run into `Failed`.
    async fn apply(&self, text: &str) -> Result<(), String>;
}

/// One note-editing session and its draft description.
pub struct EnhancementSession {
    id: SessionId,
    generator: Arc<dyn TextGenerator>,
    sink: Option<Arc<dyn EnhancementSink>>,
    config: EnhancementConfig,
    status: Arc<watch::Sender<EnhancementStatus>>,
    draft: Arc<Mutex<String>>,
    active: Mutex<Option<CancellationToken>>,
    session_token: CancellationToken,
}

impl EnhancementSession {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        config: EnhancementConfig,
        draft: impl Into<String>,
    ) -> Self {
        let (status, _) = watch::channel(EnhancementStatus::idle());
        Self {
            id: Uuid::new_v4(),
            generator,
            sink: None,
            config,
            status: Arc::new(status),
            draft: Arc::new(Mutex::new(draft.into())),
            active: Mutex::new(None),
            session_token: CancellationToken::new(),
        }
    }

    /// Routes successful results to `sink` in addition to the draft.
    pub fn with_sink(mut self, sink: Arc<dyn EnhancementSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn draft(&self) -> String {
        self.draft
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records a user edit. A result arriving later still overwrites it.
    pub fn set_draft(&self, text: impl Into<String>) {
        *self.draft.lock().unwrap_or_else(PoisonError::into_inner) = text.into();
    }

    pub fn status(&self) -> EnhancementStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<EnhancementStatus> {
        self.status.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.session_token.is_cancelled()
    }

    /// Starts enhancing `original_text`, which also becomes the draft.
    ///
    /// The run is spawned on the Tokio runtime of the calling thread.
    ///
    /// # Errors
    /// - `Busy` while a previous run has not returned to `Idle`.
    /// - `SessionClosed` after [`EnhancementSession::close`].
    /// - `NoRuntime` when called outside a Tokio runtime; state is unchanged.
    pub fn start(&self, original_text: impl Into<String>) -> Result<EnhancementRun, EnhanceError> {
        if self.is_closed() {
            return Err(EnhanceError::SessionClosed(self.id));
        }
        let runtime = Handle::try_current().map_err(|_| EnhanceError::NoRuntime)?;

        let accepted = self.status.send_if_modified(|status| {
            if status.state != EnhancementState::Idle {
                return false;
            }
            *status = EnhancementStatus::running();
            true
        });
        if !accepted {
            warn!(
                "event=enhance_start module=enhance status=busy session_id={}",
                self.id
            );
            return Err(EnhanceError::Busy(self.id));
        }

        let original = original_text.into();
        self.set_draft(original.clone());

        let token = self.session_token.child_token();
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());

        let status_rx = self.status.subscribe();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let job = EnhancementJob {
            session_id: self.id,
            generator: Arc::clone(&self.generator),
            sink: self.sink.clone(),
            config: self.config.clone(),
            status: Arc::clone(&self.status),
            draft: Arc::clone(&self.draft),
            token,
            original,
        };
        runtime.spawn(job.run(outcome_tx));

        Ok(EnhancementRun {
            session_id: self.id,
            status: status_rx,
            pending: Some(outcome_rx),
            resolved: None,
        })
    }

    /// Cancels the in-flight run, if any. The session stays usable.
    pub fn cancel(&self) {
        if let Some(token) = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }

    /// Ends the session: cancels any run and rejects future starts.
    pub fn close(&self) {
        self.session_token.cancel();
    }
}

impl Drop for EnhancementSession {
    fn drop(&mut self) {
        self.session_token.cancel();
    }
}

/// Observable handle for one enhancement run.
#[derive(Debug)]
pub struct EnhancementRun {
    session_id: SessionId,
    status: watch::Receiver<EnhancementStatus>,
    pending: Option<oneshot::Receiver<EnhancementOutcome>>,
    resolved: Option<EnhancementOutcome>,
}

impl EnhancementRun {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn status(&self) -> EnhancementStatus {
        self.status.borrow().clone()
    }

    pub fn progress(&self) -> f32 {
        self.status.borrow().progress
    }

    /// Waits for the next status change; `None` once the session is gone.
    pub async fn changed(&mut self) -> Option<EnhancementStatus> {
        self.status.changed().await.ok()?;
        Some(self.status.borrow_and_update().clone())
    }

    /// Waits for the terminal outcome of this run. Safe to call repeatedly.
    pub async fn outcome(&mut self) -> EnhancementOutcome {
        if let Some(outcome) = &self.resolved {
            return outcome.clone();
        }
        let outcome = match self.pending.take() {
            Some(rx) => rx.await.unwrap_or(EnhancementOutcome::Cancelled),
            None => EnhancementOutcome::Cancelled,
        };
        self.resolved = Some(outcome.clone());
        outcome
    }

    /// Waits until the session is back to `Idle` (or gone).
    pub async fn wait_idle(&mut self) {
        while self.status.borrow_and_update().state != EnhancementState::Idle {
            if self.status.changed().await.is_err() {
                return;
            }
        }
    }
}

struct EnhancementJob {
    session_id: SessionId,
    generator: Arc<dyn TextGenerator>,
    sink: Option<Arc<dyn EnhancementSink>>,
    config: EnhancementConfig,
    status: Arc<watch::Sender<EnhancementStatus>>,
    draft: Arc<Mutex<String>>,
    token: CancellationToken,
    original: String,
}

impl EnhancementJob {
    async fn run(self, outcome_tx: oneshot::Sender<EnhancementOutcome>) {
        info!(
            "event=enhance_start module=enhance status=start session_id={} chars={}",
            self.session_id,
            self.original.chars().count()
        );

        let simulator_token = self.token.child_token();
        let simulator = {
            let status = Arc::clone(&self.status);
            let token = simulator_token.clone();
            let plan = self.config.progress;
            tokio::spawn(async move { simulate_progress(&status, token, plan).await })
        };

        let prompt = build_prompt(&self.original);
        let call = tokio::time::timeout(self.config.call_timeout, self.generator.generate(&prompt));
        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            result = call => Some(result),
        };

        simulator_token.cancel();
        let _ = simulator.await;

        let outcome = match result {
            None => EnhancementOutcome::Cancelled,
            Some(Err(_elapsed)) => self.failed(GenerationError::Timeout(self.config.call_timeout)),
            Some(Ok(Err(err))) => self.failed(err),
            Some(Ok(Ok(generated))) => {
                let text = generated
                    .usable_text()
                    .unwrap_or_else(|| self.original.clone());
                self.commit(text).await
            }
        };

        self.finish(outcome, outcome_tx).await;
    }

    fn failed(&self, err: GenerationError) -> EnhancementOutcome {
        warn!(
            "event=enhance_call module=enhance status=error session_id={} error_code={}",
            self.session_id,
            err.code()
        );
        EnhancementOutcome::Failed {
            message: failure_message(&err.to_string()),
        }
    }

    /// Last cancellation check; past it the sink and draft are written
    /// together even if the token fires while the sink is awaited.
    async fn commit(&self, text: String) -> EnhancementOutcome {
        if self.token.is_cancelled() {
            return EnhancementOutcome::Cancelled;
        }

        if let Some(sink) = &self.sink {
            if let Err(detail) = sink.apply(&text).await {
                warn!(
                    "event=enhance_commit module=enhance status=error session_id={} error_code=sink_failed",
                    self.session_id
                );
                return EnhancementOutcome::Failed {
                    message: failure_message(&detail),
                };
            }
        }

        *self.draft.lock().unwrap_or_else(PoisonError::into_inner) = text.clone();
        EnhancementOutcome::Succeeded { text }
    }

    async fn finish(self, outcome: EnhancementOutcome, outcome_tx: oneshot::Sender<EnhancementOutcome>) {
        let terminal = match &outcome {
            EnhancementOutcome::Succeeded { .. } => EnhancementStatus {
                state: EnhancementState::Succeeded,
                progress: 1.0,
                message: Some(SUCCESS_MESSAGE.to_string()),
            },
            EnhancementOutcome::Failed { message } => EnhancementStatus {
                state: EnhancementState::Failed,
                progress: 1.0,
                message: Some(message.clone()),
            },
            EnhancementOutcome::Cancelled => EnhancementStatus {
                state: EnhancementState::Cancelled,
                progress: self.status.borrow().progress,
                message: None,
            },
        };
        let hold = terminal.state != EnhancementState::Cancelled;

        info!(
            "event=enhance_finish module=enhance status={} session_id={}",
            terminal.state.as_str(),
            self.session_id
        );
        self.status.send_replace(terminal);
        let _ = outcome_tx.send(outcome);

        if hold {
            tokio::select! {
                _ = self.token.cancelled() => {}
                _ = tokio::time::sleep(self.config.result_hold) => {}
            }
        }

        self.status.send_replace(EnhancementStatus::idle());
    }
}
