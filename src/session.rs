use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::backup::ResultsBackup;
use crate::error::{LoadError, SubmitError, ValidationError};
use crate::loader::{RetryPolicy, SessionLoader, WordSource};
use crate::phase::{Command, PhaseController, Signal, SubmissionStatus};
use crate::runtime::SessionEvent;
use crate::stimulus::StimulusSet;
use crate::submitter::{ResultsPayload, ResultsSink, ResultsSubmitter};
use crate::timer::{Clock, MonotonicClock};

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub include_practice: bool,
    pub retry: RetryPolicy,
    /// Where failed submissions are written; `None` disables backups.
    pub backup_dir: Option<PathBuf>,
}

/// One participant's session.
///
/// Owns the phase controller and carries out its commands: network work is
/// spawned onto `runtime`, and each outcome is posted back to `events` so it
/// is applied on the same path as keyboard input. Dropping the session
/// cancels anything still pending.
pub struct Session<S, R, C: Clock = MonotonicClock> {
    controller: PhaseController<C>,
    loader: Arc<SessionLoader<S>>,
    submitter: Arc<ResultsSubmitter<R>>,
    backup: Option<ResultsBackup>,
    runtime: Handle,
    events: Sender<SessionEvent>,
    teardown: CancellationToken,
    load_cancel: Option<CancellationToken>,
    notice: Option<String>,
}

impl<S, R, C> Session<S, R, C>
where
    S: WordSource + 'static,
    R: ResultsSink + 'static,
    C: Clock,
{
    pub fn new(
        config: SessionConfig,
        source: S,
        sink: R,
        clock: C,
        runtime: Handle,
        events: Sender<SessionEvent>,
    ) -> Self {
        Self {
            controller: PhaseController::new(clock, config.include_practice),
            loader: Arc::new(SessionLoader::new(source, config.retry)),
            submitter: Arc::new(ResultsSubmitter::new(sink)),
            backup: config.backup_dir.map(ResultsBackup::new),
            runtime,
            events,
            teardown: CancellationToken::new(),
            load_cancel: None,
            notice: None,
        }
    }

    pub fn controller(&self) -> &PhaseController<C> {
        &self.controller
    }

    /// Operator-facing message from the last failure, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn submit_identifier(&mut self, raw: &str) -> Result<(), ValidationError> {
        match self.controller.submit_identifier(raw) {
            Ok(cmd) => {
                self.notice = None;
                self.execute(cmd);
                Ok(())
            }
            Err(err) => {
                self.notice = Some("Please enter a valid email address".to_string());
                Err(err)
            }
        }
    }

    pub fn signal(&mut self, signal: Signal) {
        let cmd = self.controller.signal(signal);
        self.execute(cmd);
    }

    pub fn retry_load(&mut self) {
        let cmd = self.controller.retry_load();
        self.execute(cmd);
    }

    pub fn resubmit(&mut self) -> Result<(), SubmitError> {
        let cmd = self.controller.resubmit()?;
        self.notice = None;
        self.execute(Some(cmd));
        Ok(())
    }

    /// Applies network completions. Terminal events are left to the caller.
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::LoadProgress(state) => self.controller.on_load_progress(state),
            SessionEvent::Loaded(result) => self.on_loaded(result),
            SessionEvent::Submitted(result) => self.on_submitted(result),
            SessionEvent::Key(_) | SessionEvent::Resize | SessionEvent::Tick => {}
        }
    }

    fn on_loaded(&mut self, result: Result<StimulusSet, LoadError>) {
        self.load_cancel = None;
        self.controller.on_load_finished(result);
    }

    fn on_submitted(&mut self, result: Result<(), SubmitError>) {
        let failure = result.as_ref().err().cloned();
        self.controller.on_submit_finished(result);

        if let Some(err) = failure {
            let mut notice = format!("Error saving results: {err}. Press r to retry.");
            if let Some(path) = self.write_backup() {
                notice.push_str(&format!(" A copy was saved to {}", path.display()));
            }
            self.notice = Some(notice);
        }
    }

    fn execute(&mut self, cmd: Option<Command>) {
        match cmd {
            Some(Command::StartLoad) => self.start_load(),
            Some(Command::Submit(payload)) => self.start_submit(payload),
            None => {}
        }
    }

    fn start_load(&mut self) {
        let token = self.teardown.child_token();
        if let Some(previous) = self.load_cancel.replace(token.clone()) {
            previous.cancel();
        }

        let loader = Arc::clone(&self.loader);
        let tx = self.events.clone();
        self.runtime.spawn(async move {
            let progress = tx.clone();
            let result = loader
                .load(&token, move |state| {
                    let _ = progress.send(SessionEvent::LoadProgress(state));
                })
                .await;

            if token.is_cancelled() || matches!(result, Err(LoadError::Cancelled)) {
                return;
            }
            let _ = tx.send(SessionEvent::Loaded(result));
        });
    }

    fn start_submit(&mut self, payload: ResultsPayload) {
        let token = self.teardown.child_token();
        let submitter = Arc::clone(&self.submitter);
        let tx = self.events.clone();
        self.runtime.spawn(async move {
            let result = tokio::select! {
                biased;
                () = token.cancelled() => return,
                result = submitter.submit(&payload) => result,
            };
            let _ = tx.send(SessionEvent::Submitted(result));
        });
    }
}

impl<S, R, C: Clock> Session<S, R, C> {
    /// Cancels pending loads and submissions. Late completions are dropped.
    ///
    /// A submission still in flight is abandoned, so its records are backed
    /// up first. Calling this more than once is a no-op.
    pub fn teardown(&mut self) {
        if self.teardown.is_cancelled() {
            return;
        }
        self.teardown.cancel();

        if *self.controller.submission() == SubmissionStatus::InFlight {
            match self.write_backup() {
                Some(path) => {
                    tracing::warn!(path = %path.display(), "submission abandoned, results backed up");
                }
                None => match self.controller.payload() {
                    Some(payload) => tracing::warn!(
                        payload = %serde_json::to_string(&payload).unwrap_or_default(),
                        "submission abandoned without a backup"
                    ),
                    None => tracing::warn!("submission abandoned without a payload"),
                },
            }
        }
    }

    fn write_backup(&self) -> Option<PathBuf> {
        let backup = self.backup.as_ref()?;
        let payload = self.controller.payload()?;
        match backup.write(&payload) {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::error!(error = %err, dir = %backup.dir().display(), "results backup failed");
                None
            }
        }
    }
}

impl<S, R, C: Clock> Drop for Session<S, R, C> {
    fn drop(&mut self) {
        self.teardown();
    }
}
