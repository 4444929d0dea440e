//! Session phase state machine.
//!
//! The controller is the only place session progress changes. It performs no
//! I/O: operations that need the network come back to the caller as a
//! [`Command`], and their outcomes are fed back in through
//! [`PhaseController::on_load_finished`] and
//! [`PhaseController::on_submit_finished`].

use std::sync::Arc;

use crate::error::{LoadError, SubmitError, ValidationError};
use crate::loader::LoadState;
use crate::participant::ParticipantId;
use crate::recorder::TrialRecorder;
use crate::stimulus::{Block, Polarity, StimulusSet, WordStimulus};
use crate::submitter::ResultsPayload;
use crate::timer::{Clock, MonotonicClock, ResponseTimer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    AwaitingIdentifier,
    Loading,
    LoadError,
    Intro,
    Instructions,
    Practice,
    PracticeComplete,
    Scored,
    Completed,
}

/// Position inside the active block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// No block has been entered yet.
    NotStarted,
    Showing { index: usize },
    /// Every stimulus of the block has been answered.
    Exhausted,
}

impl Cursor {
    pub fn index(&self) -> Option<usize> {
        match self {
            Cursor::Showing { index } => Some(*index),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCursor {
    pub phase: Phase,
    pub block: Block,
    pub position: Cursor,
}

/// The three logical inputs. Key binding is the caller's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Confirm,
    Positive,
    Negative,
}

impl Signal {
    pub fn polarity(&self) -> Option<Polarity> {
        match self {
            Signal::Confirm => None,
            Signal::Positive => Some(Polarity::Positive),
            Signal::Negative => Some(Polarity::Negative),
        }
    }
}

/// Work the controller needs done outside itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartLoad,
    Submit(ResultsPayload),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    NotStarted,
    InFlight,
    Failed(SubmitError),
    Succeeded,
}

#[derive(Debug)]
pub struct PhaseController<C: Clock = MonotonicClock> {
    cursor: SessionCursor,
    participant: Option<ParticipantId>,
    stimuli: Option<Arc<StimulusSet>>,
    timer: ResponseTimer<C>,
    recorder: TrialRecorder,
    load_state: LoadState,
    load_error: Option<LoadError>,
    submission: SubmissionStatus,
    include_practice: bool,
}

impl<C: Clock> PhaseController<C> {
    /// `include_practice` decides whether practice records are submitted.
    pub fn new(clock: C, include_practice: bool) -> Self {
        Self {
            cursor: SessionCursor {
                phase: Phase::AwaitingIdentifier,
                block: Block::Practice,
                position: Cursor::NotStarted,
            },
            participant: None,
            stimuli: None,
            timer: ResponseTimer::new(clock),
            recorder: TrialRecorder::new(),
            load_state: LoadState::Idle,
            load_error: None,
            submission: SubmissionStatus::NotStarted,
            include_practice,
        }
    }

    pub fn phase(&self) -> Phase {
        self.cursor.phase
    }

    pub fn participant(&self) -> Option<&ParticipantId> {
        self.participant.as_ref()
    }

    pub fn recorder(&self) -> &TrialRecorder {
        &self.recorder
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn load_error(&self) -> Option<&LoadError> {
        self.load_error.as_ref()
    }

    pub fn submission(&self) -> &SubmissionStatus {
        &self.submission
    }

    /// The stimulus on screen, if any.
    pub fn current_stimulus(&self) -> Option<&WordStimulus> {
        let index = self.cursor.position.index()?;
        self.stimuli.as_ref()?.block(self.cursor.block).get(index)
    }

    /// 1-based position and block length, for progress display.
    pub fn progress(&self) -> Option<(usize, usize)> {
        let index = self.cursor.position.index()?;
        let len = self.stimuli.as_ref()?.block(self.cursor.block).len();
        Some((index + 1, len))
    }

    pub fn submit_identifier(&mut self, raw: &str) -> Result<Option<Command>, ValidationError> {
        if self.cursor.phase != Phase::AwaitingIdentifier {
            return Ok(None);
        }
        let id = ParticipantId::parse(raw).map_err(|err| {
            tracing::debug!(error = %err, "identifier rejected");
            err
        })?;
        tracing::info!(participant = %id, "identifier accepted");
        self.participant = Some(id);
        Ok(Some(self.enter_loading()))
    }

    pub fn on_load_progress(&mut self, state: LoadState) {
        if self.cursor.phase == Phase::Loading {
            self.load_state = state;
        }
    }

    pub fn on_load_finished(&mut self, result: Result<StimulusSet, LoadError>) {
        if self.cursor.phase != Phase::Loading {
            tracing::debug!(phase = %self.cursor.phase, "ignoring stale load outcome");
            return;
        }
        match result {
            Ok(set) => {
                self.stimuli = Some(Arc::new(set));
                self.load_state = LoadState::Idle;
                self.load_error = None;
                self.transition(Phase::Intro);
            }
            Err(LoadError::Cancelled) => {
                tracing::debug!("load cancelled");
            }
            Err(err) => {
                self.load_state = LoadState::Failed;
                self.load_error = Some(err);
                self.transition(Phase::LoadError);
            }
        }
    }

    /// Manual re-trigger after the automatic retries ran out.
    pub fn retry_load(&mut self) -> Option<Command> {
        if self.cursor.phase != Phase::LoadError {
            return None;
        }
        tracing::info!("manual load retry");
        Some(self.enter_loading())
    }

    pub fn signal(&mut self, signal: Signal) -> Option<Command> {
        match (self.cursor.phase, signal) {
            (Phase::LoadError, Signal::Confirm) => self.retry_load(),
            (Phase::Intro, Signal::Confirm) => {
                self.transition(Phase::Instructions);
                None
            }
            (Phase::Instructions, Signal::Confirm) => self.begin_block(Block::Practice),
            (Phase::PracticeComplete, Signal::Confirm) => self.begin_block(Block::Scored),
            (Phase::Practice | Phase::Scored, Signal::Positive | Signal::Negative) => {
                signal.polarity().and_then(|p| self.respond(p))
            }
            (phase, signal) => {
                tracing::trace!(%phase, ?signal, "signal ignored");
                None
            }
        }
    }

    /// Operator-initiated resubmission after a failed submission.
    pub fn resubmit(&mut self) -> Result<Command, SubmitError> {
        match self.submission {
            SubmissionStatus::InFlight => Err(SubmitError::InFlight),
            SubmissionStatus::Failed(_) => self.start_submission().ok_or(SubmitError::NotReady),
            _ => Err(SubmitError::NotReady),
        }
    }

    pub fn on_submit_finished(&mut self, result: Result<(), SubmitError>) {
        if self.submission != SubmissionStatus::InFlight {
            tracing::debug!("ignoring unexpected submission outcome");
            return;
        }
        match result {
            Ok(()) => {
                self.submission = SubmissionStatus::Succeeded;
                self.transition(Phase::Completed);
            }
            Err(err) => {
                self.submission = SubmissionStatus::Failed(err);
            }
        }
    }

    /// The payload a submission would send right now.
    pub fn payload(&self) -> Option<ResultsPayload> {
        let participant = self.participant.as_ref()?;
        let records = if self.include_practice {
            self.recorder.all()
        } else {
            self.recorder.from_block(Block::Scored)
        };
        Some(ResultsPayload::new(participant, records))
    }

    fn enter_loading(&mut self) -> Command {
        self.load_state = LoadState::Loading;
        self.load_error = None;
        self.transition(Phase::Loading);
        Command::StartLoad
    }

    fn begin_block(&mut self, block: Block) -> Option<Command> {
        let len = self.stimuli.as_ref().map_or(0, |s| s.block(block).len());
        self.cursor.block = block;
        self.transition(match block {
            Block::Practice => Phase::Practice,
            Block::Scored => Phase::Scored,
        });

        if len == 0 {
            return self.exhaust();
        }
        self.cursor.position = Cursor::Showing { index: 0 };
        self.timer.on_stimulus_shown();
        None
    }

    fn respond(&mut self, response: Polarity) -> Option<Command> {
        let index = self.cursor.position.index()?;
        let stimuli = Arc::clone(self.stimuli.as_ref()?);
        let words = stimuli.block(self.cursor.block);
        let stimulus = words.get(index)?;

        let latency_ms = match self.timer.on_response() {
            Ok(ms) => ms,
            Err(err) => {
                tracing::warn!(error = %err, "response without onset ignored");
                return None;
            }
        };
        let record = self
            .recorder
            .record(self.cursor.block, stimulus, response, latency_ms);
        tracing::debug!(
            block = %self.cursor.block,
            index,
            word = %record.word,
            response = %record.response,
            latency_ms,
            "response recorded"
        );

        if index + 1 < words.len() {
            self.cursor.position = Cursor::Showing { index: index + 1 };
            self.timer.on_stimulus_shown();
            None
        } else {
            self.exhaust()
        }
    }

    fn exhaust(&mut self) -> Option<Command> {
        self.cursor.position = Cursor::Exhausted;
        self.timer.clear();
        match self.cursor.block {
            Block::Practice => {
                self.transition(Phase::PracticeComplete);
                None
            }
            Block::Scored => self.start_submission(),
        }
    }

    fn start_submission(&mut self) -> Option<Command> {
        let ready = self.cursor.phase == Phase::Scored
            && self.cursor.position == Cursor::Exhausted
            && matches!(
                self.submission,
                SubmissionStatus::NotStarted | SubmissionStatus::Failed(_)
            );
        if !ready {
            return None;
        }
        let payload = self.payload()?;
        self.submission = SubmissionStatus::InFlight;
        Some(Command::Submit(payload))
    }

    fn transition(&mut self, to: Phase) {
        tracing::debug!(from = %self.cursor.phase, %to, "phase transition");
        self.cursor.phase = to;
    }
}
