//! Session actor: the single writer of dialogue state

use std::time::Instant as StdInstant;

use chrono::Local;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::handle::SessionInput;
use super::timers::{TimerKind, Timers};
use super::{SessionError, SessionSettings, SessionStatus};
use crate::config::ConfigError;
use crate::events::{DeactivationReason, StateEvent};
use crate::history::{Command, CommandHistory};
use crate::interpreter::{CommandInterpreter, Interpretation};
use crate::state::{DialogueState, StateMachine};
use crate::synth::ResponseSynthesizer;
use crate::transcript::{RecognitionErrorCode, SourceEvent, TranscriptEvent, TranscriptSource};
use crate::wake::WakeWordDetector;

/// Buffered recognition events per subscription
const SOURCE_CHANNEL_CAPACITY: usize = 64;

/// The command currently between Thinking and Speaking
#[derive(Debug)]
struct PendingReply {
    text: String,
    interpretation: Interpretation,
}

/// Owns all mutable dialogue state; see the module docs of `session`
pub struct Session {
    settings: SessionSettings,
    machine: StateMachine,
    detector: WakeWordDetector,
    interpreter: CommandInterpreter,
    history: CommandHistory,
    source: Box<dyn TranscriptSource>,
    /// Receiver for the current subscription; `None` while the microphone is off
    source_rx: Option<mpsc::Receiver<SourceEvent>>,
    synthesizer: Box<dyn ResponseSynthesizer>,
    timers: Timers,
    pending: Option<PendingReply>,
    session_open: bool,
    current_text: String,
    started_at: StdInstant,
    event_tx: broadcast::Sender<StateEvent>,
}

impl Session {
    pub fn new(
        settings: SessionSettings,
        source: Box<dyn TranscriptSource>,
        synthesizer: Box<dyn ResponseSynthesizer>,
        event_tx: broadcast::Sender<StateEvent>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let detector = WakeWordDetector::new(&settings.wake_phrase)?;

        Ok(Self {
            settings,
            machine: StateMachine::new(event_tx.clone()),
            detector,
            interpreter: CommandInterpreter::new(),
            history: CommandHistory::new(),
            source,
            source_rx: None,
            synthesizer,
            timers: Timers::new(),
            pending: None,
            session_open: false,
            current_text: String::new(),
            started_at: StdInstant::now(),
            event_tx,
        })
    }

    /// Run the session until `cancel` fires or every handle is dropped
    pub(crate) async fn run(mut self, mut input_rx: mpsc::Receiver<SessionInput>, cancel: CancellationToken) {
        info!(source = self.source.name(), "session task started");

        loop {
            let deadline = self.timers.next_deadline();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    self.stop(DeactivationReason::Shutdown);
                    break;
                }

                input = input_rx.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => {
                        self.stop(DeactivationReason::Shutdown);
                        break;
                    }
                },

                event = next_source_event(&mut self.source_rx) => match event {
                    Some(event) => self.handle_source_event(event),
                    None => {
                        debug!("transcript channel closed");
                        self.source_rx = None;
                        self.handle_source_event(SourceEvent::End);
                    }
                },

                _ = wait_until(deadline) => {
                    self.fire_due(Instant::now());
                }
            }
        }

        info!("session task stopped");
    }

    fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Start { reply } => {
                let _ = reply.send(self.start());
            }
            SessionInput::Stop { reply } => {
                self.stop(DeactivationReason::UserStop);
                let _ = reply.send(());
            }
            SessionInput::Transcript(event) => self.handle_transcript(event),
            SessionInput::Source(event) => self.handle_source_event(event),
            SessionInput::Status { reply } => {
                let _ = reply.send(self.status());
            }
            SessionInput::History { reply } => {
                let _ = reply.send(self.history.list().cloned().collect());
            }
        }
    }

    /// Microphone on: subscribe the source and wait for the wake phrase
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.session_open {
            debug!("session already open");
            return Ok(());
        }

        self.subscribe().map_err(|e| {
            warn!(%e, source = self.source.name(), "session could not start");
            e
        })?;

        self.session_open = true;
        info!(phrase = self.detector.phrase(), "session started, waiting for wake phrase");
        self.emit(StateEvent::SessionStarted);
        Ok(())
    }

    /// Microphone off: cancel timers, release the source, force Idle
    pub fn stop(&mut self, reason: DeactivationReason) {
        let cancelled = self.timers.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "pending timers cancelled");
        }
        self.pending = None;
        self.current_text.clear();
        self.machine.deactivate(reason);

        if !self.session_open {
            return;
        }

        self.source.stop();
        self.source_rx = None;
        self.session_open = false;
        info!(%reason, "session stopped");
        self.emit(StateEvent::SessionStopped { reason });
    }

    fn subscribe(&mut self) -> Result<(), SessionError> {
        let (tx, rx) = mpsc::channel(SOURCE_CHANNEL_CAPACITY);
        self.source.start(tx)?;
        self.source_rx = Some(rx);
        Ok(())
    }

    pub fn handle_source_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Transcript(transcript) => self.handle_transcript(transcript),
            SourceEvent::Error(code) => self.handle_recognition_error(code),
            SourceEvent::End => self.resubscribe(),
        }
    }

    /// Interim text only updates the display; final text is acted on
    pub fn handle_transcript(&mut self, event: TranscriptEvent) {
        if !self.session_open {
            debug!("microphone off, transcript ignored");
            return;
        }

        let text = event.text();
        self.current_text.clone_from(&text);
        self.emit(StateEvent::TranscriptUpdated {
            text: text.clone(),
            is_final: event.is_final,
        });

        if event.is_final {
            self.handle_final(text);
        }
    }

    fn handle_final(&mut self, text: String) {
        if !self.machine.is_active() {
            if self.detector.detect(&text) {
                self.activate();
            }
            return;
        }

        if self.machine.state() != DialogueState::Listening {
            debug!(state = %self.machine.state(), text = %text, "command in flight, utterance dropped");
            return;
        }

        let interpretation = self.interpreter.interpret(&text);
        if let Err(e) = self.machine.accept_utterance() {
            warn!(%e, "utterance not accepted");
            return;
        }

        info!(
            text = %text,
            category = %interpretation.category(),
            "command accepted"
        );

        if interpretation.intent.is_deactivation() {
            self.timers
                .schedule(TimerKind::Deactivate, self.settings.deactivation_delay);
        }
        self.timers.schedule(TimerKind::Reply, self.settings.thinking_delay);
        self.pending = Some(PendingReply {
            text,
            interpretation,
        });
    }

    fn activate(&mut self) {
        match self.machine.activate() {
            Ok(()) => {
                self.synthesizer
                    .speak(&self.settings.acknowledgement, &self.settings.locale);
            }
            Err(e) => warn!(%e, "activation rejected"),
        }
    }

    fn handle_recognition_error(&mut self, code: RecognitionErrorCode) {
        self.emit(StateEvent::RecognitionError { code: code.clone() });

        match code {
            RecognitionErrorCode::NoSpeech => match self.machine.state() {
                DialogueState::Thinking | DialogueState::Speaking => {
                    debug!("no speech during an exchange, ignored");
                }
                DialogueState::Idle | DialogueState::Listening => {
                    if self.machine.is_active() {
                        info!("no speech detected, back to wake phrase monitoring");
                    }
                    self.machine.deactivate(DeactivationReason::NoSpeech);
                }
            },
            other => warn!(code = %other, "speech recognition error"),
        }
    }

    /// The recognition stream ended; resubscribe while the microphone is on
    fn resubscribe(&mut self) {
        if !self.session_open {
            return;
        }

        self.source.stop();
        match self.subscribe() {
            Ok(()) => debug!(source = self.source.name(), "transcript source resubscribed"),
            Err(e) => {
                error!(%e, "failed to resubscribe transcript source");
                self.stop(DeactivationReason::SourceClosed);
            }
        }
    }

    /// Fire every timer due at `now`
    pub fn fire_due(&mut self, now: Instant) {
        while let Some(kind) = self.timers.pop_due(now) {
            self.fire(kind);
        }
    }

    fn fire(&mut self, kind: TimerKind) {
        debug!(?kind, "timer fired");
        match kind {
            TimerKind::Reply => self.reply(),
            TimerKind::Resume => {
                if let Err(e) = self.machine.resume_listening() {
                    warn!(%e, "could not resume listening");
                }
            }
            TimerKind::Deactivate => self.stop(DeactivationReason::Farewell),
        }
    }

    fn reply(&mut self) {
        let Some(PendingReply {
            text,
            interpretation,
        }) = self.pending.take()
        else {
            return;
        };

        if let Err(e) = self.machine.begin_speaking() {
            warn!(%e, "reply dropped");
            return;
        }

        self.synthesizer
            .speak(&interpretation.response, &self.settings.locale);

        let command = Command::new(self.history.next_id(), text, interpretation, Local::now());
        info!(
            id = command.id(),
            text = command.text(),
            response = command.response(),
            category = %command.category(),
            at = %command.timestamp().format("%H:%M:%S"),
            "command recorded"
        );
        self.history.append(command.clone());
        self.current_text.clear();
        self.emit(StateEvent::CommandRecorded { command });

        self.timers.schedule(TimerKind::Resume, self.settings.speaking_delay);
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_open: self.session_open,
            active: self.machine.is_active(),
            state: self.machine.state(),
            current_text: self.current_text.clone(),
            history_len: self.history.len(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            ..SessionStatus::default()
        }
    }

    #[cfg(test)]
    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    #[cfg(test)]
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    fn emit(&self, event: StateEvent) {
        let _ = self.event_tx.send(event);
    }
}

async fn next_source_event(rx: &mut Option<mpsc::Receiver<SourceEvent>>) -> Option<SourceEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
