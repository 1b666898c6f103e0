//! Cloneable front end to the session task

use tokio::sync::{broadcast, mpsc, oneshot};

use super::{SessionError, SessionStatus};
use crate::events::StateEvent;
use crate::history::Command;
use crate::transcript::{RecognitionErrorCode, SourceEvent, TranscriptEvent};

/// Messages accepted by the session task
#[derive(Debug)]
pub(crate) enum SessionInput {
    Start {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Transcript(TranscriptEvent),
    /// Recognizer events relayed by a front end
    Source(SourceEvent),
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    History {
        reply: oneshot::Sender<Vec<Command>>,
    },
}

/// Session controls for the IPC server or any other front end
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionInput>,
    event_tx: broadcast::Sender<StateEvent>,
}

impl SessionHandle {
    /// Create a handle and the receiver to pass to [`Session::run`](super::Session::run)
    pub(crate) fn channel(
        event_tx: broadcast::Sender<StateEvent>,
    ) -> (Self, mpsc::Receiver<SessionInput>) {
        let (tx, rx) = mpsc::channel(32);
        (Self { tx, event_tx }, rx)
    }

    /// Turn the microphone on and listen for the wake phrase
    pub async fn start_session(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionInput::Start { reply }).await?;
        rx.await.map_err(|_| SessionError::ActorGone)?
    }

    /// Turn the microphone off, cancelling anything pending
    pub async fn stop_session(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionInput::Stop { reply }).await?;
        rx.await.map_err(|_| SessionError::ActorGone)
    }

    /// Feed a finalized transcript as if the recognizer produced it
    #[cfg(test)]
    pub async fn submit_final_transcript(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.submit_transcript(text, true).await
    }

    pub async fn submit_transcript(
        &self,
        text: impl Into<String>,
        is_final: bool,
    ) -> Result<(), SessionError> {
        self.send(SessionInput::Transcript(TranscriptEvent::new(text, is_final)))
            .await
    }

    /// Relay a recognizer error as if the transcript source reported it
    pub async fn report_recognition_error(
        &self,
        code: RecognitionErrorCode,
    ) -> Result<(), SessionError> {
        self.send(SessionInput::Source(SourceEvent::Error(code))).await
    }

    /// Relay the end of the recognizer's stream
    pub async fn report_stream_end(&self) -> Result<(), SessionError> {
        self.send(SessionInput::Source(SourceEvent::End)).await
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionInput::Status { reply }).await?;
        rx.await.map_err(|_| SessionError::ActorGone)
    }

    /// Recorded commands, newest first
    pub async fn history(&self) -> Result<Vec<Command>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionInput::History { reply }).await?;
        rx.await.map_err(|_| SessionError::ActorGone)
    }

    /// Receive every state event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    async fn send(&self, input: SessionInput) -> Result<(), SessionError> {
        self.tx.send(input).await.map_err(|_| SessionError::ActorGone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_calls_fail_once_session_is_gone() {
        let (event_tx, _) = broadcast::channel(4);
        let (handle, input_rx) = SessionHandle::channel(event_tx);
        drop(input_rx);

        tokio_test::block_on(async {
            assert_eq!(handle.start_session().await, Err(SessionError::ActorGone));
            assert_eq!(
                handle.submit_final_transcript("сатела").await,
                Err(SessionError::ActorGone)
            );
            assert_eq!(handle.status().await, Err(SessionError::ActorGone));
        });
    }

    #[test]
    fn test_status_waits_for_reply() {
        let (event_tx, _) = broadcast::channel(4);
        let (handle, mut input_rx) = SessionHandle::channel(event_tx);

        let mut status = task::spawn(handle.status());
        assert_pending!(status.poll());

        match input_rx.try_recv() {
            Ok(SessionInput::Status { reply }) => {
                let _ = reply.send(SessionStatus::default());
            }
            other => panic!("unexpected input: {other:?}"),
        }

        assert!(status.is_woken());
        let status = assert_ready!(status.poll());
        assert_eq!(status, Ok(SessionStatus::default()));
    }

    #[test]
    fn test_subscribe_sees_later_events() {
        let (event_tx, _) = broadcast::channel(4);
        let (handle, _input_rx) = SessionHandle::channel(event_tx.clone());

        let mut rx = handle.subscribe();
        event_tx.send(StateEvent::SessionStarted).unwrap();
        assert!(matches!(rx.try_recv(), Ok(StateEvent::SessionStarted)));
    }
}
