//! Transcript source abstraction
//!
//! The session owns exactly one source. `start` subscribes it to a fresh
//! sink; `stop` releases the subscription. Events sent after `stop` are
//! never observed because the session drops the matching receiver.

use tokio::sync::mpsc;
use tracing::debug;

use super::event::SourceEvent;
use crate::session::SessionError;

/// Where a source delivers its events
pub type SourceSink = mpsc::Sender<SourceEvent>;

/// A live stream of recognition results
pub trait TranscriptSource: Send {
    /// Subscribe to recognition, delivering events to `sink`
    ///
    /// Calling `start` while running replaces the previous sink.
    fn start(&mut self, sink: SourceSink) -> Result<(), SessionError>;

    /// Release the subscription
    fn stop(&mut self);

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Transcripts arrive only through the session controls
#[derive(Debug, Default)]
pub struct ExternalSource {
    sink: Option<SourceSink>,
}

impl ExternalSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TranscriptSource for ExternalSource {
    fn start(&mut self, sink: SourceSink) -> Result<(), SessionError> {
        debug!("external transcript source subscribed");
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.sink = None;
    }

    fn name(&self) -> &'static str {
        "external"
    }
}

/// No speech recognition available
#[derive(Debug, Default)]
pub struct UnsupportedSource;

impl TranscriptSource for UnsupportedSource {
    fn start(&mut self, _sink: SourceSink) -> Result<(), SessionError> {
        Err(SessionError::UnsupportedEnvironment)
    }

    fn stop(&mut self) {}

    fn name(&self) -> &'static str {
        "unsupported"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    #[test]
    fn test_unsupported_never_starts() {
        let (tx, _rx) = mpsc::channel(1);
        let mut source = UnsupportedSource;
        assert_eq!(source.start(tx), Err(SessionError::UnsupportedEnvironment));
    }

    #[test]
    fn test_external_keeps_channel_open_until_stop() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut source = ExternalSource::new();
        source.start(tx).unwrap();
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        source.stop();
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    }
}
