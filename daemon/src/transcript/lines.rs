//! Line-oriented transcript source
//!
//! Reads recognized text from a byte stream (stdin in the daemon), one
//! recognition turn per line. The reader runs on a dedicated thread for the
//! lifetime of the process; `start`/`stop` only attach and detach the sink.
//!
//! Line format:
//! - `text`: finalized transcript
//! - `~text`: interim transcript, display only
//! - `!code`: recognition error, e.g. `!no-speech`

use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::{debug, info, warn};

use super::event::{RecognitionErrorCode, SourceEvent, TranscriptEvent};
use super::source::{SourceSink, TranscriptSource};
use crate::session::SessionError;

type SharedSink = Arc<Mutex<Option<SourceSink>>>;

/// Transcript source fed by text lines
pub struct LineSource {
    /// Taken by the reader thread on first start
    reader: Option<Box<dyn BufRead + Send>>,
    sink: SharedSink,
    running: Arc<AtomicBool>,
    exhausted: Arc<AtomicBool>,
}

impl LineSource {
    /// Read transcripts from stdin
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }

    pub fn new(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            sink: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            exhausted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if a sink is attached
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl TranscriptSource for LineSource {
    fn start(&mut self, sink: SourceSink) -> Result<(), SessionError> {
        if self.exhausted.load(Ordering::SeqCst) {
            return Err(SessionError::SourceClosed);
        }

        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);

        if let Some(reader) = self.reader.take() {
            let sink = Arc::clone(&self.sink);
            let exhausted = Arc::clone(&self.exhausted);

            thread::Builder::new()
                .name("transcript-reader".to_string())
                .spawn(move || {
                    info!("transcript reader thread started");
                    read_loop(reader, &sink, &exhausted);
                    info!("transcript reader thread stopped");
                })
                .map_err(|e| SessionError::ThreadSpawn(e.to_string()))?;
        }

        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn name(&self) -> &'static str {
        "lines"
    }
}

/// Parse one input line into a source event
pub fn parse_line(line: &str) -> Option<SourceEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(code) = line.strip_prefix('!') {
        return Some(SourceEvent::Error(RecognitionErrorCode::from(code)));
    }

    let event = match line.strip_prefix('~') {
        Some(interim) => TranscriptEvent::interim(interim.trim_start()),
        None => TranscriptEvent::final_text(line),
    };
    Some(SourceEvent::Transcript(event))
}

fn current_sink(sink: &SharedSink) -> Option<SourceSink> {
    sink.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn read_loop(reader: Box<dyn BufRead + Send>, sink: &SharedSink, exhausted: &AtomicBool) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(?e, "failed to read transcript line");
                break;
            }
        };

        let Some(event) = parse_line(&line) else {
            continue;
        };

        // Lines read while no session is listening are dropped
        match current_sink(sink) {
            Some(tx) => {
                if tx.blocking_send(event).is_err() {
                    debug!("transcript sink closed, line dropped");
                }
            }
            None => debug!("microphone off, line dropped"),
        }
    }

    exhausted.store(true, Ordering::SeqCst);
    if let Some(tx) = current_sink(sink) {
        let _ = tx.blocking_send(SourceEvent::End);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::sync::mpsc;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("   "), None);
        assert_eq!(
            parse_line(" Сатела "),
            Some(SourceEvent::Transcript(TranscriptEvent::final_text("Сатела")))
        );
        assert_eq!(
            parse_line("~ кото"),
            Some(SourceEvent::Transcript(TranscriptEvent::interim("кото")))
        );
        assert_eq!(
            parse_line("!no-speech"),
            Some(SourceEvent::Error(RecognitionErrorCode::NoSpeech))
        );
    }

    #[tokio::test]
    async fn test_reads_until_end() {
        let input = Cursor::new("сатела\n\n~котор\nкоторый час\n!network\n");
        let mut source = LineSource::new(input);
        let (tx, mut rx) = mpsc::channel(8);

        source.start(tx).unwrap();
        assert!(source.is_running());

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let end = event == SourceEvent::End;
            events.push(event);
            if end {
                break;
            }
        }

        assert_eq!(
            events,
            vec![
                SourceEvent::Transcript(TranscriptEvent::final_text("сатела")),
                SourceEvent::Transcript(TranscriptEvent::interim("котор")),
                SourceEvent::Transcript(TranscriptEvent::final_text("который час")),
                SourceEvent::Error(RecognitionErrorCode::Network),
                SourceEvent::End,
            ]
        );

        let (tx, _rx) = mpsc::channel(1);
        assert_eq!(source.start(tx), Err(SessionError::SourceClosed));
    }

    #[test]
    fn test_stop_detaches_sink() {
        let mut source = LineSource::new(Cursor::new(""));
        source.stop();
        assert!(!source.is_running());
        assert!(current_sink(&source.sink).is_none());
    }
}
