//! Unix domain socket server for IPC
//!
//! Provides request-response access to the session controls and push
//! notifications of state events to subscribed clients.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::unix::OwnedReadHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::events::StateEvent;
use crate::session::{SessionError, SessionHandle};

use super::protocol::{Notification, Request, Response, MAX_MESSAGE_LEN};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    session: SessionHandle,
    shutdown_tx: broadcast::Sender<()>,
}

/// A decoded request, or why decoding failed
type Incoming = std::result::Result<Request, String>;

impl Server {
    /// Create a new IPC server
    pub fn new(socket_path: &Path, session: SessionHandle) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path)
            .context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            session,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref()
            .context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let session = self.session.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, session) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    ///
    /// Frames are read on a separate task so that pushing notifications
    /// never interrupts a partially read request.
    async fn handle_client(stream: UnixStream, session: SessionHandle) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let (request_tx, mut request_rx) = mpsc::channel::<Incoming>(8);
        let reader_task = tokio::spawn(Self::read_requests(reader, request_tx));

        let mut events: Option<broadcast::Receiver<StateEvent>> = None;

        let result = loop {
            tokio::select! {
                incoming = request_rx.recv() => {
                    let Some(incoming) = incoming else {
                        debug!("client disconnected");
                        break Ok(());
                    };

                    let response = match incoming {
                        Ok(request) => {
                            debug!(?request, "received request");
                            if matches!(request, Request::Subscribe) && events.is_none() {
                                events = Some(session.subscribe());
                                debug!("client subscribed to notifications");
                            }
                            Self::process_request(request, &session).await
                        }
                        Err(message) => Response::error("bad_request", message),
                    };

                    if let Err(e) = Self::send_message(&mut writer, &response).await {
                        break Err(e);
                    }
                }

                event = next_event(&mut events) => {
                    let notification = Notification::StateEvent { event };
                    if let Err(e) = Self::send_message(&mut writer, &notification).await {
                        break Err(e);
                    }
                }
            }
        };

        reader_task.abort();
        result
    }

    /// Read length-prefixed requests until EOF or a framing error
    async fn read_requests(mut reader: OwnedReadHalf, request_tx: mpsc::Sender<Incoming>) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_MESSAGE_LEN {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            reader.read_exact(&mut msg_buf).await?;

            let incoming = serde_json::from_slice::<Request>(&msg_buf).map_err(|e| e.to_string());
            if request_tx.send(incoming).await.is_err() {
                return Ok(());
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<W, T>(stream: &mut W, msg: &T) -> Result<()>
    where
        W: AsyncWrite + Unpin,
        T: serde::Serialize,
    {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        stream.write_all(&msg_len).await?;
        stream.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    async fn process_request(request: Request, session: &SessionHandle) -> Response {
        let result = match request {
            Request::Ping => Ok(Response::Pong),

            Request::GetStatus => session.status().await.map(Response::Status),

            Request::StartSession => {
                session.start_session().await.map(|()| Response::SessionStarted)
            }

            Request::StopSession => {
                session.stop_session().await.map(|()| Response::SessionStopped)
            }

            Request::SubmitTranscript { text, is_final } => session
                .submit_transcript(text, is_final)
                .await
                .map(|()| Response::Accepted),

            Request::ReportRecognitionError { code } => session
                .report_recognition_error(code)
                .await
                .map(|()| Response::Accepted),

            Request::ReportStreamEnd => session
                .report_stream_end()
                .await
                .map(|()| Response::Accepted),

            Request::ListHistory => session
                .history()
                .await
                .map(|commands| Response::History { commands }),

            Request::Subscribe => Ok(Response::Subscribed),
        };

        result.unwrap_or_else(|e| {
            warn!(%e, "request failed");
            Response::error(error_code(&e), e)
        })
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

fn error_code(error: &SessionError) -> &'static str {
    match error {
        SessionError::UnsupportedEnvironment => "unsupported_environment",
        SessionError::SourceClosed => "source_closed",
        SessionError::ThreadSpawn(_) => "source_failed",
        SessionError::ActorGone => "session_gone",
    }
}

async fn next_event(events: &mut Option<broadcast::Receiver<StateEvent>>) -> StateEvent {
    let Some(rx) = events else {
        return std::future::pending().await;
    };

    loop {
        match rx.recv().await {
            Ok(event) => return event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "notification receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Command;
    use crate::session::{Session, SessionSettings, SessionStatus};
    use crate::state::DialogueState;
    use crate::synth::LogSynthesizer;
    use crate::transcript::{
        ExternalSource, RecognitionErrorCode, TranscriptSource, UnsupportedSource,
    };
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        _dir: tempfile::TempDir,
        socket_path: PathBuf,
        server: Arc<Server>,
        cancel: CancellationToken,
    }

    fn spawn_daemon(source: Box<dyn TranscriptSource>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("daemon.sock");

        let (event_tx, _) = broadcast::channel(64);
        let session = Session::new(
            SessionSettings::default(),
            source,
            Box::new(LogSynthesizer),
            event_tx.clone(),
        )
        .unwrap();
        let (handle, input_rx) = SessionHandle::channel(event_tx);
        let cancel = CancellationToken::new();
        tokio::spawn(session.run(input_rx, cancel.clone()));

        let server = Arc::new(Server::new(&socket_path, handle).unwrap());
        let runner = Arc::clone(&server);
        tokio::spawn(async move { runner.run().await });

        Fixture {
            _dir: dir,
            socket_path,
            server,
            cancel,
        }
    }

    async fn call(stream: &mut UnixStream, request: &Request) -> serde_json::Value {
        Server::send_message(stream, request).await.unwrap();
        read_frame(stream).await
    }

    async fn read_frame(stream: &mut UnixStream) -> serde_json::Value {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let mut body = vec![0u8; u32::from_le_bytes(len_buf) as usize];
        stream.read_exact(&mut body).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_status() {
        let fx = spawn_daemon(Box::new(ExternalSource::new()));
        let mut stream = UnixStream::connect(&fx.socket_path).await.unwrap();

        let pong = call(&mut stream, &Request::Ping).await;
        assert_eq!(pong["type"], "pong");

        let status = call(&mut stream, &Request::GetStatus).await;
        let status: SessionStatus = serde_json::from_value(status).unwrap();
        assert!(!status.session_open);
        assert_eq!(status.state, DialogueState::Idle);

        fx.cancel.cancel();
        fx.server.shutdown().await;
        assert!(!fx.socket_path.exists());
    }

    #[tokio::test]
    async fn test_session_controls() {
        let fx = spawn_daemon(Box::new(ExternalSource::new()));
        let mut stream = UnixStream::connect(&fx.socket_path).await.unwrap();

        let started = call(&mut stream, &Request::StartSession).await;
        assert_eq!(started["type"], "session_started");

        let accepted = call(
            &mut stream,
            &Request::SubmitTranscript {
                text: "Сатела".to_string(),
                is_final: true,
            },
        )
        .await;
        assert_eq!(accepted["type"], "accepted");

        let status = call(&mut stream, &Request::GetStatus).await;
        assert_eq!(status["active"], true);
        assert_eq!(status["state"], "listening");

        let history = call(&mut stream, &Request::ListHistory).await;
        assert_eq!(history["type"], "history");
        let commands: Vec<Command> = serde_json::from_value(history["commands"].clone()).unwrap();
        assert!(commands.is_empty());

        let stopped = call(&mut stream, &Request::StopSession).await;
        assert_eq!(stopped["type"], "session_stopped");

        let status = call(&mut stream, &Request::GetStatus).await;
        assert_eq!(status["active"], false);
        assert_eq!(status["session_open"], false);

        fx.cancel.cancel();
    }

    #[tokio::test]
    async fn test_relayed_no_speech_returns_to_wake_monitoring() {
        let fx = spawn_daemon(Box::new(ExternalSource::new()));
        let mut stream = UnixStream::connect(&fx.socket_path).await.unwrap();

        call(&mut stream, &Request::StartSession).await;
        call(
            &mut stream,
            &Request::SubmitTranscript {
                text: "сатела".to_string(),
                is_final: true,
            },
        )
        .await;

        let accepted = call(
            &mut stream,
            &Request::ReportRecognitionError {
                code: RecognitionErrorCode::NoSpeech,
            },
        )
        .await;
        assert_eq!(accepted["type"], "accepted");

        let status = call(&mut stream, &Request::GetStatus).await;
        assert_eq!(status["active"], false);
        assert_eq!(status["state"], "idle");
        assert_eq!(status["session_open"], true);

        let accepted = call(&mut stream, &Request::ReportStreamEnd).await;
        assert_eq!(accepted["type"], "accepted");
        let status = call(&mut stream, &Request::GetStatus).await;
        assert_eq!(status["session_open"], true);

        fx.cancel.cancel();
    }

    #[tokio::test]
    async fn test_unsupported_environment_reported() {
        let fx = spawn_daemon(Box::new(UnsupportedSource));
        let mut stream = UnixStream::connect(&fx.socket_path).await.unwrap();

        let response = call(&mut stream, &Request::StartSession).await;
        assert_eq!(response["type"], "error");
        assert_eq!(response["code"], "unsupported_environment");

        let pong = call(&mut stream, &Request::Ping).await;
        assert_eq!(pong["type"], "pong");

        fx.cancel.cancel();
    }

    #[tokio::test]
    async fn test_bad_request_keeps_connection() {
        let fx = spawn_daemon(Box::new(ExternalSource::new()));
        let mut stream = UnixStream::connect(&fx.socket_path).await.unwrap();

        let body = br#"{"type":"launch_rockets"}"#;
        stream.write_all(&(body.len() as u32).to_le_bytes()).await.unwrap();
        stream.write_all(body).await.unwrap();
        let response = read_frame(&mut stream).await;
        assert_eq!(response["type"], "error");
        assert_eq!(response["code"], "bad_request");

        let pong = call(&mut stream, &Request::Ping).await;
        assert_eq!(pong["type"], "pong");

        fx.cancel.cancel();
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let fx = spawn_daemon(Box::new(ExternalSource::new()));
        let mut stream = UnixStream::connect(&fx.socket_path).await.unwrap();

        let subscribed = call(&mut stream, &Request::Subscribe).await;
        assert_eq!(subscribed["type"], "subscribed");

        let started = call(&mut stream, &Request::StartSession).await;
        // The session_started event may be pushed before or after the reply
        let mut frames = vec![started, read_frame(&mut stream).await];
        frames.sort_by_key(|f| f["type"] != "session_started");

        assert_eq!(frames[0]["type"], "session_started");
        assert_eq!(frames[1]["type"], "state_event");
        assert_eq!(frames[1]["event"]["type"], "session_started");

        fx.cancel.cancel();
    }
}
