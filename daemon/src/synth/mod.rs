//! Response synthesizer seam
//!
//! Speaking is fire-and-forget: the session never waits for audio.

use std::process::Stdio;

use tracing::{info, warn};

/// Renders response text as speech
pub trait ResponseSynthesizer: Send {
    fn speak(&self, text: &str, locale: &str);
}

/// Logs what would be spoken
#[derive(Debug, Default)]
pub struct LogSynthesizer;

impl ResponseSynthesizer for LogSynthesizer {
    fn speak(&self, text: &str, locale: &str) {
        info!(locale, text, "speaking");
    }
}

/// Speaks through an external program, e.g. `espeak -v ru`
///
/// The text is passed as the last argument and the locale as
/// `SATELA_LOCALE`. The child is not awaited.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
}

impl CommandSynthesizer {
    /// Split a whitespace-separated command line; `None` if it is empty
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl ResponseSynthesizer for CommandSynthesizer {
    fn speak(&self, text: &str, locale: &str) {
        let spawned = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .env("SATELA_LOCALE", locale)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(_child) => info!(program = %self.program, text, "speaking"),
            Err(e) => warn!(?e, program = %self.program, "failed to start synthesizer"),
        }
    }
}
