//! On-device speech synthesis through an installed eSpeak program.

use super::queue::UtteranceQueue;
use super::{Capabilities, SpeechBackend, SpeechError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::debug;

/// Programs tried, in order, by [`CommandSpeechBackend::detect`].
pub const CANDIDATES: [&str; 2] = ["espeak-ng", "espeak"];

/// eSpeak voice for Arabic.
pub const ARABIC_VOICE: &str = "ar";

/// Speaks by spawning a command-line synthesizer, one utterance at a time.
/// Cannot recognize speech.
#[derive(Debug)]
pub struct CommandSpeechBackend {
    program: PathBuf,
    voice: String,
    queue: UtteranceQueue,
}

impl CommandSpeechBackend {
    pub fn new(program: impl Into<PathBuf>, voice: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            voice: voice.into(),
            queue: UtteranceQueue::new(),
        }
    }

    /// Looks for a synthesizer on `PATH`.
    pub fn detect() -> Option<Self> {
        CANDIDATES.iter().find_map(|name| match which::which(name) {
            Ok(path) => {
                debug!(program = %path.display(), "Found local speech synthesizer");
                Some(Self::new(path, ARABIC_VOICE))
            }
            Err(_) => None,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

fn command_args(voice: &str, text: &str) -> [String; 3] {
    ["-v".to_string(), voice.to_string(), text.to_string()]
}

#[async_trait]
impl SpeechBackend for CommandSpeechBackend {
    fn name(&self) -> &'static str {
        "command"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            synthesis: true,
            recognition: false,
        }
    }

    fn speak(&self, text: &str) {
        self.queue.push(text, || {
            let (program, voice) = (self.program.clone(), self.voice.clone());
            Box::new(move |text: String| -> BoxFuture<'static, ()> {
                let mut command = tokio::process::Command::new(&program);
                command
                    .args(command_args(&voice, &text))
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null());
                Box::pin(async move {
                    match command.status().await {
                        Ok(status) if status.success() => {}
                        Ok(status) => debug!(%status, "Local synthesizer exited with failure"),
                        Err(e) => debug!(error = %e, "Local synthesizer could not be started"),
                    }
                })
            })
        });
    }

    async fn recognize_once(&self) -> Result<String, SpeechError> {
        Err(SpeechError::Unsupported("recognition"))
    }
}
