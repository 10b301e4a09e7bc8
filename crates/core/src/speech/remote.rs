//! Cloud speech backend.
//!
//! Synthesis and recognition go through the vendor REST API using a
//! short-lived token issued by the exercise backend. Audio hardware is
//! reached through [`AudioDevice`].

use super::queue::UtteranceQueue;
use super::{Capabilities, SpeechBackend, SpeechError};
use crate::transport::Transport;
use async_trait::async_trait;
use azure_speech::{Recognition, SpeechClient};
use bytes::Bytes;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

const TOKEN_PATH: &str = "/api/speech/token";

/// Plays and captures WAV audio for the cloud backend.
#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// Plays a complete WAV buffer and returns when playback ends.
    async fn play(&self, wav: Bytes) -> anyhow::Result<()>;

    /// Records a single utterance as a 16 kHz mono PCM WAV buffer.
    async fn capture_utterance(&self) -> anyhow::Result<Bytes>;
}

/// Authorization for the cloud speech service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechSession {
    pub token: String,
    pub region: String,
    pub voice: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Exchanges the page session for a cloud speech token.
#[instrument(skip_all)]
pub async fn fetch_session(transport: &dyn Transport) -> Result<SpeechSession, SpeechError> {
    let value = transport
        .get_json(TOKEN_PATH)
        .await
        .map_err(|e| SpeechError::SessionUnavailable(e.to_string()))?;
    let response: TokenResponse = serde_json::from_value(value)
        .map_err(|e| SpeechError::SessionUnavailable(e.to_string()))?;

    let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());
    match (non_empty(response.token), non_empty(response.region)) {
        (Some(token), Some(region)) => Ok(SpeechSession {
            token,
            region,
            voice: non_empty(response.voice),
        }),
        _ => Err(SpeechError::SessionUnavailable(
            response
                .error
                .unwrap_or_else(|| "token or region missing".to_string()),
        )),
    }
}

/// `SpeechBackend` backed by the cloud speech REST API. Utterances are
/// synthesized and played one at a time.
pub struct CloudSpeechBackend {
    client: SpeechClient,
    voice: String,
    language: String,
    audio: Arc<dyn AudioDevice>,
    queue: UtteranceQueue,
}

impl CloudSpeechBackend {
    pub fn new(
        http: reqwest::Client,
        session: &SpeechSession,
        voice: String,
        language: String,
        audio: Arc<dyn AudioDevice>,
    ) -> Self {
        let client = SpeechClient::new(http, session.token.clone(), session.region.clone());
        Self::with_client(client, voice, language, audio)
    }

    /// Builds a backend around an existing client, e.g. one pointed at a
    /// proxy with [`SpeechClient::with_endpoints`].
    pub fn with_client(
        client: SpeechClient,
        voice: String,
        language: String,
        audio: Arc<dyn AudioDevice>,
    ) -> Self {
        Self {
            client,
            voice,
            language,
            audio,
            queue: UtteranceQueue::new(),
        }
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }
}

#[async_trait]
impl SpeechBackend for CloudSpeechBackend {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            synthesis: true,
            recognition: true,
        }
    }

    fn speak(&self, text: &str) {
        self.queue.push(text, || {
            let client = self.client.clone();
            let audio = Arc::clone(&self.audio);
            let (voice, language) = (self.voice.clone(), self.language.clone());
            Box::new(move |text: String| -> BoxFuture<'static, ()> {
                let (client, audio) = (client.clone(), Arc::clone(&audio));
                let (voice, language) = (voice.clone(), language.clone());
                Box::pin(async move {
                    let result = async {
                        let wav = client.synthesize(&text, &voice, &language).await?;
                        audio.play(wav).await
                    }
                    .await;
                    if let Err(e) = result {
                        debug!(error = ?e, "Cloud synthesis failed");
                    }
                })
            })
        });
    }

    #[instrument(skip_all, fields(language = %self.language))]
    async fn recognize_once(&self) -> Result<String, SpeechError> {
        let wav = self
            .audio
            .capture_utterance()
            .await
            .map_err(|e| SpeechError::Backend(format!("{e:#}")))?;
        let recognition = self
            .client
            .recognize(wav, &self.language)
            .await
            .map_err(|e| SpeechError::Backend(format!("{e:#}")))?;
        match recognition {
            Recognition::Recognized(text) => Ok(text),
            Recognition::NoMatch => Err(SpeechError::NoMatch),
            Recognition::Failed(status) => Err(SpeechError::Backend(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, TransportError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDevice {
        captures: AtomicUsize,
        capture: fn() -> anyhow::Result<Bytes>,
    }

    #[async_trait]
    impl AudioDevice for CountingDevice {
        async fn play(&self, _wav: Bytes) -> anyhow::Result<()> {
            Ok(())
        }

        async fn capture_utterance(&self) -> anyhow::Result<Bytes> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            (self.capture)()
        }
    }

    fn transport_returning(value: Result<serde_json::Value, TransportError>) -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_get_json()
            .withf(|path| path == TOKEN_PATH)
            .times(1)
            .returning(move |_| value.clone());
        transport
    }

    fn backend(device: Arc<CountingDevice>) -> CloudSpeechBackend {
        let client = SpeechClient::new(reqwest::Client::new(), "tok", "eastus")
            .with_endpoints("http://127.0.0.1:9", "http://127.0.0.1:9");
        CloudSpeechBackend::with_client(
            client,
            "ar-SA-HamedNeural".to_string(),
            "ar-SA".to_string(),
            device,
        )
    }

    #[tokio::test]
    async fn test_fetch_session_reads_token_region_and_voice() {
        let transport = transport_returning(Ok(json!({
            "token": "abc",
            "region": "westeurope",
            "voice": "ar-EG-SalmaNeural"
        })));

        let session = fetch_session(&transport).await.unwrap();

        assert_eq!(
            session,
            SpeechSession {
                token: "abc".to_string(),
                region: "westeurope".to_string(),
                voice: Some("ar-EG-SalmaNeural".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_session_requires_token_and_region() {
        let transport = transport_returning(Ok(json!({"token": "abc"})));
        assert!(matches!(
            fetch_session(&transport).await,
            Err(SpeechError::SessionUnavailable(_))
        ));

        let transport = transport_returning(Ok(json!({"token": "", "region": "eastus"})));
        assert!(fetch_session(&transport).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_session_reports_backend_error() {
        let transport = transport_returning(Ok(json!({"error": "speech_not_configured"})));
        assert_eq!(
            fetch_session(&transport).await,
            Err(SpeechError::SessionUnavailable("speech_not_configured".to_string()))
        );
    }

    #[tokio::test]
    async fn test_fetch_session_transport_failure() {
        let transport = transport_returning(Err(TransportError::Request {
            path: TOKEN_PATH.to_string(),
            message: "connection refused".to_string(),
        }));
        assert!(fetch_session(&transport).await.is_err());
    }

    #[tokio::test]
    async fn test_recognize_fails_when_capture_fails() {
        let device = Arc::new(CountingDevice {
            captures: AtomicUsize::new(0),
            capture: || Err(anyhow::anyhow!("microphone unavailable")),
        });
        let backend = backend(device.clone());

        let result = backend.recognize_once().await;

        assert!(matches!(result, Err(SpeechError::Backend(m)) if m.contains("microphone")));
        assert_eq!(device.captures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recognize_fails_when_service_unreachable() {
        let device = Arc::new(CountingDevice {
            captures: AtomicUsize::new(0),
            capture: || Ok(Bytes::from_static(b"RIFF")),
        });
        let backend = backend(device);

        assert!(matches!(
            backend.recognize_once().await,
            Err(SpeechError::Backend(_))
        ));
    }

    #[test]
    fn test_speak_without_runtime_is_dropped() {
        let device = Arc::new(CountingDevice {
            captures: AtomicUsize::new(0),
            capture: || Ok(Bytes::new()),
        });
        backend(device).speak("مرحبا");
    }
}
