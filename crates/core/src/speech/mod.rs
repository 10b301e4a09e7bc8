//! Speech Capability
//!
//! One interface for text-to-speech and speech-to-text, backed either by the
//! cloud speech service or by whatever the local runtime provides. The cloud
//! backend is preferred once it has been initialized; until then, or when it
//! is not configured, callers transparently get the local backend.
//!
//! Voice output is an aid, not a control path: every backend failure degrades
//! to "did nothing" and is only logged.

pub mod local;
pub mod queue;
pub mod remote;

use crate::config::SpeechSettings;
use crate::surface::{Field, Surface};
use crate::transport::Transport;
use async_trait::async_trait;
use remote::{AudioDevice, CloudSpeechBackend};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Notice shown when no backend can recognize speech.
pub const UNSUPPORTED_NOTICE: &str = "الإملاء الصوتي غير مدعوم في هذا المتصفح.";

/// What a backend can do in this runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub synthesis: bool,
    pub recognition: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("Speech backend does not support {0}")]
    Unsupported(&'static str),
    #[error("Speech session unavailable: {0}")]
    SessionUnavailable(String),
    #[error("No speech was recognized")]
    NoMatch,
    #[error("Speech backend failed: {0}")]
    Backend(String),
}

/// Defines the contract shared by every speech backend.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Starts speaking `text` and returns without waiting for playback.
    fn speak(&self, text: &str);

    /// Waits for one utterance and returns its transcript.
    async fn recognize_once(&self) -> Result<String, SpeechError>;
}

/// Result of a dictation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// The trimmed transcript was written into the target field.
    Written(String),
    /// Recognition ran but produced nothing usable; the field is untouched.
    NothingHeard,
    /// No backend can recognize speech; the user was notified.
    Unsupported,
}

/// Process-wide speech capability for one exercise session.
pub struct SpeechProvider {
    settings: SpeechSettings,
    transport: Arc<dyn Transport>,
    http: reqwest::Client,
    audio: Option<Arc<dyn AudioDevice>>,
    local: Option<Arc<dyn SpeechBackend>>,
    remote: OnceCell<Arc<dyn SpeechBackend>>,
    enabled: bool,
}

impl SpeechProvider {
    /// Creates a provider with no local backend and synthesis disabled.
    pub fn new(settings: SpeechSettings, transport: Arc<dyn Transport>, http: reqwest::Client) -> Self {
        Self {
            settings,
            transport,
            http,
            audio: None,
            local: None,
            remote: OnceCell::new(),
            enabled: false,
        }
    }

    /// Audio input/output used by the cloud backend.
    pub fn with_audio_device(mut self, audio: Arc<dyn AudioDevice>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// The runtime's own speech capability, used until the cloud is ready.
    pub fn with_local_backend(mut self, local: Arc<dyn SpeechBackend>) -> Self {
        self.local = Some(local);
        self
    }

    /// Installs an already-established remote backend, skipping the token
    /// exchange.
    pub fn with_remote_backend(self, remote: Arc<dyn SpeechBackend>) -> Self {
        if self.remote.set(remote).is_err() {
            debug!("Remote speech backend already set; keeping the first one");
        }
        self
    }

    pub fn settings(&self) -> &SpeechSettings {
        &self.settings
    }

    pub fn is_remote_ready(&self) -> bool {
        self.remote.initialized()
    }

    /// Whether spoken output is switched on for the whole application.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Tries to bring up the cloud backend and reports whether it is ready.
    ///
    /// Never fails: a missing configuration, token or audio device simply
    /// leaves the local backend in charge. Once ready, later calls are no-ops;
    /// a failed attempt may be retried.
    #[instrument(skip_all)]
    pub async fn initialize(&self) -> bool {
        if self.remote.initialized() {
            return true;
        }
        if !self.settings.is_remote_configured() {
            debug!("Cloud speech not configured; using local backend");
            return false;
        }
        let Some(audio) = self.audio.clone() else {
            warn!("Cloud speech configured but no audio device was provided");
            return false;
        };

        let result = self
            .remote
            .get_or_try_init(|| async move {
                let session = remote::fetch_session(self.transport.as_ref()).await?;
                let voice = self
                    .settings
                    .voice
                    .clone()
                    .or_else(|| session.voice.clone())
                    .unwrap_or_else(|| self.settings.voice().to_string());
                let backend = CloudSpeechBackend::new(
                    self.http.clone(),
                    &session,
                    voice,
                    self.settings.language.clone(),
                    audio,
                );
                Ok::<Arc<dyn SpeechBackend>, SpeechError>(Arc::new(backend))
            })
            .await;

        match result {
            Ok(backend) => {
                info!(backend = backend.name(), "Cloud speech ready");
                true
            }
            Err(e) => {
                debug!(error = %e, "Cloud speech unavailable; using local backend");
                false
            }
        }
    }

    fn active_backend(&self, wanted: impl Fn(Capabilities) -> bool) -> Option<&Arc<dyn SpeechBackend>> {
        self.remote
            .get()
            .filter(|b| wanted(b.capabilities()))
            .or_else(|| self.local.as_ref().filter(|b| wanted(b.capabilities())))
    }

    /// Speaks `text` if spoken output is on. Fire-and-forget.
    pub fn speak(&self, text: &str) {
        if !self.enabled || text.trim().is_empty() {
            return;
        }
        match self.active_backend(|c| c.synthesis) {
            Some(backend) => {
                debug!(backend = backend.name(), "Speaking prompt");
                backend.speak(text);
            }
            None => debug!("No speech synthesis available; prompt not spoken"),
        }
    }

    /// Captures one utterance and writes its trimmed transcript into `field`.
    ///
    /// Always resolves. When no backend can recognize speech the user gets a
    /// blocking notice and the field is left as it was.
    pub async fn recognize_once<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        field: Field,
    ) -> RecognitionOutcome {
        let Some(backend) = self.active_backend(|c| c.recognition) else {
            surface.notify(UNSUPPORTED_NOTICE);
            return RecognitionOutcome::Unsupported;
        };

        match backend.recognize_once().await {
            Ok(transcript) => {
                let transcript = transcript.trim();
                if transcript.is_empty() {
                    return RecognitionOutcome::NothingHeard;
                }
                surface.set_field_value(field, transcript);
                RecognitionOutcome::Written(transcript.to_string())
            }
            Err(e) => {
                debug!(backend = backend.name(), error = %e, "Recognition produced nothing");
                RecognitionOutcome::NothingHeard
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::surface::Element;
    use crate::transport::MockTransport;
    use bytes::Bytes;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub(crate) struct FakeBackend {
        pub capabilities: Capabilities,
        pub spoken: Mutex<Vec<String>>,
        pub transcript: Result<String, SpeechError>,
    }

    impl FakeBackend {
        pub fn new(capabilities: Capabilities, transcript: Result<String, SpeechError>) -> Arc<Self> {
            Arc::new(Self {
                capabilities,
                spoken: Mutex::new(Vec::new()),
                transcript,
            })
        }

        pub fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SpeechBackend for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn capabilities(&self) -> Capabilities {
            self.capabilities
        }

        fn speak(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }

        async fn recognize_once(&self) -> Result<String, SpeechError> {
            self.transcript.clone()
        }
    }

    struct SilentDevice;

    #[async_trait]
    impl AudioDevice for SilentDevice {
        async fn play(&self, _wav: Bytes) -> anyhow::Result<()> {
            Ok(())
        }

        async fn capture_utterance(&self) -> anyhow::Result<Bytes> {
            anyhow::bail!("no microphone")
        }
    }

    #[derive(Default)]
    struct FieldsOnly {
        fields: HashMap<Field, String>,
        notices: Vec<String>,
    }

    impl Surface for FieldsOnly {
        fn show(&mut self, _element: Element) {}
        fn hide(&mut self, _element: Element) {}
        fn set_text(&mut self, _element: Element, _text: &str) {}
        fn field_value(&self, field: Field) -> String {
            self.fields.get(&field).cloned().unwrap_or_default()
        }
        fn set_field_value(&mut self, field: Field, value: &str) {
            self.fields.insert(field, value.to_string());
        }
        fn notify(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }
    }

    const BOTH: Capabilities = Capabilities {
        synthesis: true,
        recognition: true,
    };
    const SYNTH_ONLY: Capabilities = Capabilities {
        synthesis: true,
        recognition: false,
    };

    fn configured() -> SpeechSettings {
        SpeechSettings {
            enabled: true,
            region: Some("eastus".to_string()),
            ..SpeechSettings::default()
        }
    }

    fn provider(settings: SpeechSettings, transport: MockTransport) -> SpeechProvider {
        SpeechProvider::new(settings, Arc::new(transport), reqwest::Client::new())
    }

    #[test]
    fn test_speak_is_disabled_by_default() {
        let local = FakeBackend::new(BOTH, Ok(String::new()));
        let provider = provider(SpeechSettings::default(), MockTransport::new())
            .with_local_backend(local.clone());

        assert!(!provider.is_enabled());
        provider.speak("مرحبا");
        assert!(local.spoken().is_empty());
    }

    #[test]
    fn test_speak_skips_empty_text() {
        let local = FakeBackend::new(BOTH, Ok(String::new()));
        let mut provider = provider(SpeechSettings::default(), MockTransport::new())
            .with_local_backend(local.clone());
        provider.set_enabled(true);

        provider.speak("");
        provider.speak("   ");
        assert!(local.spoken().is_empty());

        provider.speak("أين يحدث الفعل؟");
        assert_eq!(local.spoken(), vec!["أين يحدث الفعل؟".to_string()]);
    }

    #[test]
    fn test_remote_is_preferred_once_ready() {
        let local = FakeBackend::new(BOTH, Ok(String::new()));
        let remote = FakeBackend::new(BOTH, Ok(String::new()));
        let mut provider = provider(configured(), MockTransport::new())
            .with_local_backend(local.clone())
            .with_remote_backend(remote.clone());
        provider.set_enabled(true);

        assert!(provider.is_remote_ready());
        provider.speak("نص");
        assert_eq!(remote.spoken(), vec!["نص".to_string()]);
        assert!(local.spoken().is_empty());
    }

    #[test]
    fn test_speak_without_any_backend_does_nothing() {
        let mut provider = provider(SpeechSettings::default(), MockTransport::new());
        provider.set_enabled(true);
        provider.speak("نص");
    }

    #[tokio::test]
    async fn test_recognize_without_backend_notifies() {
        let provider = provider(SpeechSettings::default(), MockTransport::new());
        let mut surface = FieldsOnly::default();

        let outcome = provider.recognize_once(&mut surface, Field::Subject).await;

        assert_eq!(outcome, RecognitionOutcome::Unsupported);
        assert_eq!(surface.notices, vec![UNSUPPORTED_NOTICE.to_string()]);
        assert!(surface.fields.is_empty());
    }

    #[tokio::test]
    async fn test_recognize_with_synthesis_only_local_is_unsupported() {
        let local = FakeBackend::new(SYNTH_ONLY, Ok("أحمد".to_string()));
        let provider = provider(SpeechSettings::default(), MockTransport::new())
            .with_local_backend(local);
        let mut surface = FieldsOnly::default();

        let outcome = provider.recognize_once(&mut surface, Field::Subject).await;
        assert_eq!(outcome, RecognitionOutcome::Unsupported);
        assert_eq!(surface.notices.len(), 1);
    }

    #[tokio::test]
    async fn test_recognize_writes_trimmed_transcript() {
        let local = FakeBackend::new(BOTH, Ok("  أحمد \n".to_string()));
        let provider = provider(SpeechSettings::default(), MockTransport::new())
            .with_local_backend(local);
        let mut surface = FieldsOnly::default();

        let outcome = provider.recognize_once(&mut surface, Field::Subject).await;

        assert_eq!(outcome, RecognitionOutcome::Written("أحمد".to_string()));
        assert_eq!(surface.field_value(Field::Subject), "أحمد");
        assert!(surface.notices.is_empty());
    }

    #[tokio::test]
    async fn test_recognize_error_resolves_without_writing() {
        let local = FakeBackend::new(BOTH, Err(SpeechError::Backend("mic busy".to_string())));
        let provider = provider(SpeechSettings::default(), MockTransport::new())
            .with_local_backend(local);
        let mut surface = FieldsOnly::default();
        surface.set_field_value(Field::Place, "المنزل");

        let outcome = provider.recognize_once(&mut surface, Field::Place).await;

        assert_eq!(outcome, RecognitionOutcome::NothingHeard);
        assert_eq!(surface.field_value(Field::Place), "المنزل");
        assert!(surface.notices.is_empty());
    }

    #[tokio::test]
    async fn test_initialize_not_configured_skips_token_fetch() {
        let mut transport = MockTransport::new();
        transport.expect_get_json().times(0);
        let provider = provider(SpeechSettings::default(), transport)
            .with_audio_device(Arc::new(SilentDevice));

        assert!(!provider.initialize().await);
        assert!(!provider.is_remote_ready());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let mut transport = MockTransport::new();
        transport
            .expect_get_json()
            .withf(|path| path == "/api/speech/token")
            .times(1)
            .returning(|_| Ok(json!({"token": "tok", "region": "eastus", "voice": "ar-SA-HamedNeural"})));
        let provider = provider(configured(), transport).with_audio_device(Arc::new(SilentDevice));

        assert!(provider.initialize().await);
        assert!(provider.initialize().await);
        assert!(provider.is_remote_ready());
    }

    #[tokio::test]
    async fn test_initialize_failure_can_be_retried() {
        let mut transport = MockTransport::new();
        let mut calls = 0;
        transport.expect_get_json().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(json!({"error": "speech_not_configured"}))
            } else {
                Ok(json!({"token": "tok", "region": "eastus"}))
            }
        });
        let provider = provider(configured(), transport).with_audio_device(Arc::new(SilentDevice));

        assert!(!provider.initialize().await);
        assert!(!provider.is_remote_ready());
        assert!(provider.initialize().await);
    }

    #[tokio::test]
    async fn test_initialize_without_audio_device_stays_local() {
        let mut transport = MockTransport::new();
        transport.expect_get_json().times(0);
        let provider = provider(configured(), transport);

        assert!(!provider.initialize().await);
    }
}
