//! Azure Speech REST Client
//!
//! A small client for the two Azure Cognitive Services Speech calls a
//! short-form voice exercise needs: neural text-to-speech and single-utterance
//! speech-to-text. Both are authorized with a short-lived bearer token issued
//! by the application's own backend, so the subscription key never reaches
//! this process.

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, instrument};

/// Output format requested from the synthesis endpoint (WAV container).
pub const SYNTHESIS_OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";

/// Content type the recognition endpoint expects for uploaded audio.
pub const RECOGNITION_CONTENT_TYPE: &str = "audio/wav; codecs=audio/pcm; samplerate=16000";

/// Client bound to one authorization token and region.
#[derive(Clone)]
pub struct SpeechClient {
    http: reqwest::Client,
    token: String,
    region: String,
    tts_base: String,
    stt_base: String,
}

impl fmt::Debug for SpeechClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechClient")
            .field("region", &self.region)
            .field("tts_base", &self.tts_base)
            .field("stt_base", &self.stt_base)
            .finish_non_exhaustive()
    }
}

impl SpeechClient {
    /// Creates a client for the public regional endpoints.
    pub fn new(http: reqwest::Client, token: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            http,
            token: token.into(),
            tts_base: format!("https://{region}.tts.speech.microsoft.com"),
            stt_base: format!("https://{region}.stt.speech.microsoft.com"),
            region,
        }
    }

    /// Points the client at different hosts, e.g. a private endpoint or proxy.
    pub fn with_endpoints(mut self, tts_base: impl Into<String>, stt_base: impl Into<String>) -> Self {
        self.tts_base = tts_base.into().trim_end_matches('/').to_string();
        self.stt_base = stt_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Synthesizes `text` with the given neural voice and returns WAV bytes.
    #[instrument(skip_all, fields(region = %self.region, voice = %voice))]
    pub async fn synthesize(&self, text: &str, voice: &str, language: &str) -> Result<Bytes> {
        let url = format!("{}/cognitiveservices/v1", self.tts_base);
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header(USER_AGENT, "jumla")
            .header("X-Microsoft-OutputFormat", SYNTHESIS_OUTPUT_FORMAT)
            .body(build_ssml(text, voice, language))
            .send()
            .await
            .context("Failed to reach the speech synthesis endpoint")?
            .error_for_status()
            .context("Speech synthesis request was rejected")?;

        let audio = response
            .bytes()
            .await
            .context("Failed to read synthesized audio")?;
        debug!(bytes = audio.len(), "Speech synthesized");
        Ok(audio)
    }

    /// Sends one captured utterance (16 kHz mono PCM WAV) for recognition.
    #[instrument(skip_all, fields(region = %self.region, language = %language))]
    pub async fn recognize(&self, wav: Bytes, language: &str) -> Result<Recognition> {
        let url = format!(
            "{}/speech/recognition/conversation/cognitiveservices/v1",
            self.stt_base
        );
        let response: RecognitionResponse = self
            .http
            .post(&url)
            .query(&[("language", language), ("format", "simple")])
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(CONTENT_TYPE, RECOGNITION_CONTENT_TYPE)
            .body(wav)
            .send()
            .await
            .context("Failed to reach the speech recognition endpoint")?
            .error_for_status()
            .context("Speech recognition request was rejected")?
            .json()
            .await
            .context("Malformed speech recognition response")?;

        let recognition = Recognition::from(response);
        debug!(?recognition, "Speech recognized");
        Ok(recognition)
    }
}

/// Outcome of a single-utterance recognition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// The service returned display text for the utterance.
    Recognized(String),
    /// Audio was received but nothing intelligible was heard.
    NoMatch,
    /// The service reported another status (e.g. `Error`).
    Failed(String),
}

/// Simple-format body returned by the short-audio recognition endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
}

impl From<RecognitionResponse> for Recognition {
    fn from(response: RecognitionResponse) -> Self {
        match response.recognition_status.as_str() {
            "Success" => match response.display_text {
                Some(text) if !text.trim().is_empty() => Recognition::Recognized(text),
                _ => Recognition::NoMatch,
            },
            "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => Recognition::NoMatch,
            other => Recognition::Failed(other.to_string()),
        }
    }
}

/// Wraps `text` in the SSML document the synthesis endpoint expects.
pub fn build_ssml(text: &str, voice: &str, language: &str) -> String {
    format!(
        "<speak version='1.0' xml:lang='{lang}'><voice xml:lang='{lang}' name='{voice}'>{text}</voice></speak>",
        lang = escape_xml(language),
        voice = escape_xml(voice),
        text = escape_xml(text),
    )
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
