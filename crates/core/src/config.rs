use std::time::Duration;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Invalid page url '{0}': {1}")]
    InvalidPageUrl(String, String),
}

/// Verb used when the exercise is not given one.
pub const DEFAULT_VERB: &str = "أكل";
/// Neural voice used by the cloud backend unless overridden.
pub const DEFAULT_VOICE: &str = "ar-SA-HamedNeural";
/// Locale for both synthesis and recognition.
pub const DEFAULT_LANGUAGE: &str = "ar-SA";

/// Speech feature flags, as rendered into the page by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeechSettings {
    /// Whether the cloud speech backend may be used at all.
    pub enabled: bool,
    /// Region of the cloud speech resource, e.g. `eastus`.
    pub region: Option<String>,
    /// Preferred synthesis voice.
    pub voice: Option<String>,
    pub language: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            region: None,
            voice: None,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl SpeechSettings {
    /// The remote backend is only attempted when enabled and a region is known.
    pub fn is_remote_configured(&self) -> bool {
        self.enabled && self.region.as_deref().is_some_and(|r| !r.is_empty())
    }

    pub fn voice(&self) -> &str {
        self.voice.as_deref().unwrap_or(DEFAULT_VOICE)
    }
}

/// Holds everything one exercise session needs from its environment.
#[derive(Clone, Debug)]
pub struct ExerciseConfig {
    pub base_url: String,
    pub session_token: Option<String>,
    pub verb: String,
    pub preview: bool,
    pub http_timeout: Duration,
    pub speech: SpeechSettings,
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            session_token: None,
            verb: DEFAULT_VERB.to_string(),
            preview: false,
            http_timeout: Duration::from_secs(10),
            speech: SpeechSettings::default(),
        }
    }
}

impl ExerciseConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let defaults = Self::default();

        let base_url = non_empty_var("EXERCISE_BASE_URL").unwrap_or(defaults.base_url);
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "EXERCISE_BASE_URL".to_string(),
                format!("'{}' is not an http(s) url", base_url),
            ));
        }

        let verb = non_empty_var("EXERCISE_VERB").unwrap_or(defaults.verb);
        let session_token = non_empty_var("EXERCISE_SESSION_TOKEN");
        let preview = bool_var("EXERCISE_PREVIEW")?.unwrap_or(false);

        let http_timeout = match non_empty_var("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::InvalidValue("HTTP_TIMEOUT_SECS".to_string(), e.to_string()))?,
            None => defaults.http_timeout,
        };

        let speech = SpeechSettings {
            enabled: bool_var("SPEECH_ENABLED")?.unwrap_or(false),
            region: non_empty_var("SPEECH_REGION"),
            voice: non_empty_var("SPEECH_VOICE"),
            language: non_empty_var("SPEECH_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        };

        if speech.enabled && speech.region.is_none() {
            tracing::warn!("SPEECH_ENABLED is set without SPEECH_REGION; cloud speech stays off.");
        }

        Ok(Self {
            base_url,
            session_token,
            verb,
            preview,
            http_timeout,
            speech,
        })
    }

    /// Applies the session token and preview flag carried by a page url such
    /// as `/c/<token>?preview=1`. Relative urls are accepted.
    pub fn apply_page_url(&mut self, page_url: &str) -> Result<(), ConfigError> {
        let invalid = |e: &dyn std::fmt::Display| {
            ConfigError::InvalidPageUrl(page_url.to_string(), e.to_string())
        };
        let base = reqwest::Url::parse("http://localhost/").map_err(|e| invalid(&e))?;
        let url = base.join(page_url).map_err(|e| invalid(&e))?;

        if let Some(segments) = url.path_segments() {
            let segments: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();
            if let [.., "c", token] = segments.as_slice() {
                self.session_token = Some((*token).to_string());
            }
        }

        self.preview = url
            .query_pairs()
            .any(|(key, value)| key == "preview" && value == "1");
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bool_var(name: &str) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = non_empty_var(name) else {
        return Ok(None);
    };
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a boolean", raw),
        )),
    }
}
