//! Remote Judgment Client
//!
//! This module wraps the backend's AI endpoints: paragraph-level grammar
//! feedback, yes/no grammar and meaning judgments, and the object-prompt hint.
//! Every call converts transport or shape failures into a fixed local answer
//! so that the exercise stays completable when the judge is down or was never
//! configured.

use crate::stimulus::{Answer, Stimulus, StimulusId};
use crate::transport::Transport;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Shown when the judge could not be reached or answered with garbage.
pub const UNREACHABLE_FEEDBACK: &str = "تعذّر الاتصال بخدمة الذكاء الاصطناعي.";
/// Shown when the backend reports that no AI service is configured.
pub const NOT_CONFIGURED_FEEDBACK: &str =
    "ملاحظة: الذكاء الاصطناعي غير مفعّل بعد. أضف مفاتيح Azure في ملف .env لتفعيل التحقق الذكي.";
/// Shown when the judge answered but produced no feedback.
pub const NO_OUTPUT_FEEDBACK: &str = "تعذّر الحصول على مخرجات الذكاء الاصطناعي.";

const NOT_CONFIGURED_ERROR: &str = "ai_not_configured";

/// Object-prompt hint used when the backend cannot suggest one.
pub fn default_object_prompt(verb: &str) -> String {
    format!("ما هو المفعول به المناسب للفعل '{verb}'؟")
}

/// Outcome of a yes/no judgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgmentResult {
    /// The judge evaluated the answer.
    Judged {
        correct: bool,
        expected: String,
        reason: String,
    },
    /// The judge was unreachable, unconfigured, or answered `ok: false`.
    Unavailable,
}

impl JudgmentResult {
    /// Renders the feedback line for `answer` to `stimulus`, falling back to
    /// the stimulus' fixed verdict when the judge was unavailable.
    pub fn feedback(&self, stimulus: &Stimulus, answer: Answer) -> String {
        match self {
            JudgmentResult::Judged {
                correct: true,
                reason,
                ..
            } => format!("إجابة صحيحة. {reason}").trim_end().to_string(),
            JudgmentResult::Judged {
                correct: false,
                expected,
                reason,
            } => format!("ليست صحيحة. التقييم المتوقع: {expected}. {reason}")
                .trim_end()
                .to_string(),
            JudgmentResult::Unavailable => stimulus.fallback_feedback(answer).to_string(),
        }
    }
}

/// Defines the contract for any service that can judge learner output.
///
/// Implementations never fail: degraded answers are part of the contract.
#[async_trait]
pub trait JudgmentClient: Send + Sync {
    /// Free-text grammar feedback for the typed sentences.
    async fn grade_paragraph(&self, sentences: &[String]) -> String;

    /// Is `sentence` grammatical, and did the learner say so?
    async fn judge_yes_no_grammar(&self, sentence: &str, answer: Answer) -> JudgmentResult;

    /// Is `sentence` meaningful, and did the learner say so?
    async fn judge_yes_no_semantics(&self, sentence: &str, answer: Answer) -> JudgmentResult;

    /// A hint for choosing an object for `verb`.
    async fn object_prompt(&self, verb: &str) -> String;
}

/// Dispatches a yes/no judgment for a stimulus to the matching endpoint.
pub async fn judge_stimulus(
    client: &dyn JudgmentClient,
    stimulus: &Stimulus,
    answer: Answer,
) -> JudgmentResult {
    match stimulus.id {
        StimulusId::Grammar => client.judge_yes_no_grammar(stimulus.sentence, answer).await,
        StimulusId::Semantics => {
            client
                .judge_yes_no_semantics(stimulus.sentence, answer)
                .await
        }
    }
}

#[derive(Debug, Deserialize)]
struct GrammarResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YesNoResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    correct: bool,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectPromptResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    prompt: Option<String>,
}

/// An implementation of `JudgmentClient` that calls the backend over HTTP.
#[derive(Clone)]
pub struct HttpJudgmentClient {
    transport: Arc<dyn Transport>,
}

impl HttpJudgmentClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn yes_no(&self, path: &str, sentence: &str, answer: Answer) -> JudgmentResult {
        let body = json!({ "sentence": sentence, "answer": answer.as_str() });
        let response = match self.transport.post_json(path, body).await {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Judge unreachable; using fallback verdict");
                return JudgmentResult::Unavailable;
            }
        };
        match serde_json::from_value::<YesNoResponse>(response) {
            Ok(YesNoResponse {
                ok: true,
                correct,
                expected,
                reason,
            }) => JudgmentResult::Judged {
                correct,
                expected: expected.unwrap_or_default(),
                reason: reason.unwrap_or_default(),
            },
            Ok(_) => {
                debug!("Judge answered ok=false; using fallback verdict");
                JudgmentResult::Unavailable
            }
            Err(e) => {
                debug!(error = %e, "Malformed judge response; using fallback verdict");
                JudgmentResult::Unavailable
            }
        }
    }
}

#[async_trait]
impl JudgmentClient for HttpJudgmentClient {
    #[instrument(skip_all, fields(count = sentences.len()))]
    async fn grade_paragraph(&self, sentences: &[String]) -> String {
        let body = json!({ "sentences": sentences });
        let response = match self.transport.post_json("/api/ai/grammar", body).await {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Grammar feedback unreachable");
                return UNREACHABLE_FEEDBACK.to_string();
            }
        };
        let Ok(response) = serde_json::from_value::<GrammarResponse>(response) else {
            return UNREACHABLE_FEEDBACK.to_string();
        };

        match response {
            GrammarResponse {
                ok: true,
                feedback: Some(feedback),
                ..
            } if !feedback.is_empty() => feedback,
            GrammarResponse {
                error: Some(error), ..
            } if error == NOT_CONFIGURED_ERROR => NOT_CONFIGURED_FEEDBACK.to_string(),
            GrammarResponse {
                feedback: Some(feedback),
                ..
            } if !feedback.is_empty() => feedback,
            _ => NO_OUTPUT_FEEDBACK.to_string(),
        }
    }

    #[instrument(skip_all, fields(answer = %answer))]
    async fn judge_yes_no_grammar(&self, sentence: &str, answer: Answer) -> JudgmentResult {
        self.yes_no("/api/ai/yn_grammar", sentence, answer).await
    }

    #[instrument(skip_all, fields(answer = %answer))]
    async fn judge_yes_no_semantics(&self, sentence: &str, answer: Answer) -> JudgmentResult {
        self.yes_no("/api/ai/yn_semantics", sentence, answer).await
    }

    #[instrument(skip_all)]
    async fn object_prompt(&self, verb: &str) -> String {
        let response = self
            .transport
            .post_json("/api/ai/object_prompt", json!({ "verb": verb }))
            .await;
        match response.map(serde_json::from_value::<ObjectPromptResponse>) {
            Ok(Ok(ObjectPromptResponse {
                ok: true,
                prompt: Some(prompt),
            })) if !prompt.trim().is_empty() => prompt,
            _ => default_object_prompt(verb),
        }
    }
}

/// A `JudgmentClient` that never leaves the process.
///
/// Behaves exactly like a backend without AI configuration, which makes it
/// useful for offline runs and for tests that exercise the fallback paths.
pub struct OfflineJudgmentClient;

#[async_trait]
impl JudgmentClient for OfflineJudgmentClient {
    async fn grade_paragraph(&self, _sentences: &[String]) -> String {
        NOT_CONFIGURED_FEEDBACK.to_string()
    }

    async fn judge_yes_no_grammar(&self, _sentence: &str, _answer: Answer) -> JudgmentResult {
        JudgmentResult::Unavailable
    }

    async fn judge_yes_no_semantics(&self, _sentence: &str, _answer: Answer) -> JudgmentResult {
        JudgmentResult::Unavailable
    }

    async fn object_prompt(&self, verb: &str) -> String {
        default_object_prompt(verb)
    }
}
