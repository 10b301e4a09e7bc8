//! Fixed yes/no stimuli and their degraded-mode answers.
//!
//! Each stimulus carries the one answer that is accepted when the remote judge
//! cannot be reached. Only the entries in [`STIMULI`] have such a safety net.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A forced binary answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Answer::Yes => "yes",
            Answer::No => "no",
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one of the fixed stimuli.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StimulusId {
    /// Is the sentence grammatical?
    Grammar,
    /// Is the sentence meaningful?
    Semantics,
}

/// A stimulus sentence and the local verdict used in degraded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stimulus {
    pub id: StimulusId,
    pub sentence: &'static str,
    pub expected: Answer,
    pub correct_feedback: &'static str,
    pub incorrect_feedback: &'static str,
}

impl Stimulus {
    /// Looks up a stimulus by id.
    pub fn get(id: StimulusId) -> &'static Stimulus {
        match id {
            StimulusId::Grammar => &STIMULI[0],
            StimulusId::Semantics => &STIMULI[1],
        }
    }

    /// Feedback shown when the remote judge is unavailable.
    pub fn fallback_feedback(&self, answer: Answer) -> &'static str {
        if answer == self.expected {
            self.correct_feedback
        } else {
            self.incorrect_feedback
        }
    }
}

pub static STIMULI: [Stimulus; 2] = [
    Stimulus {
        id: StimulusId::Grammar,
        sentence: "اسم الطالب أحمد.",
        expected: Answer::Yes,
        correct_feedback: "إجابة صحيحة.",
        incorrect_feedback: "ليست صحيحة. الجملة سليمة نحويًا هنا.",
    },
    Stimulus {
        id: StimulusId::Semantics,
        sentence: "سيأكل أحمد التفاحة أمس.",
        expected: Answer::No,
        correct_feedback: "صحيح: (سيأكل) لا تأتي مع (أمس).",
        incorrect_feedback: "تحقّق من الزمن: سيأكل/أمس متضادان.",
    },
];
