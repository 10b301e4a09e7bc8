//! Exercise steps and their spoken prompts.

use crate::stimulus::{Stimulus, StimulusId};
use std::fmt;

/// The fixed, linear stages of the exercise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Step {
    /// Name entry before the exercise begins.
    #[default]
    Start,
    /// Choose a subject for the exercise verb.
    Verb,
    /// Choose an object.
    Object,
    /// Choose a place.
    Place,
    /// Arrange word cards into two sentences.
    Dnd,
    /// Type both sentences out.
    Typing,
    /// Judge a sentence's grammar.
    YesNo,
    /// Judge a sentence's meaning.
    Semantics,
    Finish,
}

impl Step {
    pub const ALL: [Step; 9] = [
        Step::Start,
        Step::Verb,
        Step::Object,
        Step::Place,
        Step::Dnd,
        Step::Typing,
        Step::YesNo,
        Step::Semantics,
        Step::Finish,
    ];

    /// The step after this one, or `None` at the end.
    pub fn next(&self) -> Option<Step> {
        let index = Self::ALL.iter().position(|s| s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Finish)
    }

    /// Whether entering this step speaks a prompt.
    pub fn speaks_on_entry(&self) -> bool {
        !matches!(self, Step::Start | Step::Finish)
    }

    /// The prompt spoken on entry, interpolating the exercise verb or the
    /// stimulus sentence where the step needs one.
    pub fn prompt(&self, verb: &str) -> Option<String> {
        let text = match self {
            Step::Start | Step::Finish => return None,
            Step::Verb => format!("من الفاعل الذي يقوم بالفعل {verb} ؟"),
            Step::Object => format!("ماذا يمكن للفاعل أن {verb} ؟"),
            Step::Place => "أين يحدث الفعل؟".to_string(),
            Step::Dnd => "رتب الكلمات إلى جملتين صحيحتين.".to_string(),
            Step::Typing => "اكتب الجملتين كاملة.".to_string(),
            Step::YesNo => Stimulus::get(StimulusId::Grammar).sentence.to_string(),
            Step::Semantics => Stimulus::get(StimulusId::Semantics).sentence.to_string(),
        };
        Some(text)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Start => "start",
            Step::Verb => "verb",
            Step::Object => "object",
            Step::Place => "place",
            Step::Dnd => "dnd",
            Step::Typing => "typing",
            Step::YesNo => "yn",
            Step::Semantics => "sem",
            Step::Finish => "finish",
        };
        f.write_str(name)
    }
}
