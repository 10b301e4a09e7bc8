//! The rendering surface the exercise draws on.
//!
//! The engine never touches markup. It asks the host to show or hide named
//! elements, set their text, read and write input fields, and raise a blocking
//! notice.

use crate::board::{Token, ZoneId};
use crate::step::Step;
use crate::stimulus::StimulusId;

/// Elements the engine controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    /// The section for a step.
    Step(Step),
    PreviewBanner,
    /// Label holding the exercise verb.
    Verb,
    /// Hint shown on the verb step.
    VerbPrompt,
    /// Read-only subject shown on the object step.
    SubjectPreview,
    SubjectBubble,
    /// Read-only subject and object shown on the place step.
    PlaceSubject,
    PlaceObject,
    PlaceSubjectBubble,
    PlaceObjectBubble,
    OrderFeedback,
    GrammarFeedback,
    YesNoFeedback,
    SemanticsFeedback,
    Stimulus(StimulusId),
    /// The control that leaves `Step`; hidden until its gate opens.
    Advance(Step),
    SpeechToggle,
}

/// Free-text inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ClientName,
    Subject,
    Object,
    Place,
    Sentence1,
    Sentence2,
}

pub trait Surface {
    fn show(&mut self, element: Element);

    fn hide(&mut self, element: Element);

    fn set_text(&mut self, element: Element, text: &str);

    /// Current value of an input; empty when untouched.
    fn field_value(&self, field: Field) -> String;

    fn set_field_value(&mut self, field: Field, value: &str);

    /// A blocking, user-visible notice (an alert).
    fn notify(&mut self, message: &str);

    /// Redraws a zone after seeding or a move.
    fn render_zone(&mut self, _zone: ZoneId, _tokens: &[Token]) {}
}
