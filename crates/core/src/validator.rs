//! Sentence word-order validation.

use crate::board::{Role, Token};

/// Role orders accepted as a complete sentence. Both nominal (subject first)
/// and verbal (verb first) word order are valid.
pub const ACCEPTED_ORDERS: [[Role; 4]; 2] = [
    [Role::Subject, Role::Verb, Role::Object, Role::Place],
    [Role::Verb, Role::Subject, Role::Object, Role::Place],
];

/// Feedback for a zone that validates.
pub const PASS_FEEDBACK: &str = "صحيح";
/// Feedback for a zone that does not.
pub const FAIL_FEEDBACK: &str = "تحقّق من ترتيب الكلمات.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn feedback(&self) -> &'static str {
        match self {
            Verdict::Pass => PASS_FEEDBACK,
            Verdict::Fail => FAIL_FEEDBACK,
        }
    }
}

/// Validates one zone. There is no partial credit.
pub fn validate(zone: &[Token]) -> Verdict {
    validate_roles(&zone.iter().map(Token::role).collect::<Vec<_>>())
}

pub fn validate_roles(roles: &[Role]) -> Verdict {
    if ACCEPTED_ORDERS.iter().any(|order| order.as_slice() == roles) {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

/// Combined feedback line for the two sentence zones.
pub fn order_feedback(first: Verdict, second: Verdict) -> String {
    format!(
        "الجملة 1: {} — الجملة 2: {}",
        first.feedback(),
        second.feedback()
    )
}
