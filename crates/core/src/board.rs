//! Sentence-assembly board.
//!
//! Tokens are minted once when the arranging step is entered and then move
//! between zones by value. A token is never cloned, so it is always owned by
//! exactly one zone.

use serde::Serialize;

/// Shown in place of an answer the user left empty.
pub const PLACEHOLDER: &str = "—";

/// Fixed distractor words seeded next to the user's own answers.
pub const DISTRACTOR_SUBJECT: &str = "نورة";
pub const DISTRACTOR_OBJECT: &str = "كبسة";
pub const DISTRACTOR_PLACE: &str = "البيت";

/// Grammatical role of a token within a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Subject,
    Verb,
    Object,
    Place,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub usize);

/// A word card: display text plus its role.
#[derive(Debug, PartialEq, Eq)]
pub struct Token {
    id: TokenId,
    text: String,
    role: Role,
}

impl Token {
    pub fn id(&self) -> TokenId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneId {
    /// Where seeded tokens wait to be placed.
    Bank,
    Sentence1,
    Sentence2,
}

/// An ordered run of tokens; order is the user's claimed word order.
#[derive(Debug, Default)]
pub struct DropZone {
    tokens: Vec<Token>,
}

impl DropZone {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn roles(&self) -> Vec<Role> {
        self.tokens.iter().map(Token::role).collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn contains(&self, id: TokenId) -> bool {
        self.tokens.iter().any(|t| t.id == id)
    }

    fn take(&mut self, id: TokenId) -> Option<Token> {
        let index = self.tokens.iter().position(|t| t.id == id)?;
        Some(self.tokens.remove(index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("Token {0:?} is not on the board")]
    UnknownToken(TokenId),
    #[error("Tokens can only be moved while sentences are being arranged")]
    NotArranging,
}

/// The bank plus the two sentence zones.
#[derive(Debug, Default)]
pub struct Board {
    bank: DropZone,
    sentence1: DropZone,
    sentence2: DropZone,
}

impl Board {
    /// Mints one token per deck entry, in order, into the bank.
    pub fn seed(deck: Vec<(String, Role)>) -> Self {
        let tokens = deck
            .into_iter()
            .enumerate()
            .map(|(i, (text, role))| Token {
                id: TokenId(i),
                text,
                role,
            })
            .collect();
        Self {
            bank: DropZone { tokens },
            ..Self::default()
        }
    }

    pub fn zone(&self, id: ZoneId) -> &DropZone {
        match id {
            ZoneId::Bank => &self.bank,
            ZoneId::Sentence1 => &self.sentence1,
            ZoneId::Sentence2 => &self.sentence2,
        }
    }

    fn zone_mut(&mut self, id: ZoneId) -> &mut DropZone {
        match id {
            ZoneId::Bank => &mut self.bank,
            ZoneId::Sentence1 => &mut self.sentence1,
            ZoneId::Sentence2 => &mut self.sentence2,
        }
    }

    /// Returns the zone currently holding `id`.
    pub fn locate(&self, id: TokenId) -> Option<ZoneId> {
        [ZoneId::Bank, ZoneId::Sentence1, ZoneId::Sentence2]
            .into_iter()
            .find(|zone| self.zone(*zone).contains(id))
    }

    /// Moves a token to the end of `to`, removing it from wherever it was.
    /// Dropping a token onto its own zone moves it to the end.
    pub fn move_token(&mut self, id: TokenId, to: ZoneId) -> Result<(), BoardError> {
        let from = self.locate(id).ok_or(BoardError::UnknownToken(id))?;
        let token = self
            .zone_mut(from)
            .take(id)
            .ok_or(BoardError::UnknownToken(id))?;
        self.zone_mut(to).tokens.push(token);
        Ok(())
    }

    pub fn token_count(&self) -> usize {
        self.bank.len() + self.sentence1.len() + self.sentence2.len()
    }
}

/// Builds the eight-card deck: the user's own four words, then the fixed
/// distractor sentence that shares the exercise verb.
pub fn deck(verb: &str, subject: &str, object: &str, place: &str) -> Vec<(String, Role)> {
    let or_placeholder = |s: &str| {
        let s = s.trim();
        let text = if s.is_empty() { PLACEHOLDER } else { s };
        text.to_string()
    };
    vec![
        (verb.to_string(), Role::Verb),
        (or_placeholder(subject), Role::Subject),
        (or_placeholder(object), Role::Object),
        (or_placeholder(place), Role::Place),
        (verb.to_string(), Role::Verb),
        (DISTRACTOR_SUBJECT.to_string(), Role::Subject),
        (DISTRACTOR_OBJECT.to_string(), Role::Object),
        (DISTRACTOR_PLACE.to_string(), Role::Place),
    ]
}
