//! Guided Arabic sentence-building exercise engine.
//!
//! [`flow::ExerciseFlow`] walks a learner through choosing a subject, object
//! and place for a verb, arranging word cards into two sentences, typing them
//! out, and answering two yes/no stimuli. The page itself is reached through
//! [`surface::Surface`], the backend through [`transport::Transport`], and
//! audio through [`speech::SpeechProvider`].

pub mod board;
pub mod config;
pub mod flow;
pub mod judgment;
pub mod session;
pub mod speech;
pub mod step;
pub mod stimulus;
pub mod surface;
pub mod transport;
pub mod validator;

pub use config::{ConfigError, ExerciseConfig, SpeechSettings};
pub use flow::{ExerciseFlow, ExerciseState, Gate, Transition};
pub use judgment::{HttpJudgmentClient, JudgmentClient, JudgmentResult, OfflineJudgmentClient};
pub use speech::{RecognitionOutcome, SpeechBackend, SpeechProvider};
pub use step::Step;
pub use stimulus::{Answer, StimulusId};
pub use surface::{Element, Field, Surface};
pub use transport::{HttpTransport, Transport, TransportError};
