//! Exercise Orchestration
//!
//! `ExerciseFlow` owns the current step and everything the learner has typed
//! so far. Each handler corresponds to one control on the page. Handlers
//! update the surface, call the judge, the session endpoints or the speech
//! provider, and never surface a remote failure to the caller.

use crate::board::{self, Board, BoardError, TokenId, ZoneId, PLACEHOLDER};
use crate::config::ExerciseConfig;
use crate::judgment::{judge_stimulus, HttpJudgmentClient, JudgmentClient};
use crate::session::{SessionApi, Submission};
use crate::speech::local::CommandSpeechBackend;
use crate::speech::remote::AudioDevice;
use crate::speech::{RecognitionOutcome, SpeechProvider};
use crate::step::Step;
use crate::stimulus::{Answer, Stimulus, StimulusId};
use crate::surface::{Element, Field, Surface};
use crate::transport::{HttpTransport, Transport, TransportError};
use crate::validator::{self, Verdict};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Display name used when the learner leaves the name field empty.
pub const DEFAULT_CLIENT_NAME: &str = "عميل";

pub const SPEECH_ON_LABEL: &str = "🔊 إيقاف القراءة الآلية";
pub const SPEECH_OFF_LABEL: &str = "🔊 تشغيل القراءة الآلية";
/// Spoken right after the learner turns speech on.
pub const SPEECH_ON_ANNOUNCEMENT: &str = "تم تشغيل القراءة الآلية. اضغط ابدأ لبدء التمرين.";

pub const PREVIEW_SUBMITTED_NOTICE: &str = "تم الإرسال في وضع التجربة (لن يُحفظ).";
pub const SUBMITTED_NOTICE: &str = "تم الإرسال، شكرًا!";

/// Steps whose advance control stays hidden until their gate opens.
const GATED_STEPS: [Step; 4] = [Step::Dnd, Step::Typing, Step::YesNo, Step::Semantics];

const FEEDBACK_ELEMENTS: [Element; 4] = [
    Element::OrderFeedback,
    Element::GrammarFeedback,
    Element::YesNoFeedback,
    Element::SemanticsFeedback,
];

/// What the learner has entered so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExerciseState {
    pub client_name: String,
    pub verb: String,
    pub subject: String,
    pub object: String,
    pub place: String,
}

/// Why the current step cannot be left yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// The step has no generic next control.
    NoNextControl,
    /// Both sentence zones must validate.
    SentenceOrder,
    /// Grammar feedback has not been shown yet.
    GrammarFeedback,
    /// The stimulus has not been answered yet.
    Answer(StimulusId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced { from: Step, to: Step },
    Blocked { step: Step, gate: Gate },
}

impl Transition {
    pub fn is_advanced(&self) -> bool {
        matches!(self, Transition::Advanced { .. })
    }
}

#[derive(Debug, Default)]
struct Answers {
    grammar: Option<Answer>,
    semantics: Option<Answer>,
}

impl Answers {
    fn slot(&mut self, id: StimulusId) -> &mut Option<Answer> {
        match id {
            StimulusId::Grammar => &mut self.grammar,
            StimulusId::Semantics => &mut self.semantics,
        }
    }

    fn get(&self, id: StimulusId) -> Option<Answer> {
        match id {
            StimulusId::Grammar => self.grammar,
            StimulusId::Semantics => self.semantics,
        }
    }
}

/// The linear exercise state machine.
pub struct ExerciseFlow<S: Surface> {
    surface: S,
    step: Step,
    state: ExerciseState,
    preview: bool,
    board: Option<Board>,
    grammar_checked: bool,
    answers: Answers,
    session: SessionApi,
    judge: Arc<dyn JudgmentClient>,
    speech: SpeechProvider,
}

impl<S: Surface> ExerciseFlow<S> {
    /// Wires the flow to the HTTP backend named in `config`.
    ///
    /// A local synthesizer is picked up from `PATH` when one is installed;
    /// `audio` enables the cloud speech backend.
    pub fn from_config(
        surface: S,
        config: &ExerciseConfig,
        audio: Option<Arc<dyn AudioDevice>>,
    ) -> Result<Self, TransportError> {
        let http = HttpTransport::from_config(config)?;
        let client = http.client().clone();
        let transport: Arc<dyn Transport> = Arc::new(http);

        let mut speech = SpeechProvider::new(config.speech.clone(), Arc::clone(&transport), client);
        if let Some(local) = CommandSpeechBackend::detect() {
            speech = speech.with_local_backend(Arc::new(local));
        }
        if let Some(audio) = audio {
            speech = speech.with_audio_device(audio);
        }

        let session = SessionApi::new(Arc::clone(&transport), config.session_token.clone());
        let judge = Arc::new(HttpJudgmentClient::new(transport));
        Ok(Self::new(surface, config, session, judge, speech))
    }

    /// Creates the flow on the start step and paints the initial page.
    pub fn new(
        surface: S,
        config: &ExerciseConfig,
        session: SessionApi,
        judge: Arc<dyn JudgmentClient>,
        speech: SpeechProvider,
    ) -> Self {
        let mut flow = Self {
            surface,
            step: Step::Start,
            state: ExerciseState {
                verb: config.verb.clone(),
                ..ExerciseState::default()
            },
            preview: config.preview,
            board: None,
            grammar_checked: false,
            answers: Answers::default(),
            session,
            judge,
            speech,
        };
        flow.paint_initial();
        flow
    }

    fn paint_initial(&mut self) {
        for step in Step::ALL {
            if step == self.step {
                self.surface.show(Element::Step(step));
            } else {
                self.surface.hide(Element::Step(step));
            }
        }
        for step in GATED_STEPS {
            self.surface.hide(Element::Advance(step));
        }
        for element in FEEDBACK_ELEMENTS {
            self.surface.hide(element);
        }

        self.surface.set_text(Element::Verb, &self.state.verb);
        for id in [StimulusId::Grammar, StimulusId::Semantics] {
            self.surface
                .set_text(Element::Stimulus(id), Stimulus::get(id).sentence);
        }
        self.surface.set_text(Element::SpeechToggle, SPEECH_OFF_LABEL);
        if self.preview {
            self.surface.show(Element::PreviewBanner);
        } else {
            self.surface.hide(Element::PreviewBanner);
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn state(&self) -> &ExerciseState {
        &self.state
    }

    pub fn is_preview(&self) -> bool {
        self.preview
    }

    /// The sentence board, once the arranging step has been entered.
    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn speech(&self) -> &SpeechProvider {
        &self.speech
    }

    fn enter(&mut self, to: Step) -> Transition {
        let from = self.step;
        self.surface.hide(Element::Step(from));
        self.surface.show(Element::Step(to));
        self.step = to;
        info!(%from, %to, "Step entered");

        if to.speaks_on_entry() {
            if let Some(prompt) = to.prompt(&self.state.verb) {
                self.speech.speak(&prompt);
            }
        }
        Transition::Advanced { from, to }
    }

    fn enter_next(&mut self) -> Transition {
        match self.step.next() {
            Some(to) => self.enter(to),
            None => self.blocked(Gate::NoNextControl),
        }
    }

    fn blocked(&self, gate: Gate) -> Transition {
        debug!(step = %self.step, ?gate, "Advance blocked");
        Transition::Blocked {
            step: self.step,
            gate,
        }
    }

    fn capture(&self, field: Field) -> String {
        self.surface.field_value(field).trim().to_string()
    }

    fn display(answer: &str) -> &str {
        if answer.is_empty() { PLACEHOLDER } else { answer }
    }

    /// Leaves the start step: records the learner's name, announces the run
    /// and fetches the object hint.
    #[instrument(skip_all)]
    pub async fn begin(&mut self) -> Transition {
        if self.step != Step::Start {
            return self.blocked(Gate::NoNextControl);
        }

        let name = self.capture(Field::ClientName);
        self.state.client_name = if name.is_empty() {
            DEFAULT_CLIENT_NAME.to_string()
        } else {
            name
        };

        let (started, hint) = futures::join!(
            self.session.start(&self.state.client_name),
            self.judge.object_prompt(&self.state.verb)
        );
        match started {
            Ok(true) => info!("Session started"),
            Ok(false) => debug!("No session token; start not announced"),
            Err(e) => debug!(error = %e, "Session start failed; continuing"),
        }
        self.surface.set_text(Element::VerbPrompt, &hint);

        self.enter_next()
    }

    /// The generic next control.
    pub fn advance(&mut self) -> Transition {
        if self.step == Step::Start || self.step.is_terminal() {
            return self.blocked(Gate::NoNextControl);
        }
        match self.step {
            Step::Verb => {
                self.state.subject = self.capture(Field::Subject);
                let subject = Self::display(&self.state.subject).to_string();
                self.surface.set_text(Element::SubjectPreview, &subject);
                self.surface.set_text(Element::SubjectBubble, &subject);
            }
            Step::Object => {
                self.state.object = self.capture(Field::Object);
                let subject = Self::display(&self.state.subject).to_string();
                let object = Self::display(&self.state.object).to_string();
                self.surface.set_text(Element::PlaceSubject, &subject);
                self.surface.set_text(Element::PlaceSubjectBubble, &subject);
                self.surface.set_text(Element::PlaceObject, &object);
                self.surface.set_text(Element::PlaceObjectBubble, &object);
            }
            Step::Place => {
                self.state.place = self.capture(Field::Place);
                self.seed_board();
            }
            Step::Dnd if !self.order_passes() => return self.blocked(Gate::SentenceOrder),
            Step::Typing if !self.grammar_checked => return self.blocked(Gate::GrammarFeedback),
            Step::YesNo if self.answers.get(StimulusId::Grammar).is_none() => {
                return self.blocked(Gate::Answer(StimulusId::Grammar));
            }
            Step::Semantics if self.answers.get(StimulusId::Semantics).is_none() => {
                return self.blocked(Gate::Answer(StimulusId::Semantics));
            }
            _ => {}
        }
        self.enter_next()
    }

    fn seed_board(&mut self) {
        let deck = board::deck(
            &self.state.verb,
            &self.state.subject,
            &self.state.object,
            &self.state.place,
        );
        let board = Board::seed(deck);
        for zone in [ZoneId::Bank, ZoneId::Sentence1, ZoneId::Sentence2] {
            self.surface.render_zone(zone, board.zone(zone).tokens());
        }
        debug!(tokens = board.token_count(), "Board seeded");
        self.board = Some(board);
    }

    fn verdicts(&self) -> Option<(Verdict, Verdict)> {
        let board = self.board.as_ref()?;
        Some((
            validator::validate(board.zone(ZoneId::Sentence1).tokens()),
            validator::validate(board.zone(ZoneId::Sentence2).tokens()),
        ))
    }

    fn order_passes(&self) -> bool {
        self.verdicts()
            .is_some_and(|(first, second)| first.is_pass() && second.is_pass())
    }

    /// Moves a word card. Only allowed while arranging.
    pub fn drop_token(&mut self, id: TokenId, to: ZoneId) -> Result<(), BoardError> {
        if self.step != Step::Dnd {
            return Err(BoardError::NotArranging);
        }
        let board = self.board.as_mut().ok_or(BoardError::NotArranging)?;
        let from = board.locate(id).ok_or(BoardError::UnknownToken(id))?;
        board.move_token(id, to)?;

        self.surface.render_zone(from, board.zone(from).tokens());
        if from != to {
            self.surface.render_zone(to, board.zone(to).tokens());
        }
        Ok(())
    }

    /// Validates both sentence zones and reveals the next control when both
    /// pass. Returns `None` outside the arranging step.
    pub fn check_order(&mut self) -> Option<(Verdict, Verdict)> {
        if self.step != Step::Dnd {
            return None;
        }
        let (first, second) = self.verdicts()?;
        self.surface.set_text(
            Element::OrderFeedback,
            &validator::order_feedback(first, second),
        );
        self.surface.show(Element::OrderFeedback);
        if first.is_pass() && second.is_pass() {
            self.surface.show(Element::Advance(Step::Dnd));
        } else {
            self.surface.hide(Element::Advance(Step::Dnd));
        }
        Some((first, second))
    }

    /// Sends the typed sentences for grammar feedback and shows the result.
    #[instrument(skip_all)]
    pub async fn check_grammar(&mut self) -> Option<String> {
        if self.step != Step::Typing {
            return None;
        }
        let sentences = vec![
            self.capture(Field::Sentence1),
            self.capture(Field::Sentence2),
        ];
        let feedback = self.judge.grade_paragraph(&sentences).await;

        self.surface.set_text(Element::GrammarFeedback, &feedback);
        self.surface.show(Element::GrammarFeedback);
        self.surface.show(Element::Advance(Step::Typing));
        self.grammar_checked = true;
        Some(feedback)
    }

    /// Answers the grammar stimulus. Later answers are ignored.
    pub async fn answer_grammar(&mut self, answer: Answer) -> Option<String> {
        self.answer_stimulus(StimulusId::Grammar, Step::YesNo, Element::YesNoFeedback, answer)
            .await
    }

    /// Answers the semantics stimulus. Later answers are ignored.
    pub async fn answer_semantics(&mut self, answer: Answer) -> Option<String> {
        self.answer_stimulus(
            StimulusId::Semantics,
            Step::Semantics,
            Element::SemanticsFeedback,
            answer,
        )
        .await
    }

    #[instrument(skip(self, feedback_element))]
    async fn answer_stimulus(
        &mut self,
        id: StimulusId,
        step: Step,
        feedback_element: Element,
        answer: Answer,
    ) -> Option<String> {
        if self.step != step {
            return None;
        }
        let slot = self.answers.slot(id);
        if slot.is_some() {
            debug!("Stimulus already answered; ignoring");
            return None;
        }
        *slot = Some(answer);

        let stimulus = Stimulus::get(id);
        let result = judge_stimulus(self.judge.as_ref(), stimulus, answer).await;
        let feedback = result.feedback(stimulus, answer);

        self.surface.set_text(feedback_element, &feedback);
        self.surface.show(feedback_element);
        self.surface.show(Element::Advance(step));
        Some(feedback)
    }

    /// Submits the run and shows the closing notice. The notice is shown
    /// whether or not the submission reached the backend.
    #[instrument(skip_all, fields(preview = self.preview))]
    pub async fn confirm_finish(&mut self) -> Option<&'static str> {
        if self.step != Step::Finish {
            return None;
        }
        let submission = Submission::completed(self.state.client_name.clone(), self.preview);
        match self.session.submit(&submission).await {
            Ok(true) => info!("Run submitted"),
            Ok(false) => debug!("No session token; submission skipped"),
            Err(e) => debug!(error = %e, "Submission failed; ignoring"),
        }

        let notice = if self.preview {
            PREVIEW_SUBMITTED_NOTICE
        } else {
            SUBMITTED_NOTICE
        };
        self.surface.notify(notice);
        Some(notice)
    }

    /// Flips spoken output on or off and returns the new state.
    pub async fn toggle_speech(&mut self) -> bool {
        let enable = !self.speech.is_enabled();
        if enable {
            self.speech.initialize().await;
        }
        self.speech.set_enabled(enable);

        let label = if enable { SPEECH_ON_LABEL } else { SPEECH_OFF_LABEL };
        self.surface.set_text(Element::SpeechToggle, label);
        if enable {
            self.speech.speak(SPEECH_ON_ANNOUNCEMENT);
        }
        info!(enabled = enable, "Speech toggled");
        enable
    }

    /// Dictates one utterance into `field`.
    pub async fn dictate(&mut self, field: Field) -> RecognitionOutcome {
        if self.speech.settings().is_remote_configured() && !self.speech.is_remote_ready() {
            self.speech.initialize().await;
        }
        self.speech.recognize_once(&mut self.surface, field).await
    }

    /// Reads the typed sentences back. Returns whether anything was spoken.
    pub fn read_sentences_aloud(&self) -> bool {
        let sentences: Vec<String> = [Field::Sentence1, Field::Sentence2]
            .into_iter()
            .map(|field| self.capture(field))
            .filter(|s| !s.is_empty())
            .collect();
        if sentences.is_empty() {
            return false;
        }
        self.speech.speak(&sentences.join(" . "));
        true
    }
}
