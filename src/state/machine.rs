use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::dto::ws::{ClientCommand, PlayerScore, ServerEvent};
use crate::state::context::SessionContext;

/// Coarse lifecycle states of one play session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// The join parameters have not been resolved yet.
    AwaitingPartyId,
    /// Connected (or connecting) and waiting for the first question.
    WaitingToStart,
    /// A question is live; the player can select and submit a choice.
    QuestionActive,
    /// Final scores are shown before returning to the lobby.
    GameOver,
    /// Terminal error state; no further events are processed.
    Failed,
}

/// One round's prompt, superseded by the next `new_question` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    /// Prompt text.
    pub text: String,
    /// Ordered display labels; never empty.
    pub choices: Vec<String>,
    /// Time budget in seconds, when the party has one.
    pub timeout_seconds: Option<u32>,
}

/// Per-question answer state, reset whenever a new question arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerState {
    /// The currently highlighted choice, by display label.
    pub selected_choice: Option<String>,
    /// Flips false to true at most once per question; once true the
    /// selection is frozen and no further send occurs.
    pub submitted: bool,
}

/// Final scores keyed by user id, in server order. Created once on
/// `game_over` and immutable afterward.
pub type ScoreBoard = IndexMap<String, PlayerScore>;

/// Side effects the state machine asks its runner to execute.
///
/// The machine itself is pure and synchronous; timing and I/O happen in the
/// session runner, which applies these in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// (Re)start the per-question countdown from the given budget.
    StartCountdown(u32),
    /// Stop the countdown; no further ticks.
    CancelCountdown,
    /// Send a command frame over the realtime channel.
    Send(ClientCommand),
    /// Arm the fixed delay after which the session returns to the lobby.
    ScheduleLobbyReturn,
}

/// The quiz-session controller: owns the session phase, the current
/// question, the per-question answer state, and the final scoreboard.
///
/// Inbound channel events and user intents are applied one at a time; each
/// application returns the effects the runner must execute. Invalid inputs
/// (already submitted, not connected, not the creator) are rejected as
/// no-ops rather than errors, matching how the UI treats them.
#[derive(Debug)]
pub struct QuizStateMachine {
    phase: SessionPhase,
    context: Option<SessionContext>,
    connected: bool,
    question: Option<Question>,
    answer: AnswerState,
    scores: Option<ScoreBoard>,
    error: Option<String>,
}

impl Default for QuizStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::AwaitingPartyId,
            context: None,
            connected: false,
            question: None,
            answer: AnswerState::default(),
            scores: None,
            error: None,
        }
    }
}

impl QuizStateMachine {
    /// Create a machine waiting for its session context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The live question, if one is active.
    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    /// Answer state for the live question.
    pub fn answer(&self) -> &AnswerState {
        &self.answer
    }

    /// Final scores, present once the session reached `GameOver`.
    pub fn scores(&self) -> Option<&ScoreBoard> {
        self.scores.as_ref()
    }

    /// Error text for the `Failed` phase, for the user-facing error panel.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the start-game control is enabled: the local player must be
    /// the resolved party creator.
    pub fn can_start_game(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(SessionContext::is_creator)
    }

    /// Install the resolved session context and leave `AwaitingPartyId`.
    /// The runner opens the realtime channel in response.
    pub fn attach_context(&mut self, context: SessionContext) {
        if self.phase != SessionPhase::AwaitingPartyId {
            return;
        }
        self.context = Some(context);
        self.phase = SessionPhase::WaitingToStart;
    }

    /// Note that the realtime channel reached `Open`. Keeps the phase but
    /// unlocks command sending.
    pub fn channel_open(&mut self) {
        self.connected = true;
    }

    /// Record the creator id fetched from the party metadata.
    pub fn resolve_creator(&mut self, creator_id: String) {
        if let Some(context) = &mut self.context {
            context.set_creator(creator_id);
        }
    }

    /// Move to the terminal `Failed` state. Further events and intents
    /// become no-ops and no outbound command is produced again.
    pub fn fail(&mut self, message: impl Into<String>) -> Vec<Effect> {
        if self.phase == SessionPhase::Failed {
            return Vec::new();
        }
        self.phase = SessionPhase::Failed;
        self.connected = false;
        self.error = Some(message.into());
        vec![Effect::CancelCountdown]
    }

    /// Apply one inbound server event, returning the effects to execute.
    pub fn apply_event(&mut self, event: ServerEvent) -> Vec<Effect> {
        match (self.phase, event) {
            // Terminal phases stop reacting to the stream entirely.
            (SessionPhase::Failed | SessionPhase::GameOver, _) => Vec::new(),
            (
                SessionPhase::WaitingToStart | SessionPhase::QuestionActive,
                ServerEvent::NewQuestion {
                    question,
                    choices,
                    timeout,
                },
            ) => {
                if choices.is_empty() {
                    warn!("ignoring question frame with no choices");
                    return Vec::new();
                }
                self.question = Some(Question {
                    text: question,
                    choices,
                    timeout_seconds: timeout,
                });
                self.answer = AnswerState::default();
                self.phase = SessionPhase::QuestionActive;
                match timeout {
                    Some(seconds) => vec![Effect::StartCountdown(seconds)],
                    None => vec![Effect::CancelCountdown],
                }
            }
            (
                SessionPhase::WaitingToStart | SessionPhase::QuestionActive,
                ServerEvent::GameOver { scores },
            ) => {
                self.question = None;
                self.scores = Some(scores);
                self.phase = SessionPhase::GameOver;
                vec![Effect::CancelCountdown, Effect::ScheduleLobbyReturn]
            }
            (_, ServerEvent::ScoreUpdate { user_id, score }) => {
                debug!(user_id = %user_id, score, "score update received");
                Vec::new()
            }
            (_, ServerEvent::QuestionTimeout) => {
                // The server rotates questions itself; nothing to do locally.
                debug!("server-side question countdown elapsed");
                Vec::new()
            }
            (_, ServerEvent::Unknown) => {
                debug!("ignoring unrecognized event frame");
                Vec::new()
            }
            (SessionPhase::AwaitingPartyId, _) => Vec::new(),
        }
    }

    /// Highlight a choice of the live question. Rejected once the answer is
    /// submitted or when the label is not one of the question's choices.
    pub fn select_choice(&mut self, choice: &str) -> bool {
        if self.phase != SessionPhase::QuestionActive || self.answer.submitted {
            return false;
        }
        let Some(question) = &self.question else {
            return false;
        };
        if !question.choices.iter().any(|label| label == choice) {
            return false;
        }
        self.answer.selected_choice = Some(choice.to_string());
        true
    }

    /// Submit the selected choice, producing the single `answer` command for
    /// this question. Repeat submissions, submissions without a selection,
    /// and submissions from an unauthenticated observer are no-ops.
    pub fn submit_answer(&mut self) -> Option<Effect> {
        if self.phase != SessionPhase::QuestionActive || self.answer.submitted || !self.connected {
            return None;
        }
        let selected = self.answer.selected_choice.clone()?;
        let context = self.context.as_ref()?;
        let user_id = context.user_id()?.to_string();
        let party_id = context.party_id().to_string();

        self.answer.submitted = true;
        Some(Effect::Send(ClientCommand::Answer {
            answer: selected,
            user_id,
            party_id,
        }))
    }

    /// Ask the server to start the game. Only produced while waiting to
    /// start, over an open channel, for the resolved party creator.
    pub fn request_start(&mut self) -> Option<Effect> {
        if self.phase != SessionPhase::WaitingToStart || !self.connected || !self.can_start_game()
        {
            return None;
        }
        let context = self.context.as_ref()?;
        Some(Effect::Send(ClientCommand::StartGame {
            user_id: context.user_id()?.to_string(),
            party_id: context.party_id().to_string(),
        }))
    }
}
