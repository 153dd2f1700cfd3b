//! Session-owned state: identifiers, the phase machine, and the countdown.

/// Session identifiers and the creator gate.
pub mod context;
/// Per-question countdown timer.
pub mod countdown;
/// The quiz-session state machine.
pub mod machine;

pub use self::context::SessionContext;
pub use self::countdown::CountdownTimer;
pub use self::machine::{
    AnswerState, Effect, Question, QuizStateMachine, ScoreBoard, SessionPhase,
};
