//! Frames exchanged over the party realtime channel.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Frames pushed by the server over a party's realtime channel, tagged by
/// their `event` field.
///
/// Tags the client does not recognize deserialize into [`ServerEvent::Unknown`]
/// so an unexpected frame degrades to an ignorable value instead of an error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A new question supersedes whatever the client was showing.
    NewQuestion {
        /// Prompt text.
        question: String,
        /// Ordered display labels; equality is identity.
        choices: Vec<String>,
        /// Per-question time budget in seconds, when the party has one.
        #[serde(default)]
        timeout: Option<u32>,
    },
    /// The party ended; final scores per user id.
    GameOver {
        /// Final score map, in server order.
        scores: IndexMap<String, PlayerScore>,
    },
    /// Mid-game score notification. The client does not act on these.
    ScoreUpdate {
        /// User whose score changed.
        user_id: String,
        /// Their new total.
        score: i64,
    },
    /// The server-side countdown for the current question elapsed. Question
    /// replacement is entirely server-driven, so the client does not act on
    /// this either.
    QuestionTimeout,
    /// Any frame whose `event` tag the client does not know.
    #[serde(other)]
    Unknown,
}

/// Final score entry for one user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerScore {
    /// Total across all rounds.
    pub total_score: i64,
    /// Per-category breakdown.
    #[serde(default)]
    pub category_scores: IndexMap<String, i64>,
}

/// Command frames the client sends over the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Submit the selected choice for the current question.
    Answer {
        /// The selected choice, by display label.
        answer: String,
        /// Authenticated local user.
        user_id: String,
        /// Party the answer belongs to.
        party_id: String,
    },
    /// Ask the server to start the game. Only honored for the party creator.
    StartGame {
        /// Authenticated local user.
        user_id: String,
        /// Party to start.
        party_id: String,
    },
}
