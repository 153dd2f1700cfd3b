use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Sleep, sleep};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dto::api::PartyDetail;
use crate::error::{ApiError, SessionError};
use crate::services::party_api::PartyApi;
use crate::services::realtime::{ChannelSignal, RealtimeChannel};
use crate::state::context::SessionContext;
use crate::state::countdown::CountdownTimer;
use crate::state::machine::{
    AnswerState, Effect, Question, QuizStateMachine, ScoreBoard, SessionPhase,
};

/// Delay between the final scores appearing and the return to the lobby.
const LOBBY_RETURN_DELAY: Duration = Duration::from_secs(5);

/// Actions the presentation adapter can request.
#[derive(Debug, Clone, PartialEq)]
pub enum UserIntent {
    /// Highlight one of the current question's choices.
    SelectChoice(String),
    /// Submit the highlighted choice.
    SubmitAnswer,
    /// Ask the server to start the game (creator only).
    StartGame,
    /// Leave the session.
    Quit,
}

/// How a session ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The final scores were shown and the lobby-return delay elapsed.
    ReturnToLobby,
    /// The user left the session.
    Quit,
}

/// Join parameters handed to a session, the native analog of the page's
/// query string.
#[derive(Debug, Clone, Default)]
pub struct SessionParams {
    /// Party to play in. Missing means the session can never start.
    pub party_id: Option<String>,
    /// Persisted local player id, when logged in.
    pub identity: Option<String>,
}

/// Read-only view of the session state for the presentation adapter.
///
/// The adapter only ever reads snapshots and emits [`UserIntent`]s; all
/// state is owned by the state machine behind the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Coarse session phase.
    pub phase: SessionPhase,
    /// The live question, while one is active.
    pub question: Option<Question>,
    /// Answer state for the live question.
    pub answer: AnswerState,
    /// Mirrored countdown value; `None` when the question has no budget.
    pub seconds_remaining: Option<u32>,
    /// Final scores, once the game is over.
    pub scores: Option<ScoreBoard>,
    /// Whether the start-game control should be shown enabled.
    pub can_start_game: bool,
    /// Error text for the failure panel.
    pub error: Option<String>,
}

impl SessionSnapshot {
    /// Snapshot of a session that has not resolved its context yet.
    pub fn initial() -> Self {
        Self {
            phase: SessionPhase::AwaitingPartyId,
            question: None,
            answer: AnswerState::default(),
            seconds_remaining: None,
            scores: None,
            can_start_game: false,
            error: None,
        }
    }
}

/// Run one play session to completion.
///
/// Owns the realtime channel, the countdown timer, and the state machine
/// for the session's whole lifetime; both resources are acquired together
/// at session start and released together on every exit path, including
/// error exits.
pub async fn run_session(
    config: AppConfig,
    api: PartyApi,
    params: SessionParams,
    intents: mpsc::UnboundedReceiver<UserIntent>,
    snapshots: watch::Sender<SessionSnapshot>,
) -> Result<SessionEnd, SessionError> {
    let mut machine = QuizStateMachine::new();

    let context = match SessionContext::resolve(params.party_id, params.identity) {
        Ok(context) => context,
        Err(err) => {
            machine.fail(err.to_string());
            publish(&snapshots, &machine, None);
            return Err(err);
        }
    };

    let ws_url = config.ws_party_url(context.party_id(), context.user_id());
    let party_id = context.party_id().to_string();
    machine.attach_context(context);
    publish(&snapshots, &machine, None);

    let mut channel = match RealtimeChannel::connect(&ws_url).await {
        Ok(channel) => channel,
        Err(err) => {
            machine.fail(err.to_string());
            publish(&snapshots, &machine, None);
            return Err(err);
        }
    };
    machine.channel_open();

    let mut countdown = CountdownTimer::new();
    let countdown_rx = countdown.subscribe();

    // Resolve the party creator in the background; question flow must not
    // wait for it, and its failure only keeps the start control unavailable.
    let (creator_tx, creator_rx) = oneshot::channel();
    let creator_api = api.clone();
    tokio::spawn(async move {
        let _ = creator_tx.send(creator_api.party(&party_id).await);
    });

    let result = drive(
        &mut machine,
        &mut channel,
        &mut countdown,
        countdown_rx,
        intents,
        creator_rx,
        &snapshots,
    )
    .await;

    countdown.cancel();
    channel.close();
    result
}

/// The single ordered dispatch loop: channel signals, countdown updates,
/// user intents, and the one-shot creator resolution, one at a time.
async fn drive(
    machine: &mut QuizStateMachine,
    channel: &mut RealtimeChannel,
    countdown: &mut CountdownTimer,
    mut countdown_rx: watch::Receiver<u32>,
    mut intents: mpsc::UnboundedReceiver<UserIntent>,
    mut creator_rx: oneshot::Receiver<Result<PartyDetail, ApiError>>,
    snapshots: &watch::Sender<SessionSnapshot>,
) -> Result<SessionEnd, SessionError> {
    let mut creator_pending = true;
    let mut lobby_return: Option<Pin<Box<Sleep>>> = None;

    loop {
        publish(snapshots, machine, Some(&countdown_rx));

        tokio::select! {
            signal = channel.next_signal() => match signal {
                Some(ChannelSignal::Event(event)) => {
                    let effects = machine.apply_event(event);
                    apply_effects(effects, countdown, channel, &mut lobby_return);
                }
                Some(ChannelSignal::Errored(err)) => {
                    apply_effects(machine.fail("party channel error"), countdown, channel, &mut lobby_return);
                    publish(snapshots, machine, None);
                    return Err(SessionError::Channel(err));
                }
                Some(ChannelSignal::Closed) | None => {
                    apply_effects(machine.fail("party channel closed"), countdown, channel, &mut lobby_return);
                    publish(snapshots, machine, None);
                    return Err(SessionError::ChannelClosed);
                }
            },
            changed = countdown_rx.changed() => {
                if changed.is_err() {
                    warn!("countdown publisher dropped");
                }
            }
            intent = intents.recv() => match intent {
                Some(UserIntent::SelectChoice(choice)) => {
                    machine.select_choice(&choice);
                }
                Some(UserIntent::SubmitAnswer) => {
                    if let Some(effect) = machine.submit_answer() {
                        apply_effects(vec![effect], countdown, channel, &mut lobby_return);
                    }
                }
                Some(UserIntent::StartGame) => {
                    if let Some(effect) = machine.request_start() {
                        apply_effects(vec![effect], countdown, channel, &mut lobby_return);
                    }
                }
                Some(UserIntent::Quit) | None => {
                    info!("leaving the party");
                    return Ok(SessionEnd::Quit);
                }
            },
            creator = &mut creator_rx, if creator_pending => {
                creator_pending = false;
                match creator {
                    Ok(Ok(detail)) => machine.resolve_creator(detail.creator_id),
                    Ok(Err(err)) => {
                        warn!(error = %err, "failed to resolve the party creator; start control stays unavailable");
                    }
                    Err(_) => warn!("creator resolution task ended unexpectedly"),
                }
            },
            _ = async { lobby_return.as_mut().expect("lobby return armed").await }, if lobby_return.is_some() => {
                info!("final scores shown; returning to the lobby");
                return Ok(SessionEnd::ReturnToLobby);
            },
        }
    }
}

/// Execute the effects a state-machine step asked for, in order.
fn apply_effects(
    effects: Vec<Effect>,
    countdown: &mut CountdownTimer,
    channel: &mut RealtimeChannel,
    lobby_return: &mut Option<Pin<Box<Sleep>>>,
) {
    for effect in effects {
        match effect {
            Effect::StartCountdown(seconds) => countdown.start(seconds),
            Effect::CancelCountdown => countdown.cancel(),
            Effect::Send(command) => channel.send(&command),
            Effect::ScheduleLobbyReturn => {
                *lobby_return = Some(Box::pin(sleep(LOBBY_RETURN_DELAY)));
            }
        }
    }
}

/// Publish a snapshot when anything visible changed.
fn publish(
    snapshots: &watch::Sender<SessionSnapshot>,
    machine: &QuizStateMachine,
    countdown_rx: Option<&watch::Receiver<u32>>,
) {
    let seconds_remaining = match (
        machine.question().and_then(|question| question.timeout_seconds),
        countdown_rx,
    ) {
        (Some(_), Some(rx)) => Some(*rx.borrow()),
        _ => None,
    };

    let next = SessionSnapshot {
        phase: machine.phase(),
        question: machine.question().cloned(),
        answer: machine.answer().clone(),
        seconds_remaining,
        scores: machine.scores().cloned(),
        can_start_game: machine.can_start_game(),
        error: machine.error().map(String::from),
    };

    snapshots.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;

    const WAIT: Duration = Duration::from_secs(5);

    fn test_config(port: u16) -> AppConfig {
        AppConfig::new(
            format!("http://127.0.0.1:{port}"),
            format!("ws://127.0.0.1:{port}"),
            std::env::temp_dir().join("quiz-party-test-identity.json"),
        )
    }

    async fn wait_for_phase(
        snapshots: &mut watch::Receiver<SessionSnapshot>,
        phase: SessionPhase,
    ) -> SessionSnapshot {
        timeout(WAIT, async {
            loop {
                if snapshots.borrow().phase == phase {
                    return snapshots.borrow().clone();
                }
                snapshots.changed().await.unwrap();
            }
        })
        .await
        .expect("session never reached the expected phase")
    }

    #[tokio::test]
    async fn missing_party_id_fails_without_starting() {
        let config = test_config(1);
        let api = PartyApi::new(config.api_base().to_string());
        let (_intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::initial());

        let result = run_session(
            config,
            api,
            SessionParams::default(),
            intent_rx,
            snapshot_tx,
        )
        .await;

        assert!(matches!(result, Err(SessionError::MissingPartyId)));
        assert_eq!(snapshot_rx.borrow().phase, SessionPhase::Failed);
        assert!(snapshot_rx.borrow().error.is_some());
    }

    #[tokio::test]
    async fn refused_connection_fails_the_session() {
        // Bind then drop a listener so the port is very likely unused.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = test_config(port);
        let api = PartyApi::new(config.api_base().to_string());
        let (_intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::initial());

        let result = run_session(
            config,
            api,
            SessionParams {
                party_id: Some("p-1".into()),
                identity: Some("u-1".into()),
            },
            intent_rx,
            snapshot_tx,
        )
        .await;

        assert!(matches!(result, Err(SessionError::Connect(_))));
        assert_eq!(snapshot_rx.borrow().phase, SessionPhase::Failed);
    }

    #[tokio::test]
    async fn answer_flows_from_intent_to_wire_exactly_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            ws.send(Message::Text(
                r#"{"event":"new_question","question":"q1","choices":["a","b"],"timeout":30}"#
                    .into(),
            ))
            .await
            .unwrap();

            // Exactly one answer frame arrives no matter how often the user
            // submits; the next frame we see must be the close.
            let frame = ws.next().await.unwrap().unwrap();
            let payload: serde_json::Value =
                serde_json::from_str(frame.to_text().unwrap()).unwrap();
            assert_eq!(payload["event"], "answer");
            assert_eq!(payload["answer"], "b");
            assert_eq!(payload["user_id"], "u-1");
            assert_eq!(payload["party_id"], "p-1");

            let next = ws.next().await.unwrap().unwrap();
            assert!(matches!(next, Message::Close(_)), "got {next:?}");
        });

        let config = test_config(port);
        let api = PartyApi::new(config.api_base().to_string());
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, mut snapshot_rx) = watch::channel(SessionSnapshot::initial());

        let session = tokio::spawn(run_session(
            config,
            api,
            SessionParams {
                party_id: Some("p-1".into()),
                identity: Some("u-1".into()),
            },
            intent_rx,
            snapshot_tx,
        ));

        let snapshot = wait_for_phase(&mut snapshot_rx, SessionPhase::QuestionActive).await;
        assert_eq!(snapshot.question.unwrap().choices, ["a", "b"]);

        intent_tx.send(UserIntent::SelectChoice("a".into())).unwrap();
        intent_tx.send(UserIntent::SelectChoice("b".into())).unwrap();
        intent_tx.send(UserIntent::SubmitAnswer).unwrap();
        intent_tx.send(UserIntent::SubmitAnswer).unwrap();
        intent_tx.send(UserIntent::SubmitAnswer).unwrap();

        timeout(WAIT, async {
            loop {
                snapshot_rx.changed().await.unwrap();
                if snapshot_rx.borrow().answer.submitted {
                    break;
                }
            }
        })
        .await
        .expect("answer was never submitted");

        intent_tx.send(UserIntent::Quit).unwrap();
        let end = session.await.unwrap().unwrap();
        assert_eq!(end, SessionEnd::Quit);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn game_over_shows_scores_and_cancels_countdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            ws.send(Message::Text(
                r#"{"event":"new_question","question":"q1","choices":["a"],"timeout":30}"#.into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"event":"game_over","scores":{"u-1":{"total_score":1,"category_scores":{}}}}"#
                    .into(),
            ))
            .await
            .unwrap();
            // Keep the socket open until the client leaves.
            while let Some(Ok(frame)) = ws.next().await {
                if matches!(frame, Message::Close(_)) {
                    break;
                }
            }
        });

        let config = test_config(port);
        let api = PartyApi::new(config.api_base().to_string());
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, mut snapshot_rx) = watch::channel(SessionSnapshot::initial());

        let session = tokio::spawn(run_session(
            config,
            api,
            SessionParams {
                party_id: Some("p-1".into()),
                identity: Some("u-1".into()),
            },
            intent_rx,
            snapshot_tx,
        ));

        let snapshot = wait_for_phase(&mut snapshot_rx, SessionPhase::GameOver).await;
        let scores = snapshot.scores.expect("scores installed on game over");
        assert_eq!(scores["u-1"].total_score, 1);
        assert_eq!(snapshot.question, None);
        assert_eq!(snapshot.seconds_remaining, None);

        intent_tx.send(UserIntent::Quit).unwrap();
        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::Quit);
    }
}
