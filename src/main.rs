//! Terminal front end for the party quiz client: lobby commands plus the
//! line-oriented presentation adapter for live play.

use std::env;

use anyhow::{Context, bail};
use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_party_client::config::AppConfig;
use quiz_party_client::dto::api::PartyInitRequest;
use quiz_party_client::identity::IdentityStore;
use quiz_party_client::services::party_api::PartyApi;
use quiz_party_client::services::session::{
    SessionEnd, SessionParams, SessionSnapshot, UserIntent, run_session,
};
use quiz_party_client::state::SessionPhase;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    let api = PartyApi::new(config.api_base().to_string());
    let identity = IdentityStore::new(config.identity_path().clone());

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("login") => login(&api, &identity, args.get(1).cloned()).await,
        Some("categories") => categories(&api).await,
        Some("parties") => parties(&api).await,
        Some("create") => create(&api, &identity, &args[1..]).await,
        Some("join") => join(config, api, identity, args.get(1).cloned()).await,
        Some("play") => play(config, api, identity, args.get(1).cloned()).await,
        _ => {
            print_usage();
            Ok(())
        }
    }
}

/// Register a player and persist the issued id as the local identity.
async fn login(
    api: &PartyApi,
    identity: &IdentityStore,
    name: Option<String>,
) -> anyhow::Result<()> {
    let name = name.unwrap_or_else(guest_name);
    let created = api.create_user(&name).await.context("registering player")?;
    identity
        .save(&created.user_id)
        .context("saving player identity")?;
    println!("Logged in as {name} ({})", created.user_id);
    Ok(())
}

async fn categories(api: &PartyApi) -> anyhow::Result<()> {
    let categories = api.categories().await.context("fetching categories")?;
    for category in categories {
        println!("{category}");
    }
    Ok(())
}

async fn parties(api: &PartyApi) -> anyhow::Result<()> {
    let parties = api.parties().await.context("fetching parties")?;
    if parties.is_empty() {
        println!("No games have been created yet...");
        return Ok(());
    }
    for party in parties {
        println!(
            "{}  creator={}  rounds={}  players={}{}",
            party.party_id,
            party.creator,
            party.rounds,
            party.participants.len(),
            party
                .state
                .map(|state| format!("  [{state}]"))
                .unwrap_or_default(),
        );
    }
    Ok(())
}

/// Create a party from category, rounds, and timeout arguments.
async fn create(api: &PartyApi, identity: &IdentityStore, args: &[String]) -> anyhow::Result<()> {
    let Some(player_id) = identity.load() else {
        bail!("log in before creating a party");
    };
    let Some(category) = args.first() else {
        bail!("usage: create <category> [rounds] [timeout]");
    };

    let rounds = args
        .get(1)
        .map(|value| value.parse())
        .transpose()
        .context("rounds must be a number")?
        .unwrap_or(1);
    let timeout = args
        .get(2)
        .map(|value| value.parse())
        .transpose()
        .context("timeout must be a number")?
        .unwrap_or(30);

    let request = PartyInitRequest {
        player_id,
        category: category.clone(),
        rounds,
        timeout,
    };
    let party = api.init_party(&request).await.context("creating party")?;
    println!("Created party {}", party.party_id);
    Ok(())
}

/// Join a party, then move straight into live play.
async fn join(
    config: AppConfig,
    api: PartyApi,
    identity: IdentityStore,
    party_id: Option<String>,
) -> anyhow::Result<()> {
    let Some(party_id) = party_id else {
        bail!("usage: join <party-id>");
    };
    let Some(user_id) = identity.load() else {
        bail!("log in before joining a party");
    };

    api.join_party(&party_id, &user_id)
        .await
        .context("joining party")?;
    println!("Joined party {party_id}");
    play(config, api, identity, Some(party_id)).await
}

/// Run one live session: the runner owns the state, this side only renders
/// snapshots and forwards keystroke intents.
async fn play(
    config: AppConfig,
    api: PartyApi,
    identity: IdentityStore,
    party_id: Option<String>,
) -> anyhow::Result<()> {
    let params = SessionParams {
        party_id,
        identity: identity.load(),
    };

    let (intent_tx, intent_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::initial());

    let input = tokio::spawn(read_intents(intent_tx.clone(), snapshot_rx.clone()));
    let render = tokio::spawn(render_snapshots(snapshot_rx));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = intent_tx.send(UserIntent::Quit);
        }
    });

    let result = run_session(config, api, params, intent_rx, snapshot_tx).await;
    input.abort();
    let _ = render.await;

    match result {
        Ok(SessionEnd::ReturnToLobby) => {
            println!("Back to the lobby. See you next round!");
            Ok(())
        }
        Ok(SessionEnd::Quit) => Ok(()),
        Err(err) => Err(err).context("session failed"),
    }
}

/// Translate stdin lines into user intents against the latest snapshot.
async fn read_intents(
    intents: mpsc::UnboundedSender<UserIntent>,
    snapshots: watch::Receiver<SessionSnapshot>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Some(intent) = parse_intent(line.trim(), &snapshots.borrow()) else {
            println!("commands: 1..9 select a choice, s submit, g start game, q quit");
            continue;
        };
        let quit = intent == UserIntent::Quit;
        if intents.send(intent).is_err() || quit {
            break;
        }
    }
}

fn parse_intent(line: &str, snapshot: &SessionSnapshot) -> Option<UserIntent> {
    match line {
        "s" => Some(UserIntent::SubmitAnswer),
        "g" => Some(UserIntent::StartGame),
        "q" => Some(UserIntent::Quit),
        _ => {
            let index: usize = line.parse().ok()?;
            let question = snapshot.question.as_ref()?;
            let label = question.choices.get(index.checked_sub(1)?)?;
            Some(UserIntent::SelectChoice(label.clone()))
        }
    }
}

async fn render_snapshots(snapshots: watch::Receiver<SessionSnapshot>) {
    let mut stream = WatchStream::new(snapshots);
    while let Some(snapshot) = stream.next().await {
        render(&snapshot);
    }
}

fn render(snapshot: &SessionSnapshot) {
    match snapshot.phase {
        SessionPhase::AwaitingPartyId => println!("Resolving party..."),
        SessionPhase::WaitingToStart => {
            println!("Waiting for the game to start!");
            if snapshot.can_start_game {
                println!("You are the party creator; press g to start the game.");
            }
        }
        SessionPhase::QuestionActive => {
            let Some(question) = &snapshot.question else {
                return;
            };
            println!();
            println!("{}", question.text);
            if let Some(seconds) = snapshot.seconds_remaining {
                println!("Time left: {seconds} seconds");
            }
            for (index, choice) in question.choices.iter().enumerate() {
                let marker = if snapshot.answer.selected_choice.as_deref() == Some(choice) {
                    ">"
                } else {
                    " "
                };
                println!("{marker} {}. {choice}", index + 1);
            }
            if snapshot.answer.submitted {
                if let Some(answer) = &snapshot.answer.selected_choice {
                    println!("You answered: {answer}");
                }
            } else {
                println!(
                    "Select with 1..{} and press s to submit.",
                    question.choices.len()
                );
            }
        }
        SessionPhase::GameOver => {
            let Some(scores) = &snapshot.scores else {
                return;
            };
            println!();
            println!("Final scores:");
            for (user_id, score) in scores {
                println!("  {user_id}: {}", score.total_score);
                for (category, value) in &score.category_scores {
                    println!("    {category}: {value}");
                }
            }
        }
        SessionPhase::Failed => {
            println!(
                "Something went wrong: {}",
                snapshot.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

fn guest_name() -> String {
    format!("guest-{:04}", rand::rng().random_range(0..10_000))
}

fn print_usage() {
    println!("usage: quiz-party-client <command>");
    println!();
    println!("  login [name]                       register and store the player identity");
    println!("  categories                         list question categories");
    println!("  parties                            list open parties");
    println!("  create <category> [rounds] [timeout]   create a party");
    println!("  join <party-id>                    join a party and play");
    println!("  play <party-id>                    play a party already joined");
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quiz_party_client=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
