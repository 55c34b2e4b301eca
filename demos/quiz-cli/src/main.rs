//! Plays one Matharena game in the terminal.
//!
//! Type the value of each expression and press enter. `q` ends the game
//! early. Set `MATHARENA_START_BUDGET_SECS` to change the starting budget
//! and `RUST_LOG` to see what the engine is doing.

use std::time::Duration;

use chrono::{DateTime, Utc};
use matharena::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BUDGET_VAR: &str = "MATHARENA_START_BUDGET_SECS";
const PLAYER: UserId = UserId(1);

// ---------------------------------------------------------------------------
// Input handling
// ---------------------------------------------------------------------------

/// One line typed by the player.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Answer(i64),
    Quit,
    Unreadable,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
        return Input::Quit;
    }
    line.parse().map_or(Input::Unreadable, Input::Answer)
}

/// Starting budget from the environment, falling back to the default.
fn start_budget(value: Option<&str>, default: Duration) -> Duration {
    let Some(raw) = value else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            tracing::warn!(value = raw, "ignoring invalid {BUDGET_VAR}");
            default
        }
    }
}

// ---------------------------------------------------------------------------
// Game loop
// ---------------------------------------------------------------------------

/// Stops the game and returns the snapshot to report. If the budget ran
/// out while the player was typing `q`, the last snapshot seen stands.
async fn quit<S: SessionStore>(
    service: &GameService<S>,
    last: SessionView,
    now: DateTime<Utc>,
) -> Result<SessionView, MatharenaError> {
    match service.stop_session(last.id, PLAYER, now).await {
        Ok(view) => Ok(view),
        Err(MatharenaError::AlreadyStopped(_)) => Ok(last),
        Err(err) => Err(err),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let service = GameService::builder().build(InMemorySessionStore::new());
    let env_budget = std::env::var(BUDGET_VAR).ok();
    let budget =
        start_budget(env_budget.as_deref(), service.session_config().start_budget);

    let mut view = service
        .create_session(PLAYER, budget, Difficulty::Easy, Utc::now())
        .await?;
    println!("You have {}s. Type q to stop.", budget.as_secs());
    println!("{} = ?", view.expression);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let value = match parse_input(&line) {
            Input::Answer(value) => value,
            Input::Quit => {
                view = quit(&service, view, Utc::now()).await?;
                break;
            }
            Input::Unreadable => {
                println!("numbers only, please");
                continue;
            }
        };

        let answer = match service
            .submit_answer(view.id, PLAYER, value, Utc::now())
            .await
        {
            Ok(answer) => answer,
            // Ran out of time while the player was typing.
            Err(MatharenaError::InvalidSession {
                source: SessionError::Expired(last),
                ..
            }) => {
                view = *last;
                break;
            }
            Err(err) => return Err(err.into()),
        };

        view = answer.session;
        match answer.outcome {
            Outcome::Correct => println!("correct! {}s left", view.time_left_ms / 1000),
            Outcome::Incorrect => println!("wrong, {}s left", view.time_left_ms / 1000),
            Outcome::Expired => break,
        }
        println!("{} = ?", view.expression);
    }

    println!("Game over. Score: {}", view.score);
    Ok(())
}
