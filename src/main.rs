//! Collective Othello - command-line adapter over the engine.

#![warn(missing_docs)]

mod cli;

use anyhow::{Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use collective_othello::{
    Cursor, EngineConfig, GameService, GameView, MemoryStore, Position, Side, TurnPhase,
    TurnResolution,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db.clone() {
        config = config.with_database_path(db);
    }
    let json = cli.json;

    match cli.command {
        Command::New { ai_side } => {
            let service = GameService::from_config(&config)?;
            let game = service.create_game(ai_side.unwrap_or(*config.default_ai_side()))?;
            emit(json, &game, || format!("Created game {} (AI plays {})", game.id(), game.ai_side()))
        }
        Command::Show { game } => {
            let view = GameService::from_config(&config)?.game(&game)?;
            emit(json, &view, || render_view(&view))
        }
        Command::List {
            status,
            limit,
            cursor,
        } => {
            let cursor = cursor.map(|c| c.parse::<Cursor>()).transpose()?;
            let page = GameService::from_config(&config)?.list_games(status, limit, cursor)?;
            emit(json, &page, || {
                let mut out: Vec<String> = page
                    .items()
                    .iter()
                    .map(|g| {
                        format!(
                            "{}  {:<8} turn {:<3} ai={} {}",
                            g.id(),
                            g.status(),
                            g.turn_number(),
                            g.ai_side(),
                            g.created_at().to_rfc3339()
                        )
                    })
                    .collect();
                if let Some(next) = page.next_cursor() {
                    out.push(format!("next cursor: {}", next));
                }
                out.join("\n")
            })
        }
        Command::Propose {
            game,
            turn,
            player,
            position,
        } => {
            let position = position.parse::<Position>()?;
            let candidate = GameService::from_config(&config)?.propose(&game, turn, &player, position)?;
            emit(json, &candidate, || {
                format!(
                    "Candidate {} at {} ({} flips, {} votes)",
                    candidate.id(),
                    candidate.position(),
                    candidate.flipped_count(),
                    candidate.vote_count()
                )
            })
        }
        Command::Vote {
            game,
            turn,
            voter,
            candidate,
        } => {
            let vote_count = GameService::from_config(&config)?.vote(&game, turn, &voter, &candidate)?;
            emit(json, &serde_json::json!({ "candidate_id": candidate, "vote_count": vote_count }), || {
                format!("Candidate {} now has {} votes", candidate, vote_count)
            })
        }
        Command::Resolve { game, turn } => {
            let resolution = GameService::from_config(&config)?.resolve_turn(&game, turn)?;
            emit(json, &resolution, || render_resolution(&resolution))
        }
        Command::AiMove { game } => {
            let resolution = GameService::from_config(&config)?.play_ai_turn(&game)?;
            emit(json, &resolution, || render_resolution(&resolution))
        }
        Command::Simulate {
            voters,
            ai_side,
            in_memory,
        } => {
            let service = if in_memory {
                GameService::new(Arc::new(MemoryStore::new()), config.ai_strategy().selector())
            } else {
                GameService::from_config(&config)?
            };
            let view = simulate(service, voters.max(1), ai_side.unwrap_or(*config.default_ai_side())).await?;
            emit(json, &view, || render_view(&view))
        }
    }
}

/// Prints `value` as JSON or as the text `human` renders.
fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human());
    }
    Ok(())
}

fn render_view(view: &GameView) -> String {
    let game = view.game();
    let mut out = vec![
        format!("Game {} (AI plays {})", game.id(), game.ai_side()),
        format!("Turn {} - {} - {}", game.turn_number(), game.phase(), view.score()),
    ];
    if let Some(winner) = game.winner() {
        out.push(format!("Winner: {}", winner));
    }
    out.push(game.board().display());
    if !view.legal_moves().is_empty() {
        let labels: Vec<String> = view.legal_moves().iter().map(|p| p.label()).collect();
        out.push(format!("Legal moves for {}: {}", game.side_to_move(), labels.join(" ")));
    }
    for candidate in view.candidates() {
        out.push(format!(
            "  {} {} votes={} id={}",
            candidate.sequence(),
            candidate.position(),
            candidate.vote_count(),
            candidate.id()
        ));
    }
    out.join("\n")
}

fn render_resolution(resolution: &TurnResolution) -> String {
    let mut out = format!(
        "Turn {}: {:?} -> turn {} ({})",
        resolution.turn_number(),
        resolution.kind(),
        resolution.game().turn_number(),
        resolution.phase()
    );
    if let Some(winner) = resolution.winner() {
        out.push_str(&format!(", winner {}", winner));
    }
    out
}

/// Plays a full game: the AI moves through the coordinator, and on each
/// collective turn `voters` participants propose and vote concurrently.
#[instrument(skip(service))]
async fn simulate(service: GameService, voters: usize, ai_side: Side) -> Result<GameView> {
    let game = service.create_game(ai_side)?;
    let game_id = game.id().clone();
    info!(%game_id, "Simulation started");

    loop {
        let view = service.game(&game_id)?;
        let turn = *view.game().turn_number();

        match view.game().phase() {
            TurnPhase::Finished => {
                info!(%game_id, turns = turn, "Simulation finished");
                return Ok(view);
            }
            TurnPhase::AwaitingAiMove => {
                let resolution = service.play_ai_turn(&game_id)?;
                debug!(turn, kind = ?resolution.kind(), "AI turn");
            }
            TurnPhase::AwaitingVotes => {
                let legal = view.legal_moves().clone();
                let mut tasks = JoinSet::new();

                if !legal.is_empty() {
                    for voter in 0..voters {
                        let service = service.clone();
                        let game_id = game_id.clone();
                        let position = legal[(voter * 7 + turn as usize) % legal.len()];
                        tasks.spawn_blocking(move || {
                            let voter_id = format!("voter-{}", voter);
                            let candidate = service.propose(&game_id, turn, &voter_id, position)?;
                            service.vote(&game_id, turn, &voter_id, candidate.id())
                        });
                    }
                }
                while let Some(joined) = tasks.join_next().await {
                    joined??;
                }

                let resolution = service.resolve_turn(&game_id, turn)?;
                debug!(turn, kind = ?resolution.kind(), "Collective turn");
            }
            TurnPhase::Resolving => bail!("game {} observed mid-resolution", game_id),
        }
    }
}
