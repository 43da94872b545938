//! Command-line interface for collective_othello.

use clap::{Parser, Subcommand};
use collective_othello::{GameStatus, Side};
use std::path::PathBuf;

/// Collective Othello - the crowd votes its moves against an AI
#[derive(Parser, Debug)]
#[command(name = "collective_othello")]
#[command(about = "Turn and vote resolution engine for collective-vs-AI Othello", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path, overriding the config file
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new game
    New {
        /// Side the AI plays (defaults to the configured side)
        #[arg(long)]
        ai_side: Option<Side>,
    },

    /// Show a game's board, status and open candidates
    Show {
        /// Game id
        game: String,
    },

    /// List games, newest first
    List {
        /// Only games with this status
        #[arg(long)]
        status: Option<GameStatus>,

        /// Page size
        #[arg(long)]
        limit: Option<usize>,

        /// Cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Propose a move for the collective
    Propose {
        /// Game id
        game: String,

        /// Turn number the proposal is for
        #[arg(long)]
        turn: u32,

        /// Proposing participant
        #[arg(long)]
        player: String,

        /// Position as "d3" or "2,3"
        position: String,
    },

    /// Vote for a candidate
    Vote {
        /// Game id
        game: String,

        /// Turn number the vote is for
        #[arg(long)]
        turn: u32,

        /// Voting participant
        #[arg(long)]
        voter: String,

        /// Candidate id
        #[arg(long)]
        candidate: String,
    },

    /// Resolve a collective turn
    Resolve {
        /// Game id
        game: String,

        /// Turn number to resolve
        #[arg(long)]
        turn: u32,
    },

    /// Play the AI's move
    AiMove {
        /// Game id
        game: String,
    },

    /// Play a whole game with concurrent simulated voters
    Simulate {
        /// Number of voters per collective turn
        #[arg(long, default_value = "5")]
        voters: usize,

        /// Side the AI plays (defaults to the configured side)
        #[arg(long)]
        ai_side: Option<Side>,

        /// Use an in-memory store instead of the database
        #[arg(long)]
        in_memory: bool,
    },
}
