use std::{
    io,
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use engine::{MOVE_GEN, PgnTags, Position, SearchParams, perft_full, search};
use mimalloc::MiMalloc;
use tracing_subscriber::{Registry, layer::SubscriberExt, prelude::*, util::SubscriberInitExt};

use cli::play_game;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search a position for the best move.
    Search {
        fen: String,
        #[arg(long)]
        depth: u32,
        /// Stop the search after this many milliseconds.
        #[arg(long)]
        max_time_ms: Option<u64>,
    },
    /// Play the engine against itself and print the game as PGN.
    Play {
        #[arg(long, default_value_t = 4)]
        depth: u32,
        /// Stop an unfinished game after this many half moves.
        #[arg(long, default_value_t = 200)]
        max_moves: u32,
        /// Starting position, defaults to the normal starting position.
        #[arg(long)]
        fen: Option<String>,
    },
    /// Count the move paths from a position, tallied per depth.
    Perft { fen: String, depth: usize },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    enable_logging();

    match cli.command {
        Commands::Search {
            fen,
            depth,
            max_time_ms,
        } => cli_search(&fen, depth, max_time_ms),
        Commands::Play {
            depth,
            max_moves,
            fen,
        } => cli_play(depth, max_moves, fen.as_deref()),
        Commands::Perft { fen, depth } => cli_perft(&fen, depth),
    }
}

fn cli_search(fen: &str, depth: u32, max_time_ms: Option<u64>) -> Result<()> {
    let position =
        Position::from_fen(fen).with_context(|| format!("Couldn't parse given fen: `{}`", fen))?;
    let search_params = SearchParams {
        max_depth: depth,
        max_time: max_time_ms.map(Duration::from_millis),
    };
    let (best_move, info) = search(
        &position,
        &search_params,
        MOVE_GEN,
        Arc::new(AtomicBool::new(false)),
    )?;
    println!("{}", best_move.to_string().to_lowercase());
    println!(
        "eval {}, {} positions in {:?}",
        info.move_evals[&best_move], info.positions_processed, info.time_elapsed
    );
    Ok(())
}

fn cli_play(depth: u32, max_moves: u32, fen: Option<&str>) -> Result<()> {
    let position = match fen {
        Some(fen) => Position::from_fen(fen)
            .with_context(|| format!("Couldn't parse given fen: `{}`", fen))?,
        None => Position::start(),
    };
    let search_params = SearchParams {
        max_depth: depth,
        ..Default::default()
    };
    let tags = PgnTags {
        event: Some("Self-play".to_string()),
        date: Some(Local::now().format("%Y.%m.%d").to_string()),
        white: Some("engine".to_string()),
        black: Some("engine".to_string()),
        ..Default::default()
    };

    let game = play_game(
        position,
        &search_params,
        max_moves,
        tags,
        MOVE_GEN,
        &mut io::stdout(),
    )?;

    println!();
    println!("{}", game.pgn);
    Ok(())
}

fn cli_perft(fen: &str, depth: usize) -> Result<()> {
    let position =
        Position::from_fen(fen).with_context(|| format!("Couldn't parse given fen: `{}`", fen))?;
    let res = perft_full(&position, depth, MOVE_GEN);
    println!("{}", res);
    Ok(())
}

fn enable_logging() {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_writer(io::stderr)
        .with_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        );

    Registry::default().with(stderr_layer).init();
}
